use crew_flow::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::db::JobStore;
use crate::error::{Result, ServiceError};
use crate::models::WorkItem;
use crate::queue::{Delivery, TaskQueue};
use crate::workflow::create_analysis_context;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Consumes work items and drives each job through the pipeline to a terminal status
#[derive(Clone)]
pub struct Worker {
    store: JobStore,
    queue: Arc<dyn TaskQueue>,
    pipeline: Arc<Pipeline>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(store: JobStore, queue: Arc<dyn TaskQueue>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            store,
            queue,
            pipeline,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run one delivered job to SUCCESS or FAILURE.
    ///
    /// Any error once the message is reserved, including store or queue
    /// bookkeeping errors, leaves the record holding `An error occurred: <err>`.
    /// The error is also returned, so the queue's own bookkeeping sees the task fail.
    pub async fn process(&self, delivery: &Delivery) -> Result<String> {
        let span = info_span!(
            "job",
            result_id = delivery.item.result_id,
            task_id = %delivery.task_id
        );
        self.process_delivery(delivery).instrument(span).await
    }

    async fn process_delivery(&self, delivery: &Delivery) -> Result<String> {
        match self.complete(delivery).await {
            Ok(report) => {
                info!(chars = report.len(), "Job succeeded");
                Ok(report)
            }
            Err(e) => {
                let message = format!("An error occurred: {e}");
                error!("Job failed: {}", e);

                if let Err(store_err) = self
                    .store
                    .mark_failure(delivery.item.result_id, &message)
                    .await
                {
                    error!("Could not record failure: {}", store_err);
                }
                if let Err(queue_err) = self.queue.mark_failed(&delivery.task_id, &message).await {
                    error!("Could not mark queue task failed: {}", queue_err);
                }
                Err(e)
            }
        }
    }

    async fn complete(&self, delivery: &Delivery) -> Result<String> {
        self.queue.mark_started(&delivery.task_id).await?;
        let report = self.run_job(&delivery.item).await?;
        self.store
            .mark_success(delivery.item.result_id, &report)
            .await?;
        self.queue
            .mark_succeeded(&delivery.task_id, &report)
            .await?;
        Ok(report)
    }

    async fn run_job(&self, item: &WorkItem) -> Result<String> {
        let record = self
            .store
            .get(item.result_id)
            .await?
            .ok_or(ServiceError::JobNotFound(item.result_id))?;

        self.store.mark_running(record.id).await?;
        info!(file_path = %item.file_path, "Running analysis pipeline");

        let context = create_analysis_context(&item.query, &item.file_path).await;
        let result = self.pipeline.execute(context).await?;
        if result.output.trim().is_empty() {
            return Err(ServiceError::EmptyReport);
        }
        Ok(result.output)
    }

    /// Poll the queue and process one job at a time until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(poll_ms = self.poll_interval.as_millis() as u64, "Worker started");

        while !*shutdown.borrow() {
            match self.queue.reserve().await {
                Ok(Some(delivery)) => {
                    // the failure is already recorded on the job
                    if let Err(e) = self.process(&delivery).await {
                        warn!(task_id = %delivery.task_id, "Work item failed: {}", e);
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to reserve work item: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        info!("Worker stopped");
    }

    /// Run `concurrency` independent worker loops sharing this worker's handles
    pub async fn run_concurrent(&self, concurrency: usize, shutdown: watch::Receiver<bool>) {
        let mut loops = JoinSet::new();
        for n in 0..concurrency.max(1) {
            let worker = self.clone();
            let shutdown = shutdown.clone();
            loops.spawn(
                async move { worker.run(shutdown).await }.instrument(info_span!("worker", n)),
            );
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!("Worker loop ended abnormally: {}", e);
            }
        }
    }
}
