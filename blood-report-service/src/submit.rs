use std::path::Path;
use tracing::{error, info, warn};

use crate::db::JobStore;
use crate::error::{Result, ServiceError};
use crate::models::{AnalyzeRequest, DEFAULT_USER_ID, Submission, WorkItem};
use crate::queue::TaskQueue;

/// Persist a PENDING job and hand it to the queue.
///
/// The record is committed before the work item is published, so a worker
/// never sees a message for a record it cannot read. If publishing or
/// patching the task id fails, the still-PENDING record is discarded and the
/// caller gets the error.
pub async fn submit_analysis_job(
    store: &JobStore,
    queue: &dyn TaskQueue,
    request: AnalyzeRequest,
) -> Result<Submission> {
    if !Path::new(&request.file_path).exists() {
        warn!("Rejecting submission, file not found: {}", request.file_path);
        return Err(ServiceError::DocumentNotFound {
            path: request.file_path.into(),
        });
    }

    let user_id = request.user_id.as_deref().unwrap_or(DEFAULT_USER_ID);
    let result_id = store
        .insert_pending(user_id, &request.file_path, &request.query)
        .await?;

    match enqueue_and_link(store, queue, result_id, &request).await {
        Ok(task_id) => {
            info!(result_id, task_id = %task_id, "Job submitted");
            Ok(Submission { result_id, task_id })
        }
        Err(e) => {
            error!(result_id, "Submission failed, discarding record: {}", e);
            if let Err(discard_err) = store.discard_pending(result_id).await {
                error!(result_id, "Could not discard record: {}", discard_err);
            }
            Err(e)
        }
    }
}

async fn enqueue_and_link(
    store: &JobStore,
    queue: &dyn TaskQueue,
    result_id: i64,
    request: &AnalyzeRequest,
) -> Result<String> {
    let task_id = queue
        .enqueue(&WorkItem {
            query: request.query.clone(),
            file_path: request.file_path.clone(),
            result_id,
        })
        .await?;

    store.set_task_id(result_id, &task_id).await?;
    Ok(task_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use crate::queue::{Delivery, SqliteTaskQueue, TaskState, TaskStatus};
    use crate::worker::Worker;
    use async_trait::async_trait;
    use crew_flow::{Context, PipelineBuilder, Task, TaskResult, Upstream};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};
    use tempfile::{NamedTempFile, TempDir};

    async fn memory_pool() -> sqlx::SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn setup() -> (JobStore, SqliteTaskQueue) {
        let store = JobStore::from_pool(memory_pool().await);
        store.init_schema().await.unwrap();
        let queue_pool = memory_pool().await;
        let queue = SqliteTaskQueue::from_pools(queue_pool.clone(), queue_pool);
        queue.init_schema().await.unwrap();
        (store, queue)
    }

    /// Store and queue on one SQLite file, as with a shared `DATABASE_URL`
    async fn shared_file(dir: &TempDir) -> (JobStore, Arc<SqliteTaskQueue>) {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("jobs.db").display());
        let store = JobStore::connect(&url).await.unwrap();
        let queue = Arc::new(SqliteTaskQueue::connect(&url, &url).await.unwrap());
        (store, queue)
    }

    fn request(file: &NamedTempFile) -> AnalyzeRequest {
        AnalyzeRequest {
            query: "Summarise".to_string(),
            file_path: file.path().display().to_string(),
            user_id: None,
        }
    }

    struct Echo;

    #[async_trait]
    impl Task for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn run(&self, context: Context, _upstream: &Upstream) -> crew_flow::Result<TaskResult> {
            let query: String = context.get("query").await.unwrap_or_default();
            Ok(TaskResult::new(format!("# Report\n{query}")))
        }
    }

    /// Hands each message to a worker before `enqueue` returns
    struct EagerQueue {
        inner: Arc<SqliteTaskQueue>,
        worker: Worker,
        outcome: Mutex<Option<std::result::Result<String, String>>>,
    }

    impl EagerQueue {
        fn new(store: JobStore, inner: Arc<SqliteTaskQueue>) -> Self {
            let pipeline = PipelineBuilder::new("eager").add_task(Arc::new(Echo)).build().unwrap();
            let worker = Worker::new(store, inner.clone(), Arc::new(pipeline));
            Self {
                inner,
                worker,
                outcome: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TaskQueue for EagerQueue {
        async fn enqueue(&self, item: &WorkItem) -> Result<String> {
            let task_id = self.inner.enqueue(item).await?;
            if let Some(delivery) = self.inner.reserve().await? {
                let outcome = self.worker.process(&delivery).await.map_err(|e| e.to_string());
                *self.outcome.lock().unwrap() = Some(outcome);
            }
            Ok(task_id)
        }

        async fn reserve(&self) -> Result<Option<Delivery>> {
            self.inner.reserve().await
        }

        async fn mark_started(&self, task_id: &str) -> Result<()> {
            self.inner.mark_started(task_id).await
        }

        async fn mark_succeeded(&self, task_id: &str, result: &str) -> Result<()> {
            self.inner.mark_succeeded(task_id, result).await
        }

        async fn mark_failed(&self, task_id: &str, error: &str) -> Result<()> {
            self.inner.mark_failed(task_id, error).await
        }

        async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
            self.inner.status(task_id).await
        }
    }

    #[tokio::test]
    async fn test_submission_persists_and_enqueues() {
        let (store, queue) = setup().await;
        let file = NamedTempFile::with_suffix(".pdf").unwrap();

        let submission = submit_analysis_job(&store, &queue, request(&file))
            .await
            .unwrap();

        let record = store.get(submission.result_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.task_id, submission.task_id);
        assert!(!record.has_placeholder_task_id());
        assert_eq!(record.user_id, DEFAULT_USER_ID);

        let delivery = queue.reserve().await.unwrap().unwrap();
        assert_eq!(delivery.task_id, submission.task_id);
        assert_eq!(delivery.item.result_id, submission.result_id);
    }

    #[tokio::test]
    async fn test_missing_file_creates_nothing() {
        let (store, queue) = setup().await;

        let err = submit_analysis_job(
            &store,
            &queue,
            AnalyzeRequest {
                query: "Summarise".to_string(),
                file_path: "missing.pdf".to_string(),
                user_id: Some("alice".to_string()),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::DocumentNotFound { .. }));
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_worker_picking_up_message_immediately_finds_record() {
        let dir = TempDir::new().unwrap();
        let (store, inner) = shared_file(&dir).await;
        let queue = EagerQueue::new(store.clone(), inner.clone());
        let file = NamedTempFile::with_suffix(".pdf").unwrap();

        let submission = submit_analysis_job(&store, &queue, request(&file))
            .await
            .unwrap();

        let outcome = queue.outcome.lock().unwrap().take().unwrap();
        assert_eq!(outcome, Ok("# Report\nSummarise".to_string()));

        let record = store.get(submission.result_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Success);
        assert_eq!(record.task_id, submission.task_id);
        assert_eq!(record.final_report.as_deref(), Some("# Report\nSummarise"));

        let status = inner.status(&submission.task_id).await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Success);
        assert_eq!(inner.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_and_queue_can_share_one_file() {
        let dir = TempDir::new().unwrap();
        let (store, queue) = shared_file(&dir).await;
        let file = NamedTempFile::with_suffix(".pdf").unwrap();

        let started = Instant::now();
        let submission = submit_analysis_job(&store, queue.as_ref(), request(&file))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        let record = store.get(submission.result_id).await.unwrap().unwrap();
        assert_eq!(record.task_id, submission.task_id);
        assert_eq!(queue.depth().await.unwrap(), 1);
    }
}
