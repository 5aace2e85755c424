use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span};

use crate::{
    context::Context,
    error::{FlowError, Result},
    task::{Task, Upstream},
};

/// A task plus the ids of earlier tasks whose output it may read
#[derive(Clone)]
struct Stage {
    task: Arc<dyn Task>,
    context: Vec<String>,
}

/// An ordered, strictly sequential list of tasks.
///
/// Order is the insertion order used with [`PipelineBuilder`]; each task only
/// sees the outputs of the tasks it declared as context.
pub struct Pipeline {
    pub id: String,
    stages: Vec<Stage>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field(
                "stages",
                &self
                    .stages
                    .iter()
                    .map(|s| (s.task.id(), &s.context))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Pipeline {
    /// Ids of all tasks in execution order
    pub fn task_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.task.id()).collect()
    }

    /// Declared context of a task
    pub fn dependencies(&self, task_id: &str) -> Option<&[String]> {
        self.stages
            .iter()
            .find(|s| s.task.id() == task_id)
            .map(|s| s.context.as_slice())
    }

    /// Get a task by ID
    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.stages
            .iter()
            .find(|s| s.task.id() == task_id)
            .map(|s| s.task.clone())
    }

    /// Run every task once, in order, threading declared outputs forward.
    ///
    /// The first failing task aborts the run; later tasks are never started.
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        let mut outputs: HashMap<String, String> = HashMap::with_capacity(self.stages.len());
        let mut task_outputs = Vec::with_capacity(self.stages.len());

        info!(pipeline = %self.id, tasks = self.stages.len(), "Starting pipeline");

        for stage in &self.stages {
            let task_id = stage.task.id().to_string();
            let upstream = collect_upstream(&task_id, &stage.context, &outputs)?;

            let span = info_span!("stage", task = %task_id);
            let result = async {
                info!(context = ?upstream.task_ids(), "Running task");
                stage.task.run(context.clone(), &upstream).await
            }
            .instrument(span)
            .await;

            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    error!(pipeline = %self.id, task = %task_id, "Task failed: {}", e);
                    return Err(e);
                }
            };

            info!(
                task = %task_id,
                chars = result.output.len(),
                status = result.status_message.as_deref().unwrap_or(""),
                "Task completed"
            );

            outputs.insert(task_id.clone(), result.output.clone());
            task_outputs.push(TaskOutput {
                task_id,
                output: result.output,
            });
        }

        let output = task_outputs
            .last()
            .map(|t| t.output.clone())
            .unwrap_or_default();

        info!(pipeline = %self.id, chars = output.len(), "Pipeline completed");

        Ok(ExecutionResult {
            output,
            task_outputs,
        })
    }
}

fn collect_upstream(
    task_id: &str,
    declared: &[String],
    outputs: &HashMap<String, String>,
) -> Result<Upstream> {
    declared
        .iter()
        .map(|dep| {
            outputs
                .get(dep)
                .map(|output| (dep.clone(), output.clone()))
                .ok_or_else(|| {
                    FlowError::ContextError(format!(
                        "output of `{dep}` not available for `{task_id}`"
                    ))
                })
        })
        .collect()
}

/// Builder for creating pipelines
pub struct PipelineBuilder {
    id: String,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stages: Vec::new(),
        }
    }

    /// Append a task that reads no upstream output
    pub fn add_task(self, task: Arc<dyn Task>) -> Self {
        self.add_task_with_context(task, &[] as &[&str])
    }

    /// Append a task that reads the outputs of `context` (ids of earlier tasks)
    pub fn add_task_with_context<S: AsRef<str>>(mut self, task: Arc<dyn Task>, context: &[S]) -> Self {
        self.stages.push(Stage {
            task,
            context: context.iter().map(|s| s.as_ref().to_string()).collect(),
        });
        self
    }

    /// Validate ordering and ids, then freeze the pipeline
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(FlowError::InvalidPipeline(format!(
                "pipeline `{}` has no tasks",
                self.id
            )));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let task_id = stage.task.id();
            if seen.contains(&task_id) {
                return Err(FlowError::InvalidPipeline(format!(
                    "duplicate task id `{task_id}`"
                )));
            }
            for dep in &stage.context {
                if !seen.contains(&dep.as_str()) {
                    return Err(FlowError::InvalidPipeline(format!(
                        "`{task_id}` depends on `{dep}`, which is not an earlier task"
                    )));
                }
            }
            seen.push(task_id);
        }

        Ok(Pipeline {
            id: self.id,
            stages: self.stages,
        })
    }
}

/// Output of one task within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub task_id: String,
    pub output: String,
}

/// Result of a full pipeline run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Output of the final task
    pub output: String,
    /// Every task's output in execution order
    pub task_outputs: Vec<TaskOutput>,
}
