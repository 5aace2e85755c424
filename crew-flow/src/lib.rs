pub mod agent;
pub mod context;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod task;

// Re-export commonly used types
pub use agent::{Agent, AgentBuilder};
pub use context::Context;
pub use error::{FlowError, Result};
#[cfg(feature = "rig")]
pub use llm::OpenRouterClient;
pub use llm::{BoundedLlm, CallBounds, CompletionRequest, LlmClient};
pub use pipeline::{ExecutionResult, Pipeline, PipelineBuilder, TaskOutput};
pub use task::{Task, TaskResult, Upstream};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records what it saw and emits `<id>(<upstream ids>)`
    struct RecordingTask {
        id: String,
        seen: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        fail: bool,
    }

    impl RecordingTask {
        fn new(id: &str, seen: &Arc<Mutex<Vec<(String, Vec<String>)>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                seen: seen.clone(),
                fail: false,
            })
        }

        fn failing(id: &str, seen: &Arc<Mutex<Vec<(String, Vec<String>)>>>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                seen: seen.clone(),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl Task for RecordingTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context, upstream: &Upstream) -> Result<TaskResult> {
            let ids: Vec<String> = upstream.task_ids().iter().map(|s| s.to_string()).collect();
            self.seen.lock().unwrap().push((self.id.clone(), ids.clone()));

            if self.fail {
                return Err(FlowError::TaskExecutionFailed(format!("{} exploded", self.id)));
            }

            let input: String = context.get("input").await.unwrap_or_default();
            Ok(TaskResult::new(format!("{}[{}]({})", self.id, input, ids.join(","))))
        }
    }

    #[tokio::test]
    async fn test_sequential_execution_threads_declared_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let pipeline = PipelineBuilder::new("test_pipeline")
            .add_task(RecordingTask::new("a", &seen))
            .add_task_with_context(RecordingTask::new("b", &seen), &["a"])
            .add_task_with_context(RecordingTask::new("c", &seen), &["b"])
            .add_task_with_context(RecordingTask::new("d", &seen), &["b"])
            .add_task_with_context(RecordingTask::new("e", &seen), &["b", "c", "d"])
            .build()
            .unwrap();

        let context = Context::new();
        context.set("input", "x").await;

        let result = pipeline.execute(context).await.unwrap();

        let order: Vec<&str> = result.task_outputs.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(result.output, "e[x](b,c,d)");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("a".to_string(), vec![]));
        assert_eq!(seen[2], ("c".to_string(), vec!["b".to_string()]));
        assert_eq!(
            seen[4],
            (
                "e".to_string(),
                vec!["b".to_string(), "c".to_string(), "d".to_string()]
            )
        );
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_tasks() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let pipeline = PipelineBuilder::new("failing")
            .add_task(RecordingTask::new("a", &seen))
            .add_task_with_context(RecordingTask::failing("b", &seen), &["a"])
            .add_task_with_context(RecordingTask::new("c", &seen), &["b"])
            .build()
            .unwrap();

        let err = pipeline.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::TaskExecutionFailed(ref msg) if msg == "b exploded"));

        let ran: Vec<String> = seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ran, vec!["a", "b"]);
    }

    #[test]
    fn test_build_rejects_forward_and_unknown_dependencies() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let forward = PipelineBuilder::new("forward")
            .add_task_with_context(RecordingTask::new("a", &seen), &["b"])
            .add_task(RecordingTask::new("b", &seen))
            .build();
        assert!(matches!(forward, Err(FlowError::InvalidPipeline(_))));

        let duplicate = PipelineBuilder::new("duplicate")
            .add_task(RecordingTask::new("a", &seen))
            .add_task(RecordingTask::new("a", &seen))
            .build();
        assert!(matches!(duplicate, Err(FlowError::InvalidPipeline(_))));

        let empty = PipelineBuilder::new("empty").build();
        assert!(matches!(empty, Err(FlowError::InvalidPipeline(_))));
    }

    #[test]
    fn test_dependencies_lookup() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PipelineBuilder::new("deps")
            .add_task(RecordingTask::new("a", &seen))
            .add_task_with_context(RecordingTask::new("b", &seen), &["a"])
            .build()
            .unwrap();

        assert_eq!(pipeline.task_ids(), vec!["a", "b"]);
        assert_eq!(pipeline.dependencies("b"), Some(&["a".to_string()][..]));
        assert!(pipeline.dependencies("zzz").is_none());
        assert!(pipeline.get_task("a").is_some());
        assert_eq!(pipeline.dependencies("a"), Some(&[] as &[String]));

        let debug = format!("{pipeline:?}");
        assert!(debug.contains("\"deps\""));
        assert!(debug.contains("(\"b\", [\"a\"])"));
    }

    #[test]
    fn test_upstream_render() {
        let upstream: Upstream = vec![
            ("analysis".to_string(), "Iron is low.\n".to_string()),
            ("nutrition".to_string(), "Eat lentils.".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(upstream.get("nutrition"), Some("Eat lentils."));
        assert_eq!(
            upstream.render(),
            "### Output of `analysis`\nIron is low.\n\n### Output of `nutrition`\nEat lentils.\n"
        );
    }
}
