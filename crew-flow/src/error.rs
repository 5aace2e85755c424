use thiserror::Error;

/// Errors produced while building or running a crew pipeline
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("LLM call failed: {0}")]
    LlmFailed(String),

    #[error("LLM call timed out after {secs}s")]
    LlmTimeout { secs: u64 },
}

pub type Result<T> = std::result::Result<T, FlowError>;
