use crew_flow::FlowError;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::JobStatus;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("File not found at {}", path.display())]
    DocumentNotFound { path: PathBuf },

    #[error("Analysis result {0} not found")]
    JobNotFound(i64),

    #[error("Analysis result {id} cannot move to {to}: expected status {expected}")]
    InvalidTransition {
        id: i64,
        expected: JobStatus,
        to: JobStatus,
    },

    #[error("The analysis pipeline produced an empty report")]
    EmptyReport,

    #[error("Unknown job status `{0}`")]
    UnknownStatus(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Pipeline(#[from] FlowError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
