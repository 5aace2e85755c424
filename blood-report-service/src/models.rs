use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;

/// Prefix of the task id a record carries until the queue has accepted the job.
/// Each placeholder gets a unique suffix since `task_id` is unique.
pub const PLACEHOLDER_TASK_PREFIX: &str = "temp-";

pub fn placeholder_task_id() -> String {
    format!("{PLACEHOLDER_TASK_PREFIX}{}", uuid::Uuid::new_v4())
}

pub const DEFAULT_USER_ID: &str = "default_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILURE" => Ok(JobStatus::Failure),
            other => Err(ServiceError::UnknownStatus(other.to_string())),
        }
    }
}

/// One row of `analysis_results`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub task_id: String,
    pub user_id: String,
    pub file_path: String,
    pub query: String,
    pub status: JobStatus,
    pub final_report: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn has_placeholder_task_id(&self) -> bool {
        self.task_id.starts_with(PLACEHOLDER_TASK_PREFIX)
    }
}

/// Message carried by the task queue from submission to worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub query: String,
    pub file_path: String,
    pub result_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
    pub file_path: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Returned once a job is persisted and queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub result_id: i64,
    pub task_id: String,
}
