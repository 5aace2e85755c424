pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod service;
pub mod submit;
pub mod tasks;
pub mod tools;
pub mod worker;
pub mod workflow;

pub use agents::Roster;
pub use db::JobStore;
pub use error::{Result, ServiceError};
pub use models::*;
pub use queue::{Delivery, SqliteTaskQueue, TaskQueue, TaskState, TaskStatus};
pub use service::{AppState, create_app};
pub use submit::submit_analysis_job;
pub use tools::Toolkit;
pub use worker::Worker;
pub use workflow::{build_report_pipeline, create_analysis_context};
