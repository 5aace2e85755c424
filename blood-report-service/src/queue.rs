//! Task queue between the submission path and workers.
//!
//! The broker is a `queue_messages` table; the result backend is a
//! `task_results` table where the queue keeps its own view of each task
//! (PENDING → STARTED → SUCCESS | FAILURE). Job readers use the job record,
//! not this table.
//!
//! Delivery is at most once: a reserved message is never handed out again,
//! and there is no retry.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    error::{Result, ServiceError},
    models::WorkItem,
};

/// The queue's own bookkeeping for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Started => "STARTED",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(TaskState::Pending),
            "STARTED" => Ok(TaskState::Started),
            "SUCCESS" => Ok(TaskState::Success),
            "FAILURE" => Ok(TaskState::Failure),
            other => Err(ServiceError::Queue(format!("unknown task state `{other}`"))),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reserved message, ready to be processed by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub task_id: String,
    pub item: WorkItem,
}

/// What the result backend knows about a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    pub result: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publish a work item; returns the queue-assigned task id
    async fn enqueue(&self, item: &WorkItem) -> Result<String>;

    /// Claim the oldest ready message, if any
    async fn reserve(&self) -> Result<Option<Delivery>>;

    async fn mark_started(&self, task_id: &str) -> Result<()>;

    async fn mark_succeeded(&self, task_id: &str, result: &str) -> Result<()>;

    async fn mark_failed(&self, task_id: &str, error: &str) -> Result<()>;

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>>;
}

const CREATE_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS queue_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id     TEXT NOT NULL UNIQUE,
    payload     TEXT NOT NULL,
    state       TEXT NOT NULL DEFAULT 'ready',
    enqueued_at TEXT NOT NULL,
    reserved_at TEXT
)"#;

const CREATE_MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_queue_messages_state ON queue_messages (state, id)";

const CREATE_RESULTS: &str = r#"
CREATE TABLE IF NOT EXISTS task_results (
    task_id    TEXT PRIMARY KEY,
    state      TEXT NOT NULL,
    result     TEXT,
    error      TEXT,
    updated_at TEXT NOT NULL
)"#;

/// SQLite-backed broker and result backend
#[derive(Clone)]
pub struct SqliteTaskQueue {
    broker: SqlitePool,
    backend: SqlitePool,
}

impl SqliteTaskQueue {
    pub async fn connect(broker_url: &str, result_backend_url: &str) -> Result<Self> {
        let broker = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(broker_url)
            .await?;
        let backend = if result_backend_url == broker_url {
            broker.clone()
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(result_backend_url)
                .await?
        };

        let queue = Self::from_pools(broker, backend);
        queue.init_schema().await?;
        Ok(queue)
    }

    pub fn from_pools(broker: SqlitePool, backend: SqlitePool) -> Self {
        Self { broker, backend }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_MESSAGES).execute(&self.broker).await?;
        sqlx::query(CREATE_MESSAGES_INDEX)
            .execute(&self.broker)
            .await?;
        sqlx::query(CREATE_RESULTS).execute(&self.backend).await?;
        Ok(())
    }

    /// Number of messages still waiting for a worker
    pub async fn depth(&self) -> Result<i64> {
        let depth: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE state = 'ready'")
                .fetch_one(&self.broker)
                .await?;
        Ok(depth)
    }

    async fn record_state(
        &self,
        task_id: &str,
        state: TaskState,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO task_results (task_id, state, result, error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (task_id) DO UPDATE SET
                state = excluded.state,
                result = excluded.result,
                error = excluded.error,
                updated_at = excluded.updated_at",
        )
        .bind(task_id)
        .bind(state.as_str())
        .bind(result)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.backend)
        .await?;

        debug!(task_id, state = %state, "Task state recorded");
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for SqliteTaskQueue {
    async fn enqueue(&self, item: &WorkItem) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_string(item)?;

        sqlx::query(
            "INSERT INTO queue_messages (task_id, payload, state, enqueued_at)
             VALUES (?1, ?2, 'ready', ?3)",
        )
        .bind(&task_id)
        .bind(&payload)
        .bind(Utc::now())
        .execute(&self.broker)
        .await?;

        self.record_state(&task_id, TaskState::Pending, None, None)
            .await?;

        info!(task_id = %task_id, result_id = item.result_id, "Work item enqueued");
        Ok(task_id)
    }

    async fn reserve(&self) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            "UPDATE queue_messages
             SET state = 'reserved', reserved_at = ?1
             WHERE id = (
                SELECT id FROM queue_messages WHERE state = 'ready' ORDER BY id LIMIT 1
             )
             RETURNING task_id, payload",
        )
        .bind(Utc::now())
        .fetch_optional(&self.broker)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let task_id: String = row.try_get("task_id")?;
        let payload: String = row.try_get("payload")?;
        let item: WorkItem = serde_json::from_str(&payload)?;

        debug!(task_id = %task_id, "Work item reserved");
        Ok(Some(Delivery { task_id, item }))
    }

    async fn mark_started(&self, task_id: &str) -> Result<()> {
        self.record_state(task_id, TaskState::Started, None, None)
            .await
    }

    async fn mark_succeeded(&self, task_id: &str, result: &str) -> Result<()> {
        self.record_state(task_id, TaskState::Success, Some(result), None)
            .await
    }

    async fn mark_failed(&self, task_id: &str, error: &str) -> Result<()> {
        self.record_state(task_id, TaskState::Failure, None, Some(error))
            .await
    }

    async fn status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        let row = sqlx::query("SELECT * FROM task_results WHERE task_id = ?1")
            .bind(task_id)
            .fetch_optional(&self.backend)
            .await?;

        row.map(|row| -> Result<TaskStatus> {
            let state: String = row.try_get("state")?;
            Ok(TaskStatus {
                task_id: row.try_get("task_id")?,
                state: TaskState::parse(&state)?,
                result: row.try_get("result")?,
                error: row.try_get("error")?,
            })
        })
        .transpose()
    }
}
