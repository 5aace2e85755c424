//! Job record store for the `analysis_results` table.
//!
//! The record is the single source of truth for a job's outcome. Status
//! changes are conditional updates so a record can only move forward:
//! PENDING → RUNNING → SUCCESS | FAILURE.
//!
//! Every write is its own short statement. Nothing holds the write lock
//! across a call into the queue, so the store and the queue may share one
//! SQLite file.

use chrono::Utc;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqlitePoolOptions, SqliteRow},
};
use tracing::{info, warn};

use crate::{
    error::{Result, ServiceError},
    models::{JobRecord, JobStatus, placeholder_task_id},
};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS analysis_results (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id      TEXT NOT NULL UNIQUE,
    user_id      TEXT NOT NULL DEFAULT 'default_user',
    file_path    TEXT NOT NULL,
    query        TEXT NOT NULL,
    status       TEXT NOT NULL DEFAULT 'PENDING',
    final_report TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT
)"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_analysis_results_task_id ON analysis_results (task_id)",
    "CREATE INDEX IF NOT EXISTS idx_analysis_results_user_id ON analysis_results (user_id)",
];

#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.init_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the table and its indexes if missing
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        for index in CREATE_INDEXES {
            sqlx::query(index).execute(&self.pool).await?;
        }
        info!("analysis_results table ready");
        Ok(())
    }

    /// Insert a committed PENDING record carrying a placeholder task id; returns the new id
    pub async fn insert_pending(&self, user_id: &str, file_path: &str, query: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO analysis_results (task_id, user_id, file_path, query, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(placeholder_task_id())
        .bind(user_id)
        .bind(file_path)
        .bind(query)
        .bind(JobStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Replace the placeholder with the queue-assigned task id, whatever the status
    pub async fn set_task_id(&self, id: i64, task_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE analysis_results SET task_id = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(task_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::JobNotFound(id));
        }
        Ok(())
    }

    /// Delete a record no worker has picked up yet. Returns false once the
    /// record has left PENDING, in which case it is kept.
    pub async fn discard_pending(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analysis_results WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(JobStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        let discarded = result.rows_affected() > 0;
        if discarded {
            info!(result_id = id, "Pending record discarded");
        } else {
            warn!(result_id = id, "Record already picked up, not discarded");
        }
        Ok(discarded)
    }

    pub async fn get(&self, id: i64) -> Result<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM analysis_results WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn get_by_task_id(&self, task_id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM analysis_results WHERE task_id = ?1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// Most recent records first
    pub async fn list(&self, limit: i64) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query("SELECT * FROM analysis_results ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn mark_running(&self, id: i64) -> Result<()> {
        self.transition(id, JobStatus::Pending, JobStatus::Running, None)
            .await
    }

    pub async fn mark_success(&self, id: i64, report: &str) -> Result<()> {
        self.transition(id, JobStatus::Running, JobStatus::Success, Some(report))
            .await
    }

    /// Fail a record from either non-terminal status
    pub async fn mark_failure(&self, id: i64, error_message: &str) -> Result<()> {
        match self
            .transition(id, JobStatus::Running, JobStatus::Failure, Some(error_message))
            .await
        {
            Err(ServiceError::InvalidTransition { .. }) => {
                self.transition(id, JobStatus::Pending, JobStatus::Failure, Some(error_message))
                    .await
            }
            other => other,
        }
    }

    async fn transition(
        &self,
        id: i64,
        expected: JobStatus,
        to: JobStatus,
        final_report: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE analysis_results
             SET status = ?1, final_report = COALESCE(?2, final_report), updated_at = ?3
             WHERE id = ?4 AND status = ?5",
        )
        .bind(to.as_str())
        .bind(final_report)
        .bind(Utc::now())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await? {
                Some(_) => Err(ServiceError::InvalidTransition { id, expected, to }),
                None => Err(ServiceError::JobNotFound(id)),
            };
        }

        info!(result_id = id, from = %expected, to = %to, "Job status updated");
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let status: String = row.try_get("status")?;
    Ok(JobRecord {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        user_id: row.try_get("user_id")?,
        file_path: row.try_get("file_path")?,
        query: row.try_get("query")?,
        status: status.parse()?,
        final_report: row.try_get("final_report")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> JobStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = JobStore::from_pool(pool);
        store.init_schema().await.unwrap();
        store
    }

    async fn insert(store: &JobStore, task_id: &str) -> i64 {
        let id = store
            .insert_pending("default_user", "data/sample.pdf", "Summarise my results")
            .await
            .unwrap();
        store.set_task_id(id, task_id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let store = memory_store().await;

        let first = insert(&store, "task-1").await;
        let second = insert(&store, "task-2").await;
        assert_eq!(second, first + 1);

        let record = store.get(first).await.unwrap().unwrap();
        assert_eq!(record.task_id, "task-1");
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.final_report.is_none());
        assert!(record.updated_at.is_some());

        let by_task = store.get_by_task_id("task-2").await.unwrap().unwrap();
        assert_eq!(by_task.id, second);
    }

    #[tokio::test]
    async fn test_placeholder_task_ids_are_unique() {
        let store = memory_store().await;

        let a = store.insert_pending("default_user", "a.pdf", "q").await.unwrap();
        let b = store.insert_pending("default_user", "b.pdf", "q").await.unwrap();

        let a = store.get(a).await.unwrap().unwrap();
        let b = store.get(b).await.unwrap().unwrap();
        assert!(a.has_placeholder_task_id());
        assert!(b.has_placeholder_task_id());
        assert_ne!(a.task_id, b.task_id);
    }

    #[tokio::test]
    async fn test_discard_only_removes_pending_records() {
        let store = memory_store().await;

        let unclaimed = store.insert_pending("default_user", "a.pdf", "q").await.unwrap();
        assert!(store.discard_pending(unclaimed).await.unwrap());
        assert!(store.get(unclaimed).await.unwrap().is_none());

        let claimed = insert(&store, "task-1").await;
        store.mark_running(claimed).await.unwrap();
        assert!(!store.discard_pending(claimed).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_forward_transitions_only() {
        let store = memory_store().await;
        let id = insert(&store, "task-1").await;

        // cannot finish a job that never started
        let err = store.mark_success(id, "report").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition {
                expected: JobStatus::Running,
                to: JobStatus::Success,
                ..
            }
        ));

        store.mark_running(id).await.unwrap();
        assert!(store.mark_running(id).await.is_err());

        store.mark_failure(id, "An error occurred: boom").await.unwrap();
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failure);
        assert_eq!(record.final_report.as_deref(), Some("An error occurred: boom"));

        // terminal is final
        assert!(store.mark_success(id, "late").await.is_err());
        assert!(store.mark_failure(id, "again").await.is_err());
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failure);
        assert_eq!(record.final_report.as_deref(), Some("An error occurred: boom"));
    }

    #[tokio::test]
    async fn test_pending_record_can_fail_directly() {
        let store = memory_store().await;
        let id = insert(&store, "task-1").await;

        store.mark_failure(id, "An error occurred: queue down").await.unwrap();
        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Failure);
        assert_eq!(record.final_report.as_deref(), Some("An error occurred: queue down"));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let store = memory_store().await;
        assert!(store.get(42).await.unwrap().is_none());
        assert!(matches!(
            store.mark_running(42).await,
            Err(ServiceError::JobNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = memory_store().await;
        let a = insert(&store, "a").await;
        let b = insert(&store, "b").await;

        let records = store.list(10).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(store.list(1).await.unwrap().len(), 1);
    }
}
