//! PostgreSQL job store.
//!
//! Persists [`ScanJob`] records in the `scan_jobs` table. Lifecycle
//! mutations lock the row (`SELECT ... FOR UPDATE`), apply the shared
//! transition rules from `siteaudit_core::scan`, and write the outcome
//! back, so both store backends enforce identical semantics.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use siteaudit_core::scan::{JobStatus, LogEntry, ScanJob};
use siteaudit_core::store::{JobStore, StoreError};
use siteaudit_core::types::{JobId, Timestamp};

/// Column list for `scan_jobs` queries.
const COLUMNS: &str =
    "id, url, status, progress, options, result, error, logs, created_at, completed_at";

/// PostgreSQL-backed [`JobStore`].
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a row for update inside `tx`, decoded into a [`ScanJob`].
    async fn fetch_locked(
        tx: &mut Transaction<'_, Postgres>,
        id: JobId,
    ) -> Result<ScanJob, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM scan_jobs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;

        row.ok_or(StoreError::NotFound(id)).and_then(|r| row_to_job(&r))
    }

    /// Write the mutable lifecycle fields of `job` back inside `tx`.
    ///
    /// Logs are excluded — they are appended directly in SQL so the
    /// sequence stays append-only without rewriting the whole array.
    async fn save(tx: &mut Transaction<'_, Postgres>, job: &ScanJob) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE scan_jobs \
             SET status = $2, progress = $3, result = $4, error = $5, completed_at = $6 \
             WHERE id = $1",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.completed_at)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Lock the record, apply `mutate`, persist, and return its output.
    async fn mutate_job<F, T>(&self, id: JobId, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut ScanJob) -> T + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut job = Self::fetch_locked(&mut tx, id).await?;
        let out = mutate(&mut job);
        Self::save(&mut tx, &job).await?;
        tx.commit().await.map_err(backend)?;
        Ok(out)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, url: &str, options: Value) -> Result<ScanJob, StoreError> {
        let query = format!(
            "INSERT INTO scan_jobs (url, options) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(url)
            .bind(options)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        row_to_job(&row)
    }

    async fn get(&self, id: JobId) -> Result<ScanJob, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM scan_jobs WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.ok_or(StoreError::NotFound(id)).and_then(|r| row_to_job(&r))
    }

    async fn list(&self) -> Result<Vec<ScanJob>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM scan_jobs ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(row_to_job).collect()
    }

    async fn mark_running(&self, id: JobId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE scan_jobs SET status = 'running' WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // Row may legitimately not match (already running or terminal),
        // but a missing job is a caller bug worth surfacing.
        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM scan_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?
                .is_some();
            if !exists {
                return Err(StoreError::NotFound(id));
            }
        }
        Ok(())
    }

    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), StoreError> {
        let entry = serde_json::to_value(&entry)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let result = sqlx::query("UPDATE scan_jobs SET logs = logs || $2::jsonb WHERE id = $1")
            .bind(id)
            .bind(entry)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn update_progress(
        &self,
        id: JobId,
        progress: u8,
        status: Option<JobStatus>,
    ) -> Result<(), StoreError> {
        self.mutate_job(id, |job| {
            job.apply_progress(progress, status);
        })
        .await
    }

    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<bool, StoreError> {
        self.mutate_job(id, |job| job.apply_complete(result)).await
    }

    async fn fail(&self, id: JobId, error: Option<String>) -> Result<bool, StoreError> {
        self.mutate_job(id, |job| job.apply_fail(error)).await
    }

    async fn healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// Decode one `scan_jobs` row.
fn row_to_job(row: &PgRow) -> Result<ScanJob, StoreError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let status: JobStatus = status.parse().map_err(StoreError::Backend)?;

    let progress: i16 = row.try_get("progress").map_err(backend)?;

    let logs: Value = row.try_get("logs").map_err(backend)?;
    let logs: Vec<LogEntry> =
        serde_json::from_value(logs).map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(ScanJob {
        id: row.try_get("id").map_err(backend)?,
        url: row.try_get("url").map_err(backend)?,
        status,
        progress: progress.clamp(0, 100) as u8,
        options: row.try_get("options").map_err(backend)?,
        result: row.try_get("result").map_err(backend)?,
        error: row.try_get("error").map_err(backend)?,
        logs,
        created_at: row.try_get::<Timestamp, _>("created_at").map_err(backend)?,
        completed_at: row.try_get("completed_at").map_err(backend)?,
    })
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}
