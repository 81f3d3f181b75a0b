//! Narrow storage contract for scan job records.
//!
//! The orchestrator is the only writer; reads may come from any number
//! of concurrent callers. Implementations live in `siteaudit-db`
//! (in-memory and PostgreSQL) — the rest of the workspace depends only
//! on this trait, so the backing store is swappable.

use async_trait::async_trait;
use serde_json::Value;

use crate::scan::{JobStatus, LogEntry, ScanJob};
use crate::types::JobId;

/// Errors surfaced by a [`JobStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scan job {0} not found")]
    NotFound(JobId),

    /// The backing store itself failed (connection lost, query error).
    #[error("Job store backend error: {0}")]
    Backend(String),
}

/// Persistence contract for [`ScanJob`] records.
///
/// Mutation semantics follow the lifecycle rules on [`ScanJob`]: progress
/// never decreases, logs only grow, and no update moves a job out of a
/// terminal state. `complete`/`fail` report whether the transition was
/// applied so callers can detect late events against finished jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a new `pending` record with a freshly-issued id.
    async fn create(&self, url: &str, options: Value) -> Result<ScanJob, StoreError>;

    /// Fetch one record by id.
    async fn get(&self, id: JobId) -> Result<ScanJob, StoreError>;

    /// All known records, newest-first by creation time.
    async fn list(&self) -> Result<Vec<ScanJob>, StoreError>;

    /// Promote `pending` to `running`; no-op in any other state.
    async fn mark_running(&self, id: JobId) -> Result<(), StoreError>;

    /// Append one entry to the job's log sequence.
    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), StoreError>;

    /// Apply a progress update (see [`ScanJob::apply_progress`]).
    async fn update_progress(
        &self,
        id: JobId,
        progress: u8,
        status: Option<JobStatus>,
    ) -> Result<(), StoreError>;

    /// Complete the job, merging an optional result payload. Returns
    /// whether the record accepted the transition.
    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<bool, StoreError>;

    /// Fail the job with an optional reason. Returns whether the record
    /// accepted the transition (false if already terminal).
    async fn fail(&self, id: JobId, error: Option<String>) -> Result<bool, StoreError>;

    /// Whether the backing store is reachable. Used by the health check.
    async fn healthy(&self) -> bool;
}
