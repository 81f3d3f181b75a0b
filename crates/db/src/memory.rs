//! In-memory job store.
//!
//! The default backend when no `DATABASE_URL` is configured, and the one
//! used throughout the test suites. Thread-safe via an interior `RwLock`;
//! designed to be wrapped in `Arc` and shared.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use siteaudit_core::scan::{JobStatus, LogEntry, ScanJob};
use siteaudit_core::store::{JobStore, StoreError};
use siteaudit_core::types::JobId;

/// HashMap-backed [`JobStore`]. Ids are issued sequentially from 1.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, ScanJob>>,
    next_id: AtomicI64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Run a closure against a mutable record, or `NotFound`.
    async fn with_job<F, T>(&self, id: JobId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut ScanJob) -> T,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        Ok(f(job))
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, url: &str, options: Value) -> Result<ScanJob, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = ScanJob::new(id, url, options);
        self.jobs.write().await.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<ScanJob, StoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<ScanJob>, StoreError> {
        let mut jobs: Vec<ScanJob> = self.jobs.read().await.values().cloned().collect();
        // Newest-first; ids break ties for jobs created within the same tick.
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn mark_running(&self, id: JobId) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.note_running();
        })
        .await
    }

    async fn append_log(&self, id: JobId, entry: LogEntry) -> Result<(), StoreError> {
        self.with_job(id, |job| job.logs.push(entry)).await
    }

    async fn update_progress(
        &self,
        id: JobId,
        progress: u8,
        status: Option<JobStatus>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.apply_progress(progress, status);
        })
        .await
    }

    async fn complete(&self, id: JobId, result: Option<Value>) -> Result<bool, StoreError> {
        self.with_job(id, |job| job.apply_complete(result)).await
    }

    async fn fail(&self, id: JobId, error: Option<String>) -> Result<bool, StoreError> {
        self.with_job(id, |job| job.apply_fail(error)).await
    }

    async fn healthy(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
