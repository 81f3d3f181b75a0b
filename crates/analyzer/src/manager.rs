//! Scan job orchestration.
//!
//! [`ScanManager`] drives every job from creation to a terminal state:
//! it creates the record, spawns the analyzer, applies each worker event
//! to the store, and then forwards the event to the broadcaster — in
//! that order, so an observer who receives an event can immediately read
//! record state at least as current as the event implies.
//!
//! Per-job events are consumed by a single task in the order the worker
//! produced them, which serializes all record mutations for that job.
//! Jobs never share worker state, so any number can run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use siteaudit_core::event::ScanEvent;
use siteaudit_core::scan::{JobStatus, LogEntry, LogLevel, ScanJob};
use siteaudit_core::store::{JobStore, StoreError};
use siteaudit_core::types::JobId;
use siteaudit_events::ScanBroadcaster;

use crate::config::WorkerConfig;
use crate::process::{spawn_worker, WorkerHandle, WorkerUpdate};

/// How long shutdown waits for each in-flight job's event task.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Event-consumer tasks for jobs whose worker is still attached.
type RunningJobs = Arc<RwLock<HashMap<JobId, tokio::task::JoinHandle<()>>>>;

/// Orchestrates analyzer processes and job lifecycle state.
///
/// Created once at application startup via [`ScanManager::new`]; the
/// returned `Arc` is cheaply cloned into request handlers.
pub struct ScanManager {
    ctx: JobContext,
    worker: WorkerConfig,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

/// The pieces a per-job event task needs, detached from the manager so
/// tasks never keep the manager itself alive.
#[derive(Clone)]
struct JobContext {
    store: Arc<dyn JobStore>,
    broadcaster: Arc<ScanBroadcaster>,
    running: RunningJobs,
}

impl ScanManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        broadcaster: Arc<ScanBroadcaster>,
        worker: WorkerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx: JobContext {
                store,
                broadcaster,
                running: Arc::new(RwLock::new(HashMap::new())),
            },
            worker,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a job record and launch its analyzer.
    ///
    /// Returns as soon as the record exists and the process is spawned;
    /// the scan itself runs independently. A spawn failure transitions
    /// the job straight to `failed` — the record is still created and
    /// returned so the caller can surface it.
    pub async fn start_job(
        &self,
        url: &str,
        options: serde_json::Value,
    ) -> Result<ScanJob, StoreError> {
        let job = self.ctx.store.create(url, options.clone()).await?;
        tracing::info!(job_id = job.id, url = %job.url, "Scan job created");

        match spawn_worker(
            &self.worker,
            job.id,
            url,
            &options,
            self.cancel.child_token(),
        ) {
            Ok(handle) => {
                let consumer = tokio::spawn(consume_updates(self.ctx.clone(), job.id, handle));

                let mut running = self.ctx.running.write().await;
                running.insert(job.id, consumer);
                // The consumer task may have already finished (and found
                // nothing to remove) for a worker that dies instantly.
                if running.get(&job.id).is_some_and(|t| t.is_finished()) {
                    running.remove(&job.id);
                }
                Ok(job)
            }
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Analyzer spawn failed");
                let reason = e.to_string();

                let entry = LogEntry::new(LogLevel::Error, reason.clone());
                self.ctx.store.append_log(job.id, entry.clone()).await?;
                self.ctx
                    .broadcaster
                    .publish(job.id, &ScanEvent::Log(entry))
                    .await;

                if self.ctx.store.fail(job.id, Some(reason)).await? {
                    self.ctx
                        .broadcaster
                        .publish(
                            job.id,
                            &ScanEvent::Status {
                                status: JobStatus::Failed,
                            },
                        )
                        .await;
                }

                self.ctx.store.get(job.id).await
            }
        }
    }

    /// Apply one worker event to the record, then publish it. See
    /// [`JobContext::apply_event`] for the ordering contract.
    pub async fn apply_event(&self, job_id: JobId, event: ScanEvent) {
        self.ctx.apply_event(job_id, event).await;
    }

    /// Handle analyzer process termination for a job.
    pub async fn on_worker_exit(&self, job_id: JobId, code: Option<i32>) {
        self.ctx.on_worker_exit(job_id, code).await;
    }

    /// Number of jobs whose worker is still attached.
    pub async fn active_jobs(&self) -> usize {
        self.ctx.running.read().await.len()
    }

    /// Kill all workers and wait briefly for their event tasks to drain.
    ///
    /// Killed workers report through the normal exit path, so in-flight
    /// jobs land in `failed` with their logs intact.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down scan manager");
        self.cancel.cancel();

        // Drain under the lock, await outside it — the event tasks take
        // this lock themselves when they unregister.
        let tasks: Vec<_> = self.ctx.running.write().await.drain().collect();
        for (job_id, task) in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!(job_id, "Timed out waiting for scan event task");
            }
        }

        tracing::info!("Scan manager shut down");
    }
}

impl JobContext {
    /// Apply one worker event to the record, then publish it.
    ///
    /// Persist-then-publish: the event reaches observers only after the
    /// store reflects it. Events that lose against a terminal record
    /// (e.g. a stray `result` after a failure) leave the record alone
    /// but are still forwarded.
    async fn apply_event(&self, job_id: JobId, event: ScanEvent) {
        // The first observed output ends the pending window.
        if let Err(e) = self.store.mark_running(job_id).await {
            tracing::error!(job_id, error = %e, "Failed to mark job running");
            return;
        }

        let persisted = match &event {
            ScanEvent::Log(entry) => self
                .store
                .append_log(job_id, entry.clone())
                .await
                .map(|()| true),
            ScanEvent::Progress { progress, status } => self
                .store
                .update_progress(job_id, *progress, *status)
                .await
                .map(|()| true),
            ScanEvent::Result(payload) => self.store.complete(job_id, Some(payload.clone())).await,
            ScanEvent::Status { status } => match status {
                JobStatus::Failed => self.store.fail(job_id, None).await,
                JobStatus::Completed => self.store.complete(job_id, None).await,
                // Pending/running carry no record change beyond the
                // mark_running above.
                _ => Ok(true),
            },
            // Out-of-band activity is forwarded, never persisted.
            ScanEvent::Custom { .. } => Ok(true),
        };

        match persisted {
            Ok(_) => {
                self.broadcaster.publish(job_id, &event).await;
            }
            Err(e) => {
                tracing::error!(
                    job_id,
                    event = event.wire_tag(),
                    error = %e,
                    "Failed to persist event; withholding publish",
                );
            }
        }
    }

    /// Handle analyzer process termination.
    ///
    /// If no terminal event was processed for the job, force it to
    /// `failed` so every spawned worker leaves its job in a terminal
    /// state — even one that died silently mid-output.
    async fn on_worker_exit(&self, job_id: JobId, code: Option<i32>) {
        let reason = match code {
            Some(code) => {
                format!("Analyzer exited with code {code} before reporting a result")
            }
            None => "Analyzer was killed by a signal before reporting a result".to_string(),
        };

        match self.store.fail(job_id, Some(reason.clone())).await {
            Ok(true) => {
                tracing::warn!(job_id, exit_code = ?code, "Analyzer exited without terminal event");

                let entry = LogEntry::new(LogLevel::Error, reason);
                match self.store.append_log(job_id, entry.clone()).await {
                    Ok(()) => {
                        self.broadcaster.publish(job_id, &ScanEvent::Log(entry)).await;
                    }
                    Err(e) => {
                        tracing::error!(job_id, error = %e, "Failed to record exit log");
                    }
                }

                self.broadcaster
                    .publish(
                        job_id,
                        &ScanEvent::Status {
                            status: JobStatus::Failed,
                        },
                    )
                    .await;
            }
            Ok(false) => {
                tracing::debug!(job_id, exit_code = ?code, "Analyzer exited after terminal event");
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to record analyzer exit");
            }
        }
    }
}

/// Consume one worker's updates until it exits, then unregister.
async fn consume_updates(ctx: JobContext, job_id: JobId, mut handle: WorkerHandle) {
    while let Some(update) = handle.updates.recv().await {
        match update {
            WorkerUpdate::Event(event) => ctx.apply_event(job_id, event).await,
            WorkerUpdate::Exited { code } => {
                ctx.on_worker_exit(job_id, code).await;
                break;
            }
        }
    }

    ctx.running.write().await.remove(&job_id);
}
