//! Scan job model and lifecycle rules.
//!
//! A [`ScanJob`] tracks one invocation of the external analyzer from
//! submission to a terminal state. All state transitions go through the
//! methods on [`ScanJob`] so the lifecycle rules live in exactly one
//! place; store implementations call these and persist the outcome.

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a scan job.
///
/// Transitions are forward-only: `pending -> running -> {completed|failed}`.
/// Nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// Severity levels used by the analyzer's log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Debug,
    Warn,
    Error,
    Processing,
}

/// One line in a job's append-only log sequence. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScanJob
// ---------------------------------------------------------------------------

/// One tracked unit of work: a single external analyzer invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: JobId,
    /// Target URL handed to the analyzer.
    pub url: String,
    pub status: JobStatus,
    /// Completion percentage, 0-100. Never decreases while running and is
    /// frozen at its last value once the job reaches a terminal state.
    pub progress: u8,
    /// Analysis options, passed through to the analyzer verbatim.
    pub options: serde_json::Value,
    /// Analysis result payload. Opaque to the orchestration layer; object
    /// payloads arriving in multiple `result` events are shallow-merged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure reason, set when the job fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logs: Vec<LogEntry>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl ScanJob {
    /// A freshly-submitted job: `pending`, zero progress, empty log.
    pub fn new(id: JobId, url: impl Into<String>, options: serde_json::Value) -> Self {
        Self {
            id,
            url: url.into(),
            status: JobStatus::Pending,
            progress: 0,
            options,
            result: None,
            error: None,
            logs: Vec::new(),
            created_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the job running once the analyzer produces its first output.
    ///
    /// Only applies from `pending`; any other state is left untouched.
    /// Returns whether the record changed.
    pub fn note_running(&mut self) -> bool {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
            true
        } else {
            false
        }
    }

    /// Apply a progress update, optionally carrying a status change.
    ///
    /// Progress never moves backwards and is ignored entirely once the
    /// job is terminal. A carried `pending` status is ignored (no
    /// backward transitions); a carried terminal status also stamps
    /// `completed_at`. Returns whether the record changed.
    pub fn apply_progress(&mut self, progress: u8, status: Option<JobStatus>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let mut changed = false;
        let progress = progress.min(100);
        if progress > self.progress {
            self.progress = progress;
            changed = true;
        }

        match status {
            Some(JobStatus::Pending) | None => {}
            Some(next) => {
                if self.status != next {
                    self.status = next;
                    changed = true;
                }
                if next.is_terminal() && self.completed_at.is_none() {
                    self.completed_at = Some(chrono::Utc::now());
                    changed = true;
                }
            }
        }

        changed
    }

    /// Transition to `completed`, merging an optional result payload.
    ///
    /// A job that already failed stays failed and the payload is dropped
    /// (returns `false`). Re-completing is allowed so a `result` payload
    /// arriving after a progress-carried `completed` status still lands.
    pub fn apply_complete(&mut self, result: Option<serde_json::Value>) -> bool {
        if self.status == JobStatus::Failed {
            return false;
        }

        self.status = JobStatus::Completed;
        if let Some(payload) = result {
            self.result = Some(merge_result(self.result.take(), payload));
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(chrono::Utc::now());
        }
        true
    }

    /// Transition to `failed`, recording an optional reason.
    ///
    /// No-op on a job already in a terminal state (returns `false`).
    pub fn apply_fail(&mut self, error: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = JobStatus::Failed;
        if error.is_some() {
            self.error = error;
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(chrono::Utc::now());
        }
        true
    }
}

/// Shallow-merge a result payload into an existing one.
///
/// Two objects merge key-by-key (later wins); any other combination
/// replaces the previous payload wholesale.
pub fn merge_result(
    current: Option<serde_json::Value>,
    incoming: serde_json::Value,
) -> serde_json::Value {
    match (current, incoming) {
        (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(update)) => {
            base.extend(update);
            serde_json::Value::Object(base)
        }
        (_, incoming) => incoming,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ScanJob {
        ScanJob::new(1, "https://example.com", serde_json::json!({}))
    }

    #[test]
    fn new_job_is_pending_with_zero_progress() {
        let job = job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.result.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.logs.is_empty());
    }

    #[test]
    fn note_running_only_applies_from_pending() {
        let mut job = job();
        assert!(job.note_running());
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.note_running());

        job.apply_fail(None);
        assert!(!job.note_running());
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = job();
        job.note_running();

        assert!(job.apply_progress(35, None));
        assert_eq!(job.progress, 35);

        // A lower value never moves progress backwards.
        assert!(!job.apply_progress(10, None));
        assert_eq!(job.progress, 35);
    }

    #[test]
    fn progress_is_clamped_to_100() {
        let mut job = job();
        job.apply_progress(250, None);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn progress_carrying_terminal_status_stamps_completed_at() {
        let mut job = job();
        job.note_running();

        job.apply_progress(100, Some(JobStatus::Completed));
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn progress_is_frozen_after_terminal() {
        let mut job = job();
        job.note_running();
        job.apply_progress(80, None);
        job.apply_fail(Some("boom".into()));

        // The failure path in the analyzer reports progress 0; the
        // recorded value must stay frozen at 80.
        assert!(!job.apply_progress(0, None));
        assert_eq!(job.progress, 80);
        assert!(!job.apply_progress(100, None));
        assert_eq!(job.progress, 80);
    }

    #[test]
    fn carried_pending_status_is_ignored() {
        let mut job = job();
        job.note_running();
        job.apply_progress(50, Some(JobStatus::Pending));
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn complete_merges_result_and_stamps_completed_at() {
        let mut job = job();
        job.note_running();

        assert!(job.apply_complete(Some(serde_json::json!({"securityScore": 85}))));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_ref().unwrap()["securityScore"], 85);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn result_after_progress_carried_completed_still_lands() {
        let mut job = job();
        job.note_running();
        job.apply_progress(100, Some(JobStatus::Completed));

        assert!(job.apply_complete(Some(serde_json::json!({"loadTime": "1.2s"}))));
        assert_eq!(job.result.as_ref().unwrap()["loadTime"], "1.2s");
    }

    #[test]
    fn complete_never_leaves_failed() {
        let mut job = job();
        job.note_running();
        job.apply_fail(Some("worker died".into()));

        assert!(!job.apply_complete(Some(serde_json::json!({"securityScore": 85}))));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
    }

    #[test]
    fn fail_is_idempotent_on_terminal_jobs() {
        let mut job = job();
        job.note_running();
        assert!(job.apply_fail(Some("first".into())));
        assert!(!job.apply_fail(Some("second".into())));
        assert_eq!(job.error.as_deref(), Some("first"));

        let mut done = ScanJob::new(2, "https://example.com", serde_json::json!({}));
        done.apply_complete(None);
        assert!(!done.apply_fail(None));
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[test]
    fn merge_result_combines_objects() {
        let merged = merge_result(
            Some(serde_json::json!({"a": 1, "b": 2})),
            serde_json::json!({"b": 3, "c": 4}),
        );
        assert_eq!(merged, serde_json::json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_result_replaces_non_objects() {
        let merged = merge_result(Some(serde_json::json!([1, 2])), serde_json::json!({"a": 1}));
        assert_eq!(merged, serde_json::json!({"a": 1}));

        let merged = merge_result(None, serde_json::json!(42));
        assert_eq!(merged, serde_json::json!(42));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
    }

    #[test]
    fn log_levels_serialize_uppercase() {
        let entry = LogEntry::new(LogLevel::Processing, "crawling");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["level"], "PROCESSING");
        assert_eq!(value["message"], "crawling");
    }
}
