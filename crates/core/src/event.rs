//! Typed event vocabulary relayed from the analyzer to observers.
//!
//! The analyzer writes one JSON object per stdout line with the shape
//! `{"type": "<tag>", "data": {...}}`. The bridge decodes each line into
//! a [`ScanEvent`] at the boundary; everything downstream (orchestrator,
//! broadcaster, WebSocket layer) works with the closed enum. Unknown tags
//! survive as [`ScanEvent::Custom`] and are forwarded without
//! interpretation.

use serde_json::{json, Value};

use crate::scan::{JobStatus, LogEntry};

/// One unit of progress/log/result information for a single job.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A log line emitted by the analyzer (or synthesized from stderr).
    Log(LogEntry),

    /// A progress update, optionally carrying a status change.
    Progress {
        /// Completion percentage, 0-100.
        progress: u8,
        status: Option<JobStatus>,
    },

    /// The final analysis payload. Opaque to the orchestration layer.
    Result(Value),

    /// A bare status transition (e.g. synthesized on worker exit).
    Status { status: JobStatus },

    /// Any tag the core does not interpret (`browserAction`,
    /// `screenshot`, ...), forwarded verbatim to observers.
    Custom { tag: String, data: Value },
}

impl ScanEvent {
    /// The `type` tag used on the wire for this event.
    pub fn wire_tag(&self) -> &str {
        match self {
            ScanEvent::Log(_) => "log",
            ScanEvent::Progress { .. } => "progress",
            ScanEvent::Result(_) => "result",
            ScanEvent::Status { .. } => "status",
            ScanEvent::Custom { tag, .. } => tag,
        }
    }

    /// Serialize to the `{"type": ..., "data": ...}` wire shape sent to
    /// WebSocket observers — identical to the analyzer's own vocabulary.
    pub fn to_wire(&self) -> Value {
        let data = match self {
            ScanEvent::Log(entry) => {
                serde_json::to_value(entry).unwrap_or(Value::Null)
            }
            ScanEvent::Progress { progress, status } => {
                let mut data = json!({ "progress": progress });
                if let Some(status) = status {
                    data["status"] = json!(status);
                }
                data
            }
            ScanEvent::Result(payload) => payload.clone(),
            ScanEvent::Status { status } => json!({ "status": status }),
            ScanEvent::Custom { data, .. } => data.clone(),
        };

        json!({ "type": self.wire_tag(), "data": data })
    }
}
