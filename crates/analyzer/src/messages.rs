//! Analyzer output line decoding.
//!
//! The analyzer writes one JSON object per stdout line with the shape
//! `{"type": "<tag>", "data": {...}}`. Known tags decode into the
//! corresponding [`ScanEvent`] variant; anything else (`browserAction`,
//! `screenshot`, future extensions) is preserved as
//! [`ScanEvent::Custom`] rather than dropped.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use siteaudit_core::event::ScanEvent;
use siteaudit_core::scan::{JobStatus, LogEntry, LogLevel};
use siteaudit_core::types::Timestamp;

/// Raw `{"type", "data"}` envelope before tag dispatch.
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct WireLog {
    timestamp: Option<String>,
    level: LogLevel,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireProgress {
    progress: i64,
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    status: JobStatus,
}

/// Decode one analyzer stdout line into a typed event.
///
/// Returns `Err` only when the line is not the expected envelope or a
/// known tag carries a malformed payload. Callers log the failure as an
/// `ERROR` event and keep reading.
pub fn decode_line(line: &str) -> Result<ScanEvent, serde_json::Error> {
    let msg: WireMessage = serde_json::from_str(line)?;

    match msg.tag.as_str() {
        "log" => {
            let log: WireLog = serde_json::from_value(msg.data)?;
            Ok(ScanEvent::Log(LogEntry {
                timestamp: parse_timestamp(log.timestamp.as_deref()),
                level: log.level,
                message: log.message,
            }))
        }
        "progress" => {
            let progress: WireProgress = serde_json::from_value(msg.data)?;
            Ok(ScanEvent::Progress {
                progress: progress.progress.clamp(0, 100) as u8,
                status: progress.status,
            })
        }
        "result" => Ok(ScanEvent::Result(msg.data)),
        "status" => {
            let status: WireStatus = serde_json::from_value(msg.data)?;
            Ok(ScanEvent::Status {
                status: status.status,
            })
        }
        _ => Ok(ScanEvent::Custom {
            tag: msg.tag,
            data: msg.data,
        }),
    }
}

/// Parse the analyzer's log timestamp.
///
/// The stock analyzer emits `datetime.now().isoformat()`, which has no
/// timezone offset, so RFC 3339 parsing gets a naive-datetime fallback.
/// Missing or unparseable timestamps fall back to the receive time.
fn parse_timestamp(raw: Option<&str>) -> Timestamp {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    })
    .unwrap_or_else(Utc::now)
}
