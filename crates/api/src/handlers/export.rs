//! Scan result export.
//!
//! Two serialized forms: the full structured record as a JSON download,
//! and the itemized findings (`vulnerabilities` array in the result
//! payload) flattened to CSV.

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::Json;

use siteaudit_core::scan::ScanJob;
use siteaudit_core::types::JobId;

use crate::error::AppResult;
use crate::state::AppState;

/// Columns of the flattened findings table.
const FINDING_COLUMNS: [&str; 5] = ["type", "severity", "title", "description", "recommendation"];

// ---------------------------------------------------------------------------
// JSON dump
// ---------------------------------------------------------------------------

/// GET /api/v1/scans/{id}/export
///
/// The full record as a JSON attachment.
pub async fn export_scan(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;

    let disposition = format!("attachment; filename=\"scan-{job_id}.json\"");
    Ok(([(CONTENT_DISPOSITION, disposition)], Json(job)))
}

// ---------------------------------------------------------------------------
// CSV of findings
// ---------------------------------------------------------------------------

/// GET /api/v1/scans/{id}/export/csv
///
/// The result's `vulnerabilities` array flattened to one CSV row per
/// finding. A scan without findings yields just the header row.
pub async fn export_scan_csv(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;
    let csv = findings_csv(&job);

    let disposition = format!("attachment; filename=\"scan-{job_id}-findings.csv\"");
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// Render the findings table for one job.
fn findings_csv(job: &ScanJob) -> String {
    let mut out = String::new();
    out.push_str(&FINDING_COLUMNS.join(","));
    out.push('\n');

    let findings = job
        .result
        .as_ref()
        .and_then(|r| r.get("vulnerabilities"))
        .and_then(|v| v.as_array());

    let Some(findings) = findings else {
        return out;
    };

    for finding in findings {
        let row: Vec<String> = FINDING_COLUMNS
            .iter()
            .map(|column| {
                let value = finding.get(column);
                let text = match value {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) if !other.is_null() => other.to_string(),
                    _ => String::new(),
                };
                csv_field(&text)
            })
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
