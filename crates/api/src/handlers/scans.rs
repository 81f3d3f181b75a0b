//! Handlers for the `/scans` resource.
//!
//! The URL check here is the request-boundary validation; the
//! orchestrator below this layer validates nothing and trusts its input.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use siteaudit_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/scans`.
///
/// `options` holds the analysis toggles (`securityAudit`,
/// `performanceTest`, `nlpAnalysis`, `deepInspection`, ...). They are
/// passed through to the analyzer untouched.
#[derive(Debug, Deserialize)]
pub struct SubmitScan {
    pub url: String,
    #[serde(default = "default_options")]
    pub options: serde_json::Value,
}

fn default_options() -> serde_json::Value {
    serde_json::json!({})
}

/// Reject obviously unusable targets before a worker is ever spawned.
fn validate_target(url: &str) -> Result<(), AppError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            AppError::BadRequest("url must start with http:// or https://".into())
        })?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(AppError::BadRequest("url is missing a host".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/scans
///
/// Start a new scan. Returns 201 with the created job immediately; the
/// analyzer runs independently and the job begins in `pending` status.
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(input): Json<SubmitScan>,
) -> AppResult<impl IntoResponse> {
    let url = input.url.trim();
    validate_target(url)?;

    let job = state.scan_manager.start_job(url, input.options).await?;

    tracing::info!(job_id = job.id, url = %job.url, "Scan submitted");

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/scans
///
/// List all known scans, newest-first.
pub async fn list_scans(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.store.list().await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/scans/{id}
///
/// Full current record: status, progress, result fields, log sequence.
pub async fn get_scan(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.store.get(job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_target_accepts_http_and_https() {
        assert!(validate_target("https://example.com").is_ok());
        assert!(validate_target("http://example.com/path?q=1").is_ok());
    }

    #[test]
    fn validate_target_rejects_other_schemes_and_junk() {
        assert!(validate_target("ftp://example.com").is_err());
        assert!(validate_target("example.com").is_err());
        assert!(validate_target("https://").is_err());
        assert!(validate_target("https:///path-only").is_err());
        assert!(validate_target("").is_err());
    }
}
