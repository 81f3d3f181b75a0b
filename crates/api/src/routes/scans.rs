//! Route definitions for the `/scans` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{export, scans};
use crate::state::AppState;

/// Routes mounted at `/scans`.
///
/// ```text
/// GET    /                  -> list_scans
/// POST   /                  -> submit_scan
/// GET    /{id}              -> get_scan
/// GET    /{id}/export       -> export_scan
/// GET    /{id}/export/csv   -> export_scan_csv
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(scans::list_scans).post(scans::submit_scan))
        .route("/{id}", get(scans::get_scan))
        .route("/{id}/export", get(export::export_scan))
        .route("/{id}/export/csv", get(export::export_scan_csv))
}
