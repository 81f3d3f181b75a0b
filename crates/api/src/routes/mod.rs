pub mod health;
pub mod scans;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                          WebSocket (live scan observation)
///
/// /scans                       list, submit
/// /scans/{id}                  get
/// /scans/{id}/export           full JSON dump
/// /scans/{id}/export/csv       flattened findings table
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/scans", scans::router())
}
