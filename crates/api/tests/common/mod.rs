//! Shared helpers for API integration tests.
//!
//! Builds the application against the in-memory job store and a stub
//! analyzer (`sh -c 'sleep 30'`) that produces no output, so records
//! stay in their submitted state for the duration of a test.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use siteaudit_analyzer::{ScanManager, WorkerConfig};
use siteaudit_api::config::ServerConfig;
use siteaudit_api::router::build_app_router;
use siteaudit_api::state::AppState;
use siteaudit_api::ws::WsManager;
use siteaudit_db::MemoryJobStore;
use siteaudit_events::ScanBroadcaster;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Build the full application router plus a handle to its store.
///
/// The router shares the production middleware stack (CORS, request ID,
/// timeout, tracing, panic recovery) via `build_app_router`. The store
/// handle lets tests seed records directly.
pub fn build_test_app() -> (Router, Arc<MemoryJobStore>) {
    let config = test_config();
    let store = Arc::new(MemoryJobStore::new());
    let broadcaster = Arc::new(ScanBroadcaster::new());
    let ws_manager = Arc::new(WsManager::new());

    // A worker that sleeps and emits nothing: submitted jobs keep their
    // `pending` record until the test process exits.
    let worker = WorkerConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), "sleep 30".to_string(), "analyzer".to_string()],
    };
    let scan_manager = ScanManager::new(store.clone(), broadcaster.clone(), worker);

    let state = AppState {
        store: store.clone(),
        config: Arc::new(config.clone()),
        ws_manager,
        broadcaster,
        scan_manager,
    };

    (build_app_router(state, &config), store)
}

/// Send a GET request to the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body to the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body into a string.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Assert a JSON error envelope with the given status and code.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
    assert!(json["error"].is_string());
}
