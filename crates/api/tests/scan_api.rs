//! HTTP-level integration tests for the scan endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. The analyzer stub emits nothing, so
//! submitted jobs stay `pending` while a test inspects them.

mod common;

use axum::http::StatusCode;
use common::{assert_error, body_json, body_text, get, post_json};
use siteaudit_core::scan::{LogEntry, LogLevel};
use siteaudit_core::store::JobStore;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_scan_returns_201_with_pending_job() {
    let (app, _store) = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/scans",
        serde_json::json!({"url": "https://example.com", "options": {"securityAudit": true}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["url"], "https://example.com");
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["progress"], 0);
    assert_eq!(json["data"]["options"]["securityAudit"], true);
    assert!(json["data"]["id"].is_number());
    assert!(json["data"]["createdAt"].is_string());
}

#[tokio::test]
async fn submit_scan_defaults_options_to_empty_object() {
    let (app, _store) = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/scans",
        serde_json::json!({"url": "https://example.com"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert!(json["data"]["options"].is_object());
}

#[tokio::test]
async fn submit_scan_rejects_invalid_url() {
    let (app, _store) = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/scans",
        serde_json::json!({"url": "not-a-url"}),
    )
    .await;

    assert_error(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}

#[tokio::test]
async fn submit_scan_rejects_non_http_schemes() {
    let (app, _store) = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/scans",
        serde_json::json!({"url": "ftp://example.com"}),
    )
    .await;

    assert_error(response, StatusCode::BAD_REQUEST, "BAD_REQUEST").await;
}

#[tokio::test]
async fn duplicate_targets_create_distinct_jobs() {
    let (app, _store) = common::build_test_app();
    let first = post_json(
        app.clone(),
        "/api/v1/scans",
        serde_json::json!({"url": "https://example.com"}),
    )
    .await;
    let second = post_json(
        app,
        "/api/v1/scans",
        serde_json::json!({"url": "https://example.com"}),
    )
    .await;

    let first = body_json(first).await;
    let second = body_json(second).await;
    assert_ne!(first["data"]["id"], second["data"]["id"]);
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_scans_is_newest_first() {
    let (app, _store) = common::build_test_app();
    for host in ["https://one.example", "https://two.example"] {
        post_json(app.clone(), "/api/v1/scans", serde_json::json!({"url": host})).await;
    }

    let response = get(app, "/api/v1/scans").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["url"], "https://two.example");
    assert_eq!(jobs[1]["url"], "https://one.example");
}

#[tokio::test]
async fn get_scan_returns_full_record() {
    let (app, store) = common::build_test_app();
    let created = post_json(
        app.clone(),
        "/api/v1/scans",
        serde_json::json!({"url": "https://example.com"}),
    )
    .await;
    let id = body_json(created).await["data"]["id"].as_i64().unwrap();

    // Seed some activity directly through the store.
    store
        .append_log(id, LogEntry::new(LogLevel::Info, "Starting analysis"))
        .await
        .unwrap();

    let response = get(app, &format!("/api/v1/scans/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], id);
    assert_eq!(json["data"]["logs"][0]["message"], "Starting analysis");
    assert_eq!(json["data"]["logs"][0]["level"], "INFO");
}

#[tokio::test]
async fn get_unknown_scan_returns_404() {
    let (app, _store) = common::build_test_app();
    let response = get(app, "/api/v1/scans/999999").await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_scan_returns_json_attachment() {
    let (app, store) = common::build_test_app();
    let job = store
        .create("https://example.com", serde_json::json!({}))
        .await
        .unwrap();
    store
        .complete(job.id, Some(serde_json::json!({"securityScore": 85})))
        .await
        .unwrap();

    let response = get(app, &format!("/api/v1/scans/{}/export", job.id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains(&format!("scan-{}.json", job.id)));

    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["result"]["securityScore"], 85);
}

#[tokio::test]
async fn export_csv_flattens_findings() {
    let (app, store) = common::build_test_app();
    let job = store
        .create("https://example.com", serde_json::json!({}))
        .await
        .unwrap();
    store
        .complete(
            job.id,
            Some(serde_json::json!({
                "vulnerabilities": [{
                    "type": "missing_headers",
                    "severity": "medium",
                    "title": "Missing Security Header: x-frame-options",
                    "description": "The x-frame-options header is not set",
                    "recommendation": "Add the x-frame-options header"
                }]
            })),
        )
        .await
        .unwrap();

    let response = get(app, &format!("/api/v1/scans/{}/export/csv", job.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));

    let csv = body_text(response).await;
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "type,severity,title,description,recommendation");
    assert!(lines[1].starts_with("missing_headers,medium,"));
}

#[tokio::test]
async fn export_unknown_scan_returns_404() {
    let (app, _store) = common::build_test_app();
    let response = get(app, "/api/v1/scans/424242/export").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
