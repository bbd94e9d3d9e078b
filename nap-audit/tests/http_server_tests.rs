//! HTTP Server & Trigger Integration Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against a mock Places
//! API (httpmock) and temporary input/output files.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use httpmock::prelude::*;
use http_body_util::BodyExt;
use nap_audit::services::{read_rows, PlacesClient};
use nap_audit::{build_router, AppState};
use nap_common::config::{AppConfig, OutputConfig};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

const TEXT_SEARCH: &str = "/maps/api/place/textsearch/json";
const DETAILS: &str = "/maps/api/place/details/json";

/// Config pointing at the mock server and files under `dir`
fn test_config(server: &MockServer, dir: &Path, input: &str) -> AppConfig {
    let input_path = dir.join("input.csv");
    std::fs::write(&input_path, input).unwrap();

    let mut config = AppConfig::default();
    config.input.path = input_path;
    config.output = OutputConfig::File {
        path: dir.join("out").join("report.csv"),
    };
    config.lookup.base_url = server.base_url();
    config.lookup.requests_per_second = 100;
    config.lookup.api_key = Some("test-key".to_string());
    config
}

fn test_state(config: AppConfig) -> AppState {
    let places = PlacesClient::new(&config.lookup, "test-key").unwrap();
    AppState::new(config, places)
}

fn output_path(state: &AppState) -> PathBuf {
    match &state.config.output {
        OutputConfig::File { path } => path.clone(),
        other => panic!("unexpected output {:?}", other),
    }
}

async fn send(state: &AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn mock_cafe_rio(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path(TEXT_SEARCH);
            then.status(200).json_body(json!({
                "status": "OK",
                "results": [{ "place_id": "p1", "name": "Cafe Rio" }]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(DETAILS).query_param("place_id", "p1");
            then.status(200).json_body(json!({
                "status": "OK",
                "result": {
                    "formatted_address": "1 Main St, Springfield, IL 62701, USA",
                    "formatted_phone_number": "(555) 010-0100"
                }
            }));
        })
        .await;
}

#[tokio::test]
async fn test_health_reports_ok() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address,phone\n"));

    let (status, body) = send(&state, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "nap-audit");
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_run_returns_summary_and_writes_report() {
    let server = MockServer::start_async().await;
    mock_cafe_rio(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let input = "name,address,phone\n\
                 Cafe Rio,\"1 Main St, Springfield\",+1 555-010-0100\n\
                 Cafe Rio,\"1 Main St, Springfield\",555-010-9999\n";
    let state = test_state(test_config(&server, dir.path(), input));

    let (status, body) = send(&state, "GET", "/audit/run").await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["total_rows"], 2);
    assert_eq!(body["matched"], 1);
    assert_eq!(body["partial"], 1);
    assert_eq!(body["failed"], 0);

    let rows = read_rows(std::fs::File::open(output_path(&state)).unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].overall);
    assert!(!rows[1].overall);
    assert!(!rows[1].verdicts.phone.matched);
}

#[tokio::test]
async fn test_run_accepts_post() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address,phone\n"));

    let (status, body) = send(&state, "POST", "/audit/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 0);
}

#[tokio::test]
async fn test_empty_input_succeeds() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address,phone\n"));

    let (status, body) = send(&state, "GET", "/audit/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 0);
    let rows = read_rows(std::fs::File::open(output_path(&state)).unwrap()).unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_lookup_failure_does_not_fail_run() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(TEXT_SEARCH);
            then.status(500).body("backend error");
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = "name,address,phone\nCafe Rio,1 Main St,555-010-0100\nJoe's Diner,12 Oak Ave,\n";
    let state = test_state(test_config(&server, dir.path(), input));

    let (status, body) = send(&state, "GET", "/audit/run").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 2);
    assert_eq!(body["failed"], 2);
}

#[tokio::test]
async fn test_missing_column_is_500_without_lookups() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method(GET).path(TEXT_SEARCH);
            then.status(200).json_body(json!({ "status": "ZERO_RESULTS" }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address\nCafe Rio,1 Main St\n"));

    let (status, body) = send(&state, "GET", "/audit/run").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "MALFORMED_INPUT");
    search.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_unwritable_output_is_500_and_degrades_health() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(TEXT_SEARCH);
            then.status(200).json_body(json!({ "status": "ZERO_RESULTS" }));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut config = test_config(&server, dir.path(), "name,address,phone\nCafe Rio,1 Main St,\n");
    config.output = OutputConfig::File {
        path: blocker.join("report.csv"),
    };
    let state = test_state(config);

    let (status, body) = send(&state, "GET", "/audit/run").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "SINK_WRITE_ERROR");

    let (_, health) = send(&state, "GET", "/health").await;
    assert_eq!(health["status"], "degraded");
    assert!(health["last_error"].as_str().unwrap().contains("Sink write failed"));
}

#[tokio::test]
async fn test_last_summary_before_and_after_run() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address,phone\n"));

    let (status, _) = send(&state, "GET", "/audit/last").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, run) = send(&state, "GET", "/audit/run").await;
    let (status, last) = send(&state, "GET", "/audit/last").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["run_id"], run["run_id"]);
}

#[tokio::test]
async fn test_concurrent_trigger_conflicts() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(test_config(&server, dir.path(), "name,address,phone\n"));

    let _running = state.run_lock.lock().await;
    let (status, body) = send(&state, "GET", "/audit/run").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}
