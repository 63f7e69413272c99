//! Shared helpers for API integration tests.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use cadence_api::config::{GuardConfig, ServerConfig};
use cadence_api::router::build_app_router;
use cadence_api::state::AppState;
use cadence_store::EventStore;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and the production rate limiter caps.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        snapshot_path: "cadence-state.json".into(),
        snapshot_interval_secs: 30,
        guard: GuardConfig::default(),
    }
}

/// Build the full application router plus the state behind it.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery, rate limit guard) that production uses. The state is
/// returned so tests can seed events and inspect repositories directly.
pub fn test_app() -> (Router, AppState) {
    let config = test_config();
    let store = Arc::new(EventStore::in_memory());
    let state = AppState::new(store, config.clone());
    let app = build_app_router(state.clone(), &config);
    (app, state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn put_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body into parsed JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// POST a JSON body and assert the response status, returning parsed JSON.
pub async fn post_expect(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    status: StatusCode,
) -> serde_json::Value {
    let response = post_json(app, uri, body).await;
    assert_eq!(response.status(), status, "unexpected status for {uri}");
    body_json(response).await
}
