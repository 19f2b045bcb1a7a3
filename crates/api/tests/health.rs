//! Integration tests for the health endpoint and shared middleware.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;

use common::{body_json, build_test_app, get};

// ---------------------------------------------------------------------------
// Test: health reports ok with a writable store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let test = build_test_app("echo '[]'\n").await;

    let response = get(test.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_writable"], true);
    assert!(json["version"].is_string());
}

// ---------------------------------------------------------------------------
// Test: every response carries an x-request-id header
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_request_id() {
    let test = build_test_app("echo '[]'\n").await;

    let response = get(test.app(), "/health").await;

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn client_request_id_is_propagated() {
    let test = build_test_app("echo '[]'\n").await;

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(Body::empty())
        .unwrap();
    let response = test.app().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}

// ---------------------------------------------------------------------------
// Test: unknown routes return 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let test = build_test_app("echo '[]'\n").await;

    let response = get(test.app(), "/api/v1/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight from a configured origin is allowed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let test = build_test_app("echo '[]'\n").await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/annotations")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = test.app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}
