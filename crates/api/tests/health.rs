//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get_request, submit};
use demscope_core::variants::PipelineVariant;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = build_test_app(&[]);
    let response = app.send(get_request("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["jobs_tracked"], 0);
}

#[tokio::test]
async fn health_check_counts_tracked_jobs() {
    let app = build_test_app(&[(PipelineVariant::FullAnalysis, "sleep 1")]);
    submit(&app).await;
    submit(&app).await;

    let json = body_json(app.send(get_request("/health")).await).await;
    assert_eq!(json["jobs_tracked"], 2);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(&[]);
    let response = app.send(get_request("/this-route-does-not-exist")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = build_test_app(&[]);
    let response = app.send(get_request("/health")).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight allows the completion token header
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_completion_token() {
    let app = build_test_app(&[]);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/processComplete/abc")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "x-completion-token")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .expect("Missing Access-Control-Allow-Origin header"),
        "http://localhost:5173"
    );
    let allow_headers = headers
        .get("access-control-allow-headers")
        .expect("Missing Access-Control-Allow-Headers header")
        .to_str()
        .unwrap();
    assert!(
        allow_headers.contains("x-completion-token"),
        "Allow-Headers should contain x-completion-token, got: {allow_headers}"
    );
}

// ---------------------------------------------------------------------------
// Test: artifact paths outside a job directory are not served
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_artifact_returns_404() {
    let app = build_test_app(&[]);
    let response = app.send(get_request("/outputs/ghost/none.png")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
