//! Integration tests for the derivative product endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, dem_file, multipart_request, text};
use demscope_core::variants::PipelineVariant;

#[tokio::test]
async fn successful_products_report_success() {
    let app = build_test_app(&[
        (PipelineVariant::ShadedRelief, r#"echo ok > "$PROCESS_OUTPUT_DIR/relief.png""#),
        (PipelineVariant::Slopes, "echo ok"),
        (PipelineVariant::Curvatures, "echo ok"),
    ]);

    for uri in ["/shadedRelief", "/calculateSlopes", "/calculateCurvatures"] {
        let response = app.send(multipart_request(uri, &[dem_file()])).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["success"], true, "{uri}");
        assert!(json["message"].as_str().unwrap().ends_with("completed"));
    }
}

#[tokio::test]
async fn failures_are_logged_not_returned() {
    let app = build_test_app(&[(
        PipelineVariant::Slopes,
        "echo 'ModuleNotFoundError: richdem' >&2; exit 1",
    )]);

    let response = app
        .send(multipart_request("/calculateSlopes", &[dem_file()]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(!json.to_string().contains("richdem"));

    let log = std::fs::read_to_string(app.artifact_root().join("logs/errors.log")).unwrap();
    assert!(log.contains("variant=slopes exit_code=1"));
    assert!(log.contains("ModuleNotFoundError: richdem"));
}

#[tokio::test]
async fn missing_script_is_logged_as_failure() {
    let app = build_test_app(&[]);

    let response = app
        .send(multipart_request("/calculateCurvatures", &[dem_file()]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], false);

    let log = std::fs::read_to_string(app.artifact_root().join("logs/errors.log")).unwrap();
    assert!(log.contains("variant=curvatures exit_code=none"));
}

#[tokio::test]
async fn missing_file_returns_400() {
    let app = build_test_app(&[(PipelineVariant::ShadedRelief, "echo ok")]);

    let response = app
        .send(multipart_request("/shadedRelief", &[text("originalFileName", "x")]))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
