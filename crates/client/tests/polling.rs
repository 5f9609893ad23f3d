//! Drives a real server over TCP with the polling client.

use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;
use demscope_api::config::{PipelineConfig, ServerConfig};
use demscope_api::router::build_app_router;
use demscope_api::state::AppState;
use demscope_client::{ClientError, DemUpload, DemscopeClient, JobStatus};
use demscope_core::variants::PipelineVariant;
use tempfile::TempDir;

/// Serve the app on an ephemeral port with bash scripts as the pipeline.
async fn spawn_server(scripts: &[(PipelineVariant, &str)]) -> (TempDir, DemscopeClient) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_scripts(root, scripts);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        artifact_root: root.join("data"),
        public_base_url: base_url.clone(),
        require_completion_token: false,
        pipeline: PipelineConfig {
            interpreter: "bash".to_string(),
            scripts_dir: root.join("scripts"),
            timeout_secs: None,
        },
    };
    let state = AppState::from_config(config.clone());
    let app = build_app_router(state, &config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = DemscopeClient::new(base_url).with_poll_interval(Duration::from_millis(50));
    (dir, client)
}

fn write_scripts(root: &Path, scripts: &[(PipelineVariant, &str)]) {
    let scripts_dir = root.join("scripts");
    std::fs::create_dir_all(&scripts_dir).unwrap();
    for (variant, body) in scripts {
        std::fs::write(
            scripts_dir.join(variant.script_file()),
            format!("#!/bin/bash\n{body}\n"),
        )
        .unwrap();
    }
}

fn upload() -> DemUpload {
    DemUpload {
        bytes: b"fake-dem".to_vec(),
        file_name: "etna.tif".to_string(),
        display_name: Some("Etna".to_string()),
    }
}

#[tokio::test]
async fn polls_until_completed_and_fetches_artifacts() {
    let script = r#"printf 'RELIEF' > "$PROCESS_OUTPUT_DIR/relief.png""#;
    let (dir, client) = spawn_server(&[(PipelineVariant::FullAnalysis, script)]).await;

    let id = client.submit(upload()).await.unwrap();
    assert_eq!(client.status(&id).await.unwrap(), JobStatus::Processing);

    // Stand in for the pipeline's callback once its artifact exists.
    let artifact = dir.path().join("data/outputs").join(&id).join("relief.png");
    let reporter = client.clone();
    let job_id = id.clone();
    tokio::spawn(async move {
        while !artifact.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        reporter.report_completion(&job_id, None).await.unwrap();
    });

    let results = client.wait_for_completion(&id).await.unwrap();
    assert_eq!(results.process_id, id);
    assert_eq!(results.status, JobStatus::Completed);
    assert_eq!(results.files.len(), 1);

    let bytes = client
        .fetch_artifact(&results.files[0].public_path)
        .await
        .unwrap();
    assert_eq!(bytes, b"RELIEF");
}

#[tokio::test]
async fn failed_job_stops_polling() {
    let (_dir, client) = spawn_server(&[(PipelineVariant::FullAnalysis, "exit 1")]).await;

    let id = client.submit(upload()).await.unwrap();
    let err = client.wait_for_completion(&id).await.unwrap_err();
    assert_matches!(err, ClientError::JobFailed(failed) if failed == id);
}

#[tokio::test]
async fn unknown_job_is_a_server_error() {
    let (_dir, client) = spawn_server(&[]).await;

    let err = client.status("ghost").await.unwrap_err();
    assert_matches!(err, ClientError::Api { status: 404, .. });
}

#[tokio::test]
async fn transport_errors_are_not_retried() {
    let client = DemscopeClient::new("http://127.0.0.1:9").with_poll_interval(Duration::from_millis(10));
    let err = client.wait_for_completion("any").await.unwrap_err();
    assert_matches!(err, ClientError::Request(_));
}

#[tokio::test]
async fn volume_estimate_round_trip() {
    let script = r#"echo '{"result":"Volume: 7 km3","images":["v.png"]}'"#;
    let (_dir, client) = spawn_server(&[(PipelineVariant::EllipticalCylinder, script)]).await;

    let volume = client
        .calculate_volume(upload(), "elliptical", "approximation2", None)
        .await
        .unwrap();
    assert_eq!(volume.result, "Volume: 7 km3");
    assert_eq!(volume.images, Some(vec!["v.png".to_string()]));
}

#[tokio::test]
async fn volume_estimate_reuses_given_process_id() {
    let script = r#"echo '{"result":{"processId":"'"$PROCESS_ID"'","volume":2.5}}'"#;
    let (dir, client) = spawn_server(&[(PipelineVariant::CircularSemisphere, script)]).await;

    let volume = client
        .calculate_volume(upload(), "circular", "approximation1", Some("survey-1"))
        .await
        .unwrap();
    assert_eq!(volume.result["processId"], "survey-1");
    assert_eq!(volume.result["volume"], 2.5);
    assert!(dir.path().join("data/outputs/survey-1").is_dir());
}
