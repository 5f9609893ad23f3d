#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use demscope_core::variants::PipelineVariant;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use demscope_api::config::{PipelineConfig, ServerConfig};
use demscope_api::router::build_app_router;
use demscope_api::state::AppState;

pub const BOUNDARY: &str = "demscope-test-boundary";

/// A router wired to a scratch artifact root and bash "pipeline" scripts.
pub struct TestApp {
    _dir: TempDir,
    pub root: PathBuf,
    pub app: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn artifact_root(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn job_dir(&self, process_id: &str) -> PathBuf {
        self.artifact_root().join("outputs").join(process_id)
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

/// Build a test `ServerConfig` rooted at `root`.
///
/// Scripts are run with `bash` so tests need no Python toolchain.
pub fn test_config(root: &Path, require_completion_token: bool) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 10 * 1024 * 1024,
        artifact_root: root.join("data"),
        public_base_url: "http://localhost:5000".to_string(),
        require_completion_token,
        pipeline: PipelineConfig {
            interpreter: "bash".to_string(),
            scripts_dir: root.join("scripts"),
            timeout_secs: None,
        },
    }
}

/// Build the full application router with the given pipeline scripts.
pub fn build_test_app(scripts: &[(PipelineVariant, &str)]) -> TestApp {
    build_test_app_with(scripts, true)
}

pub fn build_test_app_with(
    scripts: &[(PipelineVariant, &str)],
    require_completion_token: bool,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let scripts_dir = root.join("scripts");
    std::fs::create_dir_all(&scripts_dir).unwrap();
    for (variant, body) in scripts {
        std::fs::write(
            scripts_dir.join(variant.script_file()),
            format!("#!/bin/bash\n{body}\n"),
        )
        .unwrap();
    }

    let config = test_config(&root, require_completion_token);
    let state = AppState::from_config(config.clone());
    let app = build_app_router(state.clone(), &config);

    TestApp {
        _dir: dir,
        root,
        app,
        state,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// One part of a multipart form.
pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// A `demFile` part with a small fake raster.
pub fn dem_file() -> Part<'static> {
    Part::File {
        name: "demFile",
        file_name: "etna.tif",
        data: b"II*\0fake-dem",
    }
}

pub fn text<'a>(name: &'a str, value: &'a str) -> Part<'a> {
    Part::Text { name, value }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn completion_request(process_id: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/processComplete/{process_id}"));
    if let Some(token) = token {
        builder = builder.header("x-completion-token", token);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Submit a DEM to `/process` and return the new `processId`.
pub async fn submit(app: &TestApp) -> String {
    let response = app
        .send(multipart_request(
            "/process",
            &[dem_file(), text("originalFileName", "Etna 2024")],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["processId"].as_str().unwrap().to_string()
}

pub async fn status_of(app: &TestApp, process_id: &str) -> String {
    let response = app
        .send(get_request(&format!("/processStatus/{process_id}")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["status"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll until a pipeline script has written `path`.
pub async fn wait_for_file(path: &Path) -> String {
    for _ in 0..100 {
        if let Ok(contents) = std::fs::read_to_string(path) {
            if !contents.is_empty() {
                return contents;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} was never written", path.display());
}

pub async fn wait_for_status(app: &TestApp, process_id: &str, expected: &str) {
    for _ in 0..100 {
        if status_of(app, process_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {process_id} never reached {expected}");
}
