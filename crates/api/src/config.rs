use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `3600`).
    ///
    /// Volume requests block for the whole pipeline run, so this is far
    /// above a typical API timeout.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight pipeline watchers (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Maximum multipart request body in bytes (default: 512 MiB).
    pub max_upload_bytes: usize,
    /// Root directory of the artifact store (default: `./data`).
    pub artifact_root: PathBuf,
    /// Base URL the pipeline uses to reach the completion callback.
    pub public_base_url: String,
    /// Whether `/processComplete` requires the per-job token (default: `true`).
    pub require_completion_token: bool,
    /// External pipeline settings.
    pub pipeline: PipelineConfig,
}

/// How pipeline scripts are located and run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Program that runs the scripts (default: `python3`).
    pub interpreter: String,
    /// Directory holding one script per variant (default: `./scripts`).
    pub scripts_dir: PathBuf,
    /// Kill pipelines running longer than this. Unset means no limit.
    pub timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `5000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `3600`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                       |
    /// | `MAX_UPLOAD_BYTES`          | `536870912`                |
    /// | `ARTIFACT_ROOT`             | `./data`                   |
    /// | `PUBLIC_BASE_URL`           | `http://localhost:{PORT}`  |
    /// | `COMPLETION_TOKEN_REQUIRED` | `true`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (512 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let artifact_root = PathBuf::from(
            std::env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./data".into()),
        );

        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let require_completion_token = parse_bool(
            &std::env::var("COMPLETION_TOKEN_REQUIRED").unwrap_or_else(|_| "true".into()),
        )
        .expect("COMPLETION_TOKEN_REQUIRED must be true or false");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            artifact_root,
            public_base_url,
            require_completion_token,
            pipeline: PipelineConfig::from_env(),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline settings from environment variables with defaults.
    ///
    /// | Env Var                 | Default     |
    /// |-------------------------|-------------|
    /// | `PIPELINE_INTERPRETER`  | `python3`   |
    /// | `PIPELINE_SCRIPTS_DIR`  | `./scripts` |
    /// | `PIPELINE_TIMEOUT_SECS` | unset       |
    pub fn from_env() -> Self {
        let interpreter =
            std::env::var("PIPELINE_INTERPRETER").unwrap_or_else(|_| "python3".into());

        let scripts_dir = PathBuf::from(
            std::env::var("PIPELINE_SCRIPTS_DIR").unwrap_or_else(|_| "./scripts".into()),
        );

        let timeout_secs = std::env::var("PIPELINE_TIMEOUT_SECS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<u64>()
                    .expect("PIPELINE_TIMEOUT_SECS must be a valid u64")
            });

        Self {
            interpreter,
            scripts_dir,
            timeout_secs,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
