//! Append-only log of derivative pipeline failures.
//!
//! Derivative endpoints never return raw pipeline output to the client.
//! Instead each failure is appended here for operators.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::CoreError;
use crate::variants::PipelineVariant;

/// Default file name inside the artifact store's `logs/` directory.
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Maximum number of trailing stderr bytes kept per entry.
const MAX_DETAIL_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failure entry.
    pub async fn append(
        &self,
        variant: PipelineVariant,
        exit_code: Option<i32>,
        detail: &str,
    ) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let entry = format_entry(chrono::Utc::now(), variant, exit_code, detail);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_entry(
    at: crate::types::Timestamp,
    variant: PipelineVariant,
    exit_code: Option<i32>,
    detail: &str,
) -> String {
    let exit = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
    let detail = tail(detail.trim(), MAX_DETAIL_BYTES);
    format!(
        "[{}] variant={} exit_code={}\n{}\n\n",
        at.to_rfc3339(),
        variant.id(),
        exit,
        detail
    )
}

/// Last `max` bytes of `s`, cut on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
