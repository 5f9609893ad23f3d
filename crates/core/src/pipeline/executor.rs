//! Invocation types shared by the captured and detached modes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Forces line-buffered output from Python children so log capture is timely.
pub const ENV_UNBUFFERED: &str = "PYTHONUNBUFFERED";

/// Job identifier the child uses for its output directory and callback.
pub const ENV_PROCESS_ID: &str = "PROCESS_ID";

/// Plaintext completion token the child must echo on its callback.
pub const ENV_COMPLETION_TOKEN: &str = "PROCESS_COMPLETION_TOKEN";

/// Fully-qualified completion callback URL for this job.
pub const ENV_CALLBACK_URL: &str = "PROCESS_CALLBACK_URL";

/// Artifact directory the child should write its outputs into.
pub const ENV_OUTPUT_DIR: &str = "PROCESS_OUTPUT_DIR";

/// Arguments and environment for one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    /// Positional arguments after the script path.
    pub args: Vec<String>,
    /// Job the invocation belongs to. Sets `PROCESS_ID` and tags log lines.
    pub job_id: Option<JobId>,
    /// Additional environment variables for the child process.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child process (inherits when `None`).
    pub working_directory: Option<PathBuf>,
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Complete stdout (bounded).
    pub stdout: String,
    /// Complete stderr (bounded).
    pub stderr: String,
    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a detached invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Errors that prevent an invocation from producing an exit code.
#[derive(Debug)]
pub enum PipelineError {
    /// The script backing the variant does not exist.
    ScriptNotFound(PathBuf),
    /// The process exceeded the configured timeout and was killed.
    Timeout {
        /// Elapsed wall-clock time before the process was killed.
        elapsed_ms: u64,
    },
    /// The process ran but exited with a non-zero code.
    ExitFailure {
        exit_code: i32,
        /// Captured stderr output (kept for logs, never returned to clients).
        stderr: String,
    },
    /// Spawning or waiting on the process failed.
    IoError(std::io::Error),
}

impl PipelineError {
    /// Turn a non-zero exit into [`PipelineError::ExitFailure`].
    pub fn check(output: PipelineOutput) -> Result<PipelineOutput, PipelineError> {
        if output.success() {
            Ok(output)
        } else {
            Err(Self::ExitFailure {
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    /// Exit code, when the process got far enough to produce one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitFailure { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptNotFound(path) => write!(f, "Pipeline script not found: {}", path.display()),
            Self::Timeout { elapsed_ms } => {
                write!(f, "Pipeline timed out after {elapsed_ms}ms")
            }
            Self::ExitFailure { exit_code, stderr } => {
                write!(f, "Pipeline failed with exit code {exit_code}: {stderr}")
            }
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn output(exit_code: i32) -> PipelineOutput {
        PipelineOutput {
            stdout: "out".into(),
            stderr: "err".into(),
            exit_code,
            duration_ms: 1,
        }
    }

    #[test]
    fn check_passes_zero_exit() {
        let out = PipelineError::check(output(0)).unwrap();
        assert_eq!(out.stdout, "out");
    }

    #[test]
    fn check_rejects_nonzero_exit() {
        let err = PipelineError::check(output(2)).unwrap_err();
        assert_matches!(err, PipelineError::ExitFailure { exit_code: 2, .. });
        assert_eq!(err.exit_code(), Some(2));
    }

    #[test]
    fn display_messages() {
        let err = PipelineError::Timeout { elapsed_ms: 5000 };
        assert_eq!(err.to_string(), "Pipeline timed out after 5000ms");

        let err = PipelineError::ScriptNotFound(PathBuf::from("/opt/x.py"));
        assert_eq!(err.to_string(), "Pipeline script not found: /opt/x.py");
    }

    #[test]
    fn error_source_only_for_io() {
        let io = PipelineError::IoError(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&io).is_some());
        let timeout = PipelineError::Timeout { elapsed_ms: 1 };
        assert!(std::error::Error::source(&timeout).is_none());
    }
}
