//! Job state and the transition rules applied by the registry.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{JobId, Timestamp};

/// Display name used when the client did not send `originalFileName`.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// Lifecycle state of a submitted job, serialized in lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Compute the state reached after `signal`.
    ///
    /// - A completion callback always lands in `Completed`, including from
    ///   `Failed` and from `Completed` itself (idempotent).
    /// - A successful process exit never changes state: only the callback
    ///   may complete a job.
    /// - An unsuccessful exit moves a `Processing` job to `Failed` and is
    ///   ignored otherwise, so a late crash cannot undo a completion.
    pub fn apply(self, signal: JobSignal) -> JobState {
        match signal {
            JobSignal::CompletionReported => Self::Completed,
            JobSignal::ProcessExited { exit_code: 0 } => self,
            JobSignal::ProcessExited { .. } | JobSignal::ProcessLost => match self {
                Self::Processing => Self::Failed,
                other => other,
            },
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals that can move a job between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSignal {
    /// The pipeline called back to report that its own work succeeded.
    CompletionReported,
    /// The pipeline process exited with the given code.
    ProcessExited { exit_code: i32 },
    /// The process could not be waited on, was killed by a signal, or hit
    /// the configured timeout.
    ProcessLost,
}

/// One submitted unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub input_path: PathBuf,
    pub display_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Exit code of the pipeline process, once observed.
    pub exit_code: Option<i32>,
}

impl Job {
    /// A freshly accepted job in the `Processing` state.
    pub fn new(id: JobId, input_path: PathBuf, display_name: Option<String>) -> Self {
        let now = chrono::Utc::now();
        let display_name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());
        Self {
            id,
            state: JobState::Processing,
            input_path,
            display_name,
            created_at: now,
            updated_at: now,
            exit_code: None,
        }
    }

    /// Apply `signal` in place, recording the exit code when one is carried.
    pub fn apply(&mut self, signal: JobSignal) {
        if let JobSignal::ProcessExited { exit_code } = signal {
            self.exit_code = Some(exit_code);
        }
        let next = self.state.apply(signal);
        if next != self.state {
            tracing::debug!(
                job_id = %self.id,
                from = %self.state,
                to = %next,
                "Job state transition",
            );
            self.state = next;
        }
        self.updated_at = chrono::Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
