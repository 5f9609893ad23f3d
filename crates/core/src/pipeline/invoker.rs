//! Launches pipeline variants as `<interpreter> <scripts_dir>/<script> args...`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use super::executor::{
    PipelineError, PipelineInput, PipelineOutput, ENV_PROCESS_ID, ENV_UNBUFFERED,
};
use super::subprocess::{self, LogContext, RunningPipeline};
use crate::variants::PipelineVariant;

/// Builds and runs the command line for a [`PipelineVariant`].
#[derive(Debug, Clone)]
pub struct PipelineInvoker {
    /// Program used to run the scripts (e.g. `python3`).
    interpreter: String,
    /// Directory holding one script per variant.
    scripts_dir: PathBuf,
    /// Kill the process after this long. `None` waits forever.
    timeout: Option<Duration>,
}

impl PipelineInvoker {
    pub fn new(
        interpreter: impl Into<String>,
        scripts_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
            timeout,
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Absolute or relative path of the script backing `variant`.
    pub fn script_path(&self, variant: PipelineVariant) -> PathBuf {
        self.scripts_dir.join(variant.script_file())
    }

    /// Run `variant` to completion and capture its output.
    ///
    /// A non-zero exit is still `Ok`; callers decide what it means.
    pub async fn invoke(
        &self,
        variant: PipelineVariant,
        input: PipelineInput,
    ) -> Result<PipelineOutput, PipelineError> {
        let ctx = LogContext::new(input.job_id.as_ref().map(|id| id.as_str()), variant.id());
        let mut cmd = self.command(variant, &input).await?;
        tracing::info!(job_id = %ctx.job_id, variant = variant.id(), "Invoking pipeline");
        let output = subprocess::run_command(&mut cmd, ctx.clone(), self.timeout).await?;
        tracing::info!(
            job_id = %ctx.job_id,
            variant = variant.id(),
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            "Pipeline finished",
        );
        Ok(output)
    }

    /// Start `variant` and return without waiting for it.
    pub async fn start(
        &self,
        variant: PipelineVariant,
        input: PipelineInput,
    ) -> Result<RunningPipeline, PipelineError> {
        let ctx = LogContext::new(input.job_id.as_ref().map(|id| id.as_str()), variant.id());
        let mut cmd = self.command(variant, &input).await?;
        let running = subprocess::spawn_command(&mut cmd, ctx.clone(), self.timeout)?;
        tracing::info!(
            job_id = %ctx.job_id,
            variant = variant.id(),
            pid = ?running.pid(),
            "Started pipeline",
        );
        Ok(running)
    }

    async fn command(
        &self,
        variant: PipelineVariant,
        input: &PipelineInput,
    ) -> Result<Command, PipelineError> {
        let script = self.script_path(variant);
        if tokio::fs::metadata(&script).await.is_err() {
            return Err(PipelineError::ScriptNotFound(script));
        }

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&script).args(&input.args);
        cmd.env(ENV_UNBUFFERED, "1");
        if let Some(job_id) = &input.job_id {
            cmd.env(ENV_PROCESS_ID, job_id.as_str());
        }
        for (key, value) in &input.env_vars {
            cmd.env(key, value);
        }
        if let Some(dir) = &input.working_directory {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
