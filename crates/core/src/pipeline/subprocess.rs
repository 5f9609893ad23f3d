//! Shared subprocess management.
//!
//! [`run_command`] runs a child to completion and captures its output;
//! [`spawn_command`] starts a child and hands back a [`RunningPipeline`]
//! that resolves to the exit outcome. Both drain stdout and stderr in
//! dedicated tasks so a chatty child can never block on a full pipe, and
//! both log every non-empty line tagged with the job id and stream name.
//!
//! Memory per stream is bounded: lines are read at most [`MAX_LINE_BYTES`]
//! at a time and at most [`MAX_OUTPUT_BYTES`] are captured. Once the child
//! exits, the drains get [`DRAIN_GRACE`] to reach EOF; pipes still held
//! open by background grandchildren are then abandoned.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::executor::{ExitOutcome, PipelineError, PipelineOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Lines past the limit are still logged, just not kept.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Longest chunk read as one line. Longer lines are split.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long stream drains may outlive the child before they are aborted.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Placeholder job id for invocations that do not belong to a job.
const NO_JOB: &str = "-";

/// Which standard stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl StreamName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Fields attached to every logged line.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub job_id: String,
    pub variant: &'static str,
}

impl LogContext {
    pub fn new(job_id: Option<&str>, variant: &'static str) -> Self {
        Self {
            job_id: job_id.unwrap_or(NO_JOB).to_string(),
            variant,
        }
    }
}

/// Spawn `cmd`, wait for it, and return everything it printed.
///
/// The caller sets the program, arguments and environment. If `timeout`
/// elapses first the child is killed (via `kill_on_drop`) and
/// [`PipelineError::Timeout`] is returned.
pub async fn run_command(
    cmd: &mut Command,
    ctx: LogContext,
    timeout: Option<Duration>,
) -> Result<PipelineOutput, PipelineError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(PipelineError::IoError)?;
    let drains = StreamDrains::start(&mut child, &ctx, true);

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(waited) => waited.map_err(PipelineError::IoError)?,
            Err(_elapsed) => {
                // `child` is dropped on return, which kills it.
                tracing::warn!(job_id = %ctx.job_id, variant = ctx.variant, "Pipeline timed out");
                drains.abort();
                return Err(PipelineError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
        },
        None => child.wait().await.map_err(PipelineError::IoError)?,
    };

    let (stdout_bytes, stderr_bytes) = drains.finish(DRAIN_GRACE, &ctx).await;

    Ok(PipelineOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        exit_code: status.code().unwrap_or(-1),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Spawn `cmd` without waiting for it.
///
/// The child is not killed when the handle is dropped: there is no
/// cancellation path, a started pipeline runs until it exits.
pub fn spawn_command(
    cmd: &mut Command,
    ctx: LogContext,
    timeout: Option<Duration>,
) -> Result<RunningPipeline, PipelineError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(PipelineError::IoError)?;
    let drains = StreamDrains::start(&mut child, &ctx, false);

    Ok(RunningPipeline {
        child,
        drains,
        started,
        timeout,
        ctx,
    })
}

/// Handle to a detached pipeline process.
pub struct RunningPipeline {
    child: Child,
    drains: StreamDrains,
    started: Instant,
    timeout: Option<Duration>,
    ctx: LogContext,
}

impl RunningPipeline {
    /// OS process id, if the process is still known to the OS.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit and for both streams to be logged.
    pub async fn wait(mut self) -> Result<ExitOutcome, PipelineError> {
        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.child.wait()).await {
                Ok(waited) => waited.map_err(PipelineError::IoError)?,
                Err(_elapsed) => {
                    tracing::warn!(
                        job_id = %self.ctx.job_id,
                        variant = self.ctx.variant,
                        "Pipeline timed out, killing process",
                    );
                    if let Err(e) = self.child.kill().await {
                        tracing::error!(job_id = %self.ctx.job_id, error = %e, "Failed to kill pipeline");
                    }
                    self.drains.abort();
                    return Err(PipelineError::Timeout {
                        elapsed_ms: self.started.elapsed().as_millis() as u64,
                    });
                }
            },
            None => self.child.wait().await.map_err(PipelineError::IoError)?,
        };

        self.drains.finish(DRAIN_GRACE, &self.ctx).await;

        Ok(ExitOutcome {
            exit_code: status.code().unwrap_or(-1),
            duration_ms: self.started.elapsed().as_millis() as u64,
        })
    }
}

/// Bytes captured from one stream, shared with its drain task so a partial
/// capture survives the task being aborted.
type Captured = Arc<Mutex<Vec<u8>>>;

/// The two drain tasks of a child and what they captured.
struct StreamDrains {
    stdout: Captured,
    stderr: Captured,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<()>,
}

impl StreamDrains {
    fn start(child: &mut Child, ctx: &LogContext, capture: bool) -> Self {
        let stdout = Captured::default();
        let stderr = Captured::default();
        let sink = |buf: &Captured| capture.then(|| Arc::clone(buf));

        let (out, out_ctx, out_sink) = (child.stdout.take(), ctx.clone(), sink(&stdout));
        let (err, err_ctx, err_sink) = (child.stderr.take(), ctx.clone(), sink(&stderr));
        Self {
            stdout_task: tokio::spawn(drain(out, StreamName::Stdout, out_ctx, out_sink)),
            stderr_task: tokio::spawn(drain(err, StreamName::Stderr, err_ctx, err_sink)),
            stdout,
            stderr,
        }
    }

    /// Wait up to `grace` for both streams to reach EOF, then abort what is
    /// left and return the captured bytes.
    async fn finish(mut self, grace: Duration, ctx: &LogContext) -> (Vec<u8>, Vec<u8>) {
        let joined = tokio::time::timeout(grace, async {
            let _ = (&mut self.stdout_task).await;
            let _ = (&mut self.stderr_task).await;
        })
        .await;
        if joined.is_err() {
            tracing::warn!(
                job_id = %ctx.job_id,
                variant = ctx.variant,
                "Pipeline exited but its streams are still open, detaching",
            );
        }
        self.stdout_task.abort();
        self.stderr_task.abort();
        (take_captured(&self.stdout), take_captured(&self.stderr))
    }

    fn abort(&self) {
        self.stdout_task.abort();
        self.stderr_task.abort();
    }
}

fn take_captured(buf: &Captured) -> Vec<u8> {
    let mut guard = buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::take(&mut *guard)
}

/// Read `handle` line by line until EOF, logging each non-empty line and
/// appending up to [`MAX_OUTPUT_BYTES`] to `sink` when one is given.
async fn drain<R: AsyncRead + Unpin>(
    handle: Option<R>,
    stream: StreamName,
    ctx: LogContext,
    sink: Option<Captured>,
) {
    let Some(handle) = handle else {
        return;
    };

    let mut reader = BufReader::new(handle);
    let mut line = Vec::new();
    loop {
        match next_line(&mut reader, &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if let Some(sink) = &sink {
                    let mut captured = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    let room = MAX_OUTPUT_BYTES.saturating_sub(captured.len());
                    captured.extend_from_slice(&line[..line.len().min(room)]);
                }
                log_line(&ctx, stream, &line);
            }
            Err(e) => {
                tracing::warn!(
                    job_id = %ctx.job_id,
                    stream = stream.as_str(),
                    error = %e,
                    "Stopped reading pipeline stream",
                );
                break;
            }
        }
    }
}

/// Read the next line into `line`, at most [`MAX_LINE_BYTES`] of it.
///
/// The rest of an overlong line comes back on the following calls.
/// Returns the number of bytes read, `0` at EOF.
async fn next_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> std::io::Result<usize> {
    line.clear();
    reader
        .take(MAX_LINE_BYTES as u64)
        .read_until(b'\n', line)
        .await
}

fn log_line(ctx: &LogContext, stream: StreamName, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end();
    if text.trim().is_empty() {
        return;
    }
    match stream {
        StreamName::Stdout => tracing::info!(
            job_id = %ctx.job_id,
            variant = ctx.variant,
            stream = stream.as_str(),
            "{text}"
        ),
        StreamName::Stderr => tracing::warn!(
            job_id = %ctx.job_id,
            variant = ctx.variant,
            stream = stream.as_str(),
            "{text}"
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
