//! Central job supervisor.
//!
//! Coordinates artifact storage, job registration, pipeline dispatch, and
//! exit tracking. Held in [`AppState`](crate::state::AppState) as an
//! `Arc<JobSupervisor>`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use demscope_core::artifacts::{AnalysisManifest, ArtifactEntry, ArtifactStore};
use demscope_core::error::CoreError;
use demscope_core::error_log::ErrorLog;
use demscope_core::jobs::state::UNKNOWN_DISPLAY_NAME;
use demscope_core::jobs::token::verify_token;
use demscope_core::jobs::{CompletionToken, Job, JobRecord, JobRegistry, JobSignal, JobState};
use demscope_core::pipeline::executor::{ENV_CALLBACK_URL, ENV_COMPLETION_TOKEN, ENV_OUTPUT_DIR};
use demscope_core::pipeline::{PipelineError, PipelineInput, PipelineInvoker, RunningPipeline};
use demscope_core::types::JobId;
use demscope_core::variants::{PipelineVariant, VariantSelector};
use demscope_core::volume::{self, VolumeReport};
use serde::Serialize;
use tokio_util::task::TaskTracker;

use super::Upload;
use crate::error::{AppError, AppResult};

/// Message returned when a request carries no DEM file.
pub const MISSING_FILE_MESSAGE: &str = "No file uploaded";

/// Behavioural switches for the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Base URL the pipeline uses to reach `/processComplete`.
    pub public_base_url: String,
    /// Reject completion callbacks that do not carry the job's token.
    pub require_completion_token: bool,
}

/// Everything a client needs to collect a finished job.
#[derive(Debug, Serialize)]
pub struct JobResults {
    #[serde(rename = "processId")]
    pub process_id: JobId,
    pub status: JobState,
    pub files: Vec<ArtifactEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<AnalysisManifest>,
}

/// Outcome of a derivative product run.
#[derive(Debug, Clone)]
pub struct DerivativeOutcome {
    pub process_id: JobId,
    pub success: bool,
}

/// Runs DEM pipelines on behalf of HTTP handlers.
///
/// Asynchronous jobs follow this lifecycle:
/// 1. Create the job's output directory and persist the upload.
/// 2. Register the job as `processing` with a fresh completion token.
/// 3. Start the full-analysis pipeline without waiting for it.
/// 4. A watcher task records the exit; the pipeline's callback marks the job
///    completed.
pub struct JobSupervisor {
    registry: Arc<dyn JobRegistry>,
    store: ArtifactStore,
    invoker: PipelineInvoker,
    error_log: ErrorLog,
    options: SupervisorOptions,
    watchers: TaskTracker,
}

impl JobSupervisor {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        store: ArtifactStore,
        invoker: PipelineInvoker,
        error_log: ErrorLog,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            registry,
            store,
            invoker,
            error_log,
            options,
            watchers: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Number of jobs in the registry.
    pub async fn tracked_jobs(&self) -> usize {
        self.registry.len().await
    }

    /// Accept an upload and start the full analysis in the background.
    ///
    /// Returns as soon as the process is spawned; the job is `processing`.
    pub async fn submit(&self, upload: Upload) -> AppResult<JobId> {
        if upload.bytes.is_empty() {
            return Err(AppError::BadRequest(MISSING_FILE_MESSAGE.into()));
        }
        if self.watchers.is_closed() {
            return Err(AppError::InternalError(
                "Supervisor is shutting down".into(),
            ));
        }

        let id = JobId::generate();
        let output_dir = self.store.create_job_dir(&id).await?;
        let input_path = self
            .store
            .persist_input(&id, upload.file_name.as_deref(), &upload.bytes)
            .await?;

        let token = CompletionToken::generate();
        let job = Job::new(id.clone(), input_path.clone(), upload.display_name);
        let display_name = job.display_name.clone();
        self.registry
            .insert(JobRecord {
                job,
                completion_token_hash: Some(token.hash),
            })
            .await?;

        let input = PipelineInput {
            args: vec![path_arg(&input_path), display_name, id.to_string()],
            job_id: Some(id.clone()),
            env_vars: vec![
                (ENV_COMPLETION_TOKEN.to_string(), token.plaintext),
                (ENV_CALLBACK_URL.to_string(), self.callback_url(&id)),
                (ENV_OUTPUT_DIR.to_string(), path_arg(&output_dir)),
            ],
            working_directory: None,
        };

        let running = match self.invoker.start(PipelineVariant::FullAnalysis, input).await {
            Ok(running) => running,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to start pipeline");
                self.registry.apply(&id, JobSignal::ProcessLost).await?;
                return Err(e.into());
            }
        };
        self.watch(id.clone(), running);

        tracing::info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Current state of a job.
    pub async fn status(&self, raw_id: &str) -> AppResult<Job> {
        let id = lookup_id(raw_id)?;
        let record = self.registry.get(&id).await.ok_or_else(|| not_found(&id))?;
        Ok(record.job)
    }

    /// Handle the pipeline's completion callback.
    ///
    /// Idempotent: a completed job stays completed.
    pub async fn complete(&self, raw_id: &str, presented_token: Option<&str>) -> AppResult<Job> {
        let id = lookup_id(raw_id)?;
        let record = self.registry.get(&id).await.ok_or_else(|| not_found(&id))?;

        if self.options.require_completion_token {
            let authorized = match (record.completion_token_hash.as_deref(), presented_token) {
                (Some(hash), Some(token)) => verify_token(token, hash),
                _ => false,
            };
            if !authorized {
                tracing::warn!(job_id = %id, "Rejected completion callback with bad token");
                return Err(CoreError::Unauthorized(
                    "Missing or invalid completion token".into(),
                )
                .into());
            }
        }

        let job = self.registry.apply(&id, JobSignal::CompletionReported).await?;
        tracing::info!(job_id = %id, "Job completed");
        Ok(job)
    }

    /// Artifacts and manifest produced so far for a job.
    pub async fn results(&self, raw_id: &str) -> AppResult<JobResults> {
        let job = self.status(raw_id).await?;
        let files = match self.store.list_artifacts(&job.id).await {
            Ok(files) => files,
            Err(CoreError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let manifest = self.store.read_manifest(&job.id).await?;
        Ok(JobResults {
            process_id: job.id,
            status: job.state,
            files,
            manifest,
        })
    }

    /// Run a volume variant synchronously and interpret its stdout.
    ///
    /// The selector is validated before anything touches the filesystem.
    pub async fn estimate_volume(
        &self,
        upload: Upload,
        category: &str,
        method: &str,
        process_id: Option<&str>,
    ) -> AppResult<VolumeReport> {
        let variant = VariantSelector::parse(category, method)?.resolve();
        if upload.bytes.is_empty() {
            return Err(AppError::BadRequest(MISSING_FILE_MESSAGE.into()));
        }

        let id = match process_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => JobId::parse(raw)?,
            None => JobId::generate(),
        };
        let output_dir = self.store.ensure_job_dir(&id).await?;
        let input_path = self
            .store
            .persist_input(&id, upload.file_name.as_deref(), &upload.bytes)
            .await?;
        let display_name = upload
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());

        let input = PipelineInput {
            args: vec![path_arg(&input_path), display_name],
            job_id: Some(id.clone()),
            env_vars: vec![(ENV_OUTPUT_DIR.to_string(), path_arg(&output_dir))],
            working_directory: None,
        };
        let output = PipelineError::check(self.invoker.invoke(variant, input).await?)?;

        let report = volume::interpret(&output.stdout);
        tracing::info!(
            job_id = %id,
            variant = variant.id(),
            structured = report.images.is_some(),
            "Volume estimated",
        );
        Ok(report)
    }

    /// Run a derivative product variant synchronously.
    ///
    /// Failures are appended to the error log and reported as
    /// `success: false`, never as an error response.
    pub async fn run_derivative(
        &self,
        variant: PipelineVariant,
        upload: Upload,
    ) -> AppResult<DerivativeOutcome> {
        if upload.bytes.is_empty() {
            return Err(AppError::BadRequest(MISSING_FILE_MESSAGE.into()));
        }

        let id = JobId::generate();
        let output_dir = self.store.create_job_dir(&id).await?;
        let input_path = self
            .store
            .persist_input(&id, upload.file_name.as_deref(), &upload.bytes)
            .await?;

        let input = PipelineInput {
            args: vec![path_arg(&input_path)],
            job_id: Some(id.clone()),
            env_vars: vec![(ENV_OUTPUT_DIR.to_string(), path_arg(&output_dir))],
            working_directory: None,
        };
        let failure = match self.invoker.invoke(variant, input).await {
            Ok(output) if output.success() => None,
            Ok(output) => Some((Some(output.exit_code), output.stderr)),
            Err(e) => Some((e.exit_code(), e.to_string())),
        };

        let success = match failure {
            None => true,
            Some((exit_code, detail)) => {
                tracing::warn!(job_id = %id, variant = variant.id(), ?exit_code, "Derivative product failed");
                if let Err(e) = self.error_log.append(variant, exit_code, &detail).await {
                    tracing::error!(error = %e, path = %self.error_log.path().display(), "Failed to write error log");
                }
                false
            }
        };

        Ok(DerivativeOutcome {
            process_id: id,
            success,
        })
    }

    /// Stop accepting jobs and wait for exit watchers to drain.
    ///
    /// Pipeline processes themselves are left running.
    pub async fn shutdown(&self, timeout: Duration) {
        self.watchers.close();
        let pending = self.watchers.len();
        if pending == 0 {
            return;
        }
        tracing::info!(pending, "Waiting for pipeline watchers");
        if tokio::time::timeout(timeout, self.watchers.wait()).await.is_err() {
            tracing::warn!(
                remaining = self.watchers.len(),
                "Shutdown timeout elapsed with pipelines still running",
            );
        }
    }

    fn callback_url(&self, id: &JobId) -> String {
        format!("{}/processComplete/{id}", self.options.public_base_url)
    }

    fn watch(&self, id: JobId, running: RunningPipeline) {
        let registry = Arc::clone(&self.registry);
        self.watchers.spawn(async move {
            let signal = match running.wait().await {
                Ok(outcome) => {
                    tracing::info!(
                        job_id = %id,
                        exit_code = outcome.exit_code,
                        duration_ms = outcome.duration_ms,
                        "Pipeline process exited",
                    );
                    JobSignal::ProcessExited {
                        exit_code: outcome.exit_code,
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Lost pipeline process");
                    JobSignal::ProcessLost
                }
            };
            match registry.apply(&id, signal).await {
                Ok(job) if job.state == JobState::Failed => {
                    tracing::warn!(job_id = %id, exit_code = ?job.exit_code, "Job failed before reporting completion");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to record pipeline exit"),
            }
        });
    }
}

/// Ids that could never have been issued are simply unknown.
fn lookup_id(raw: &str) -> AppResult<JobId> {
    JobId::parse(raw).map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "job",
            id: raw.to_string(),
        })
    })
}

fn not_found(id: &JobId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "job",
        id: id.to_string(),
    })
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
