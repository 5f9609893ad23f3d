use std::sync::Arc;

use demscope_core::artifacts::ArtifactStore;
use demscope_core::error_log::{ErrorLog, ERROR_LOG_FILE};
use demscope_core::jobs::{InMemoryJobRegistry, JobRegistry};
use demscope_core::pipeline::PipelineInvoker;

use crate::config::ServerConfig;
use crate::orchestration::{JobSupervisor, SupervisorOptions};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job supervisor (registry, artifact store, pipeline invoker).
    pub supervisor: Arc<JobSupervisor>,
}

impl AppState {
    /// Wire up a supervisor backed by the in-memory job registry.
    pub fn from_config(config: ServerConfig) -> Self {
        let registry: Arc<dyn JobRegistry> = Arc::new(InMemoryJobRegistry::new());
        Self::with_registry(config, registry)
    }

    /// Wire up a supervisor around an existing registry.
    pub fn with_registry(config: ServerConfig, registry: Arc<dyn JobRegistry>) -> Self {
        let store = ArtifactStore::new(&config.artifact_root);
        let error_log = ErrorLog::new(store.logs_root().join(ERROR_LOG_FILE));
        let invoker = PipelineInvoker::new(
            config.pipeline.interpreter.clone(),
            config.pipeline.scripts_dir.clone(),
            config.pipeline.timeout_secs.map(std::time::Duration::from_secs),
        );
        let supervisor = JobSupervisor::new(
            registry,
            store,
            invoker,
            error_log,
            SupervisorOptions {
                public_base_url: config.public_base_url.clone(),
                require_completion_token: config.require_completion_token,
            },
        );
        Self {
            config: Arc::new(config),
            supervisor: Arc::new(supervisor),
        }
    }
}
