//! Job orchestration service.
//!
//! The [`JobSupervisor`](supervisor::JobSupervisor) ties the core building
//! blocks (registry, artifact store, pipeline invoker) together and is held in
//! [`AppState`](crate::state::AppState) as an `Arc<JobSupervisor>`.

pub mod supervisor;

use axum::body::Bytes;

pub use supervisor::{
    DerivativeOutcome, JobResults, JobSupervisor, SupervisorOptions, MISSING_FILE_MESSAGE,
};

/// An uploaded DEM plus the names that travel with it.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub bytes: Bytes,
    /// File name from the multipart part, used for the stored copy.
    pub file_name: Option<String>,
    /// `originalFileName` form field, passed to the pipeline for labelling.
    pub display_name: Option<String>,
}
