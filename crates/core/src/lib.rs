//! Domain logic for the DEM job orchestration service.
//!
//! Pure building blocks with no HTTP concerns: job states and the registry,
//! the volume variant router, the external pipeline invoker, output
//! interpretation, and the on-disk artifact layout.

pub mod artifacts;
pub mod error;
pub mod error_log;
pub mod jobs;
pub mod pipeline;
pub mod types;
pub mod variants;
pub mod volume;
