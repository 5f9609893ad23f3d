//! External pipeline invocation.
//!
//! The DEM analysis itself runs out of process. This module knows how to
//! launch a [`PipelineVariant`](crate::variants::PipelineVariant), feed it the
//! environment contract, drain and log its streams, and report how it
//! exited. It never touches the job registry.

pub mod executor;
pub mod invoker;
pub mod subprocess;

pub use executor::{ExitOutcome, PipelineError, PipelineInput, PipelineOutput};
pub use invoker::PipelineInvoker;
pub use subprocess::RunningPipeline;
