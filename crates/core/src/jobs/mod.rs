//! Job lifecycle: states, completion tokens, and the registry that owns them.
//!
//! Everything here is pure in-process bookkeeping. Spawning the pipeline and
//! persisting uploads live in [`crate::pipeline`] and [`crate::artifacts`].

pub mod registry;
pub mod state;
pub mod token;

pub use registry::{InMemoryJobRegistry, JobRecord, JobRegistry};
pub use state::{Job, JobSignal, JobState};
pub use token::CompletionToken;
