//! Job registry: the single owner of job state transitions.
//!
//! Callers hold an `Arc<dyn JobRegistry>` so the in-memory map can be swapped
//! for a persistent store without touching the supervisor or handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::state::{Job, JobSignal};
use crate::error::CoreError;
use crate::types::JobId;

/// A job plus the digest of its completion token.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: Job,
    /// `None` when the job was registered without a token.
    pub completion_token_hash: Option<String>,
}

/// Synchronized key-value store of job records.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Register a new job. Fails with [`CoreError::Conflict`] if the id is taken.
    async fn insert(&self, record: JobRecord) -> Result<(), CoreError>;

    /// Look up a job record by id.
    async fn get(&self, id: &JobId) -> Option<JobRecord>;

    /// Apply `signal` to the job atomically and return the updated job.
    ///
    /// Fails with [`CoreError::NotFound`] if the id is unknown.
    async fn apply(&self, id: &JobId, signal: JobSignal) -> Result<Job, CoreError>;

    /// Number of jobs currently tracked.
    async fn len(&self) -> usize;
}

/// Registry backed by a `HashMap` behind an async `RwLock`.
///
/// Status polls take the read lock; registration and transitions take the
/// write lock, so a completion callback and a concurrent exit signal are
/// serialized rather than lost.
#[derive(Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn insert(&self, record: JobRecord) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.job.id) {
            return Err(CoreError::Conflict(format!(
                "Job {} is already registered",
                record.job.id
            )));
        }
        jobs.insert(record.job.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(id).cloned()
    }

    async fn apply(&self, id: &JobId, signal: JobSignal) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;
        record.job.apply(signal);
        Ok(record.job.clone())
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
