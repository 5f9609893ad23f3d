use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque job identifier shared by the registry, the artifact directories and
/// the `PROCESS_ID` environment variable handed to the pipeline.
///
/// Freshly minted ids are UUID v4 strings. Ids supplied by clients (the
/// volume endpoint accepts one) only need to be filesystem-safe, see
/// [`JobId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Maximum accepted length of a client-supplied job id.
pub const MAX_JOB_ID_LEN: usize = 128;

impl JobId {
    /// Mint a fresh, previously unseen identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a client-supplied identifier.
    ///
    /// The id becomes a directory name, so only `[A-Za-z0-9_-]` is accepted.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::Validation("processId must not be empty".into()));
        }
        if raw.len() > MAX_JOB_ID_LEN {
            return Err(CoreError::Validation(format!(
                "processId must be at most {MAX_JOB_ID_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::Validation(format!(
                "processId '{raw}' contains invalid characters"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
