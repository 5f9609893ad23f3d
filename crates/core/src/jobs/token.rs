//! Per-job completion tokens.
//!
//! The pipeline receives the plaintext through `PROCESS_COMPLETION_TOKEN` and
//! must echo it back on the completion callback. Only the SHA-256 digest is
//! kept in the registry.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of the generated token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

/// A freshly minted completion token.
pub struct CompletionToken {
    /// Handed to the pipeline process exactly once, never stored.
    pub plaintext: String,
    /// SHA-256 hex digest kept alongside the job.
    pub hash: String,
}

impl CompletionToken {
    pub fn generate() -> Self {
        let plaintext: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        let hash = hash_token(&plaintext);
        Self { plaintext, hash }
    }
}

/// Compute the SHA-256 hex digest of a token.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{digest:x}")
}

/// Check a presented token against a stored digest.
///
/// Digests are compared in constant time. A stored value of the wrong
/// length never matches.
pub fn verify_token(presented: &str, stored_hash: &str) -> bool {
    let presented_hash = hash_token(presented);
    let presented_bytes = presented_hash.as_bytes();
    let stored_bytes = stored_hash.as_bytes();
    presented_bytes.len() == stored_bytes.len() && bool::from(presented_bytes.ct_eq(stored_bytes))
}
