//! Interpretation of volume pipeline output.
//!
//! Decoding happens in two independent stages:
//!
//! 1. [`decode_structured`]: stdout carries a `{"result": ..., "images": [...]}`
//!    payload, either as the whole output or as its last non-empty line
//!    (scripts log progress lines before printing the payload).
//! 2. [`VolumeReport::raw`]: anything else is wrapped verbatim as the result
//!    text, so plain-text scripts keep working.
//!
//! A structured `result` is passed through as whatever JSON the script
//! printed: a number stays a number, an object stays an object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response envelope for a volume estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReport {
    /// The script's result value, or its trimmed stdout as a string.
    pub result: Value,
    /// Public paths of images produced alongside the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl VolumeReport {
    /// Wrap unstructured output as the result text.
    pub fn raw(stdout: &str) -> Self {
        Self {
            result: Value::String(stdout.trim().to_string()),
            images: None,
        }
    }
}

/// Stage one: decode a structured payload, if there is one.
pub fn decode_structured(stdout: &str) -> Option<VolumeReport> {
    let trimmed = stdout.trim();
    if let Ok(report) = serde_json::from_str::<VolumeReport>(trimmed) {
        return Some(report);
    }
    let last_line = trimmed.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    if last_line.starts_with('{') {
        serde_json::from_str::<VolumeReport>(last_line).ok()
    } else {
        None
    }
}

/// Decode stdout, falling back to the raw text when no payload is found.
pub fn interpret(stdout: &str) -> VolumeReport {
    decode_structured(stdout).unwrap_or_else(|| {
        tracing::debug!("Volume output is not structured, returning raw text");
        VolumeReport::raw(stdout)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
