//! Shared response types for API handlers.
//!
//! The DEM endpoints keep the flat shapes existing clients already parse
//! (`{ message, processId }`, `{ status }`). Newer read endpoints use the
//! `{ "data": ... }` envelope via [`DataResponse`].

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// # Example
///
/// ```ignore
/// Ok(Json(DataResponse { data: results }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "message": ... }` acknowledgement, optionally carrying a process id.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(rename = "processId", skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
}
