//! Handlers for asynchronous full-analysis jobs.
//!
//! Submission returns immediately with a `processId`; clients poll
//! `/processStatus` until the pipeline reports back via `/processComplete`.

use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use demscope_core::jobs::JobState;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::upload::DemForm;
use crate::orchestration::JobResults;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

/// Header carrying the per-job completion token on callbacks.
pub const COMPLETION_TOKEN_HEADER: &str = "x-completion-token";

/// `{ "status": ... }` body of a status poll.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: JobState,
}

/// Acknowledgement of a completion callback.
#[derive(Debug, Serialize)]
pub struct CompletionAck {
    pub message: String,
    #[serde(rename = "processId")]
    pub process_id: String,
    pub status: JobState,
}

/// POST /process
///
/// Store the uploaded DEM and start the full analysis in the background.
pub async fn submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<MessageResponse>> {
    let mut form = DemForm::read(multipart).await?;
    let upload = form.take_upload()?;
    let id = state.supervisor.submit(upload).await?;

    Ok(Json(MessageResponse {
        message: "File uploaded and processing started".to_string(),
        process_id: Some(id.to_string()),
    }))
}

/// GET /processStatus/{processId}
pub async fn get_status(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    let job = state.supervisor.status(&process_id).await?;
    Ok(Json(StatusResponse { status: job.state }))
}

/// POST /processComplete/{processId}
///
/// Called by the pipeline when its own work succeeded. Repeated calls are
/// acknowledged the same way.
pub async fn report_completion(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Json<CompletionAck>> {
    let token = headers
        .get(COMPLETION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let job = state.supervisor.complete(&process_id, token).await?;

    Ok(Json(CompletionAck {
        message: "Process marked as completed".to_string(),
        process_id: job.id.to_string(),
        status: job.state,
    }))
}

/// GET /processResults/{processId}
///
/// List the job's output files and its analysis manifest, if written.
pub async fn get_results(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
) -> AppResult<Json<DataResponse<JobResults>>> {
    let results = state.supervisor.results(&process_id).await?;
    Ok(Json(DataResponse { data: results }))
}
