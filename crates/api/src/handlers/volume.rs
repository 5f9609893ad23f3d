use axum::extract::{Multipart, State};
use axum::Json;
use demscope_core::volume::VolumeReport;

use crate::error::AppResult;
use crate::handlers::upload::{DemForm, FIELD_APPROXIMATION_TYPE, FIELD_VOLUME_TYPE};
use crate::state::AppState;

/// POST /calculateVolume
///
/// Run the volume variant selected by `volumeType` and `approximationType`
/// and wait for it. The body is the pipeline's `{ result, images }` payload
/// when it printed one, otherwise `{ result }` with the raw output.
pub async fn calculate_volume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<VolumeReport>> {
    let mut form = DemForm::read(multipart).await?;
    let upload = form.take_upload()?;
    let category = DemForm::required(&form.volume_type, FIELD_VOLUME_TYPE)?;
    let method = DemForm::required(&form.approximation_type, FIELD_APPROXIMATION_TYPE)?;

    let report = state
        .supervisor
        .estimate_volume(upload, category, method, form.process_id.as_deref())
        .await?;
    Ok(Json(report))
}
