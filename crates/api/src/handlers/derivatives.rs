//! Handlers for derivative raster products.
//!
//! Each endpoint runs one fixed pipeline variant to completion. A failed run
//! is recorded in the error log and answered with `success: false`.

use axum::extract::{Multipart, State};
use axum::Json;
use demscope_core::variants::PipelineVariant;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::upload::DemForm;
use crate::state::AppState;

/// Outcome of a derivative product request.
#[derive(Debug, Serialize)]
pub struct DerivativeResponse {
    pub message: String,
    pub success: bool,
    #[serde(rename = "processId")]
    pub process_id: String,
}

/// POST /shadedRelief
pub async fn shaded_relief(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DerivativeResponse>> {
    run(&state, PipelineVariant::ShadedRelief, "Shaded relief", multipart).await
}

/// POST /calculateSlopes
pub async fn calculate_slopes(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DerivativeResponse>> {
    run(&state, PipelineVariant::Slopes, "Slope", multipart).await
}

/// POST /calculateCurvatures
pub async fn calculate_curvatures(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<DerivativeResponse>> {
    run(&state, PipelineVariant::Curvatures, "Curvature", multipart).await
}

async fn run(
    state: &AppState,
    variant: PipelineVariant,
    product: &str,
    multipart: Multipart,
) -> AppResult<Json<DerivativeResponse>> {
    let mut form = DemForm::read(multipart).await?;
    let upload = form.take_upload()?;
    let outcome = state.supervisor.run_derivative(variant, upload).await?;

    let message = if outcome.success {
        format!("{product} calculation completed")
    } else {
        format!("{product} calculation failed")
    };
    Ok(Json(DerivativeResponse {
        message,
        success: outcome.success,
        process_id: outcome.process_id.to_string(),
    }))
}
