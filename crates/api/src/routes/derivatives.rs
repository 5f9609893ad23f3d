//! Route definitions for derivative raster products.

use axum::routing::post;
use axum::Router;

use crate::handlers::derivatives;
use crate::state::AppState;

/// ```text
/// POST /shadedRelief           -> shaded_relief
/// POST /calculateSlopes        -> calculate_slopes
/// POST /calculateCurvatures    -> calculate_curvatures
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shadedRelief", post(derivatives::shaded_relief))
        .route("/calculateSlopes", post(derivatives::calculate_slopes))
        .route("/calculateCurvatures", post(derivatives::calculate_curvatures))
}
