use axum::routing::post;
use axum::Router;

use crate::handlers::volume;
use crate::state::AppState;

/// ```text
/// POST /calculateVolume    -> calculate_volume
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/calculateVolume", post(volume::calculate_volume))
}
