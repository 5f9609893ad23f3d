pub mod derivatives;
pub mod health;
pub mod process;
pub mod volume;

use axum::Router;

use crate::state::AppState;

/// Build the DEM route tree.
///
/// Paths are mounted at the root so existing frontends keep working.
///
/// ```text
/// /process                          submit a full analysis (POST)
/// /processStatus/{processId}        poll job status (GET)
/// /processComplete/{processId}      pipeline completion callback (POST)
/// /processResults/{processId}       artifacts and manifest (GET)
///
/// /calculateVolume                  synchronous volume estimate (POST)
///
/// /shadedRelief                     shaded relief product (POST)
/// /calculateSlopes                  slope product (POST)
/// /calculateCurvatures              curvature product (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(process::router())
        .merge(volume::router())
        .merge(derivatives::router())
}
