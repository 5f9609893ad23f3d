//! Route definitions for asynchronous full-analysis jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::process;
use crate::state::AppState;

/// ```text
/// POST /process                        -> submit
/// GET  /processStatus/{processId}      -> get_status
/// POST /processComplete/{processId}    -> report_completion
/// GET  /processResults/{processId}     -> get_results
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/process", post(process::submit))
        .route("/processStatus/{process_id}", get(process::get_status))
        .route(
            "/processComplete/{process_id}",
            post(process::report_completion),
        )
        .route("/processResults/{process_id}", get(process::get_results))
}
