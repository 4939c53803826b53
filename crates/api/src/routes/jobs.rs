//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                -> submit_job
/// GET    /{id}/logs       -> get_logs
/// GET    /{id}/stream     -> stream_logs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(jobs::submit_job))
        .route("/{id}/logs", get(jobs::get_logs))
        .route("/{id}/stream", get(jobs::stream_logs))
}
