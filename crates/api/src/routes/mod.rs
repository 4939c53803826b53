pub mod command_logs;
pub mod health;
pub mod jobs;
pub mod transcribe;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                        submit (POST)
/// /jobs/{id}/logs              log chunk from ?from=N
/// /jobs/{id}/stream            SSE log stream from ?from=N
///
/// /command-logs/latest         logs of the most recent job
///
/// /transcribe                  audio upload -> plan -> job (POST, multipart)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/command-logs", command_logs::router())
        .merge(transcribe::router())
}
