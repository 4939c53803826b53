use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/command-logs`.
pub fn router() -> Router<AppState> {
    Router::new().route("/latest", get(jobs::latest_logs))
}
