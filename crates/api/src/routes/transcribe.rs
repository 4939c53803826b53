use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::transcribe;
use crate::state::AppState;

/// Largest accepted audio upload.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transcribe", post(transcribe::transcribe))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
