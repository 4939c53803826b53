use std::sync::Arc;

use dronevox_jobs::JobService;
use dronevox_planner::{CommandPlanner, Transcriber};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job submission, log queries and streams.
    pub jobs: Arc<JobService>,
    /// Speech-to-text; `None` when no transcription key is configured.
    pub transcriber: Option<Arc<dyn Transcriber>>,
    /// Text-to-commands; `None` when no model key is configured.
    pub planner: Option<Arc<dyn CommandPlanner>>,
}
