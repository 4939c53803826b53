use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dronevox_drone::ThreadSleeper;
use dronevox_jobs::JobService;
use dronevox_planner::{CommandPlanner, GeminiPlanner, Transcriber, WhisperTranscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dronevox_api::config::ServerConfig;
use dronevox_api::router::build_app_router;
use dronevox_api::server::{serve, ShutdownOutcome};
use dronevox_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dronevox_api=debug,dronevox_jobs=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        log_dir = %config.jobs.log_dir.display(),
        history_dir = %config.jobs.history_dir.display(),
        poll_interval_ms = config.jobs.poll_interval.as_millis() as u64,
        unknown_action_policy = ?config.jobs.unknown_action_policy,
        "Loaded job engine configuration",
    );

    // --- Job engine ---
    let jobs = Arc::new(JobService::simulated(
        config.jobs.clone(),
        config.drone,
        Arc::new(ThreadSleeper),
    ));

    // --- Speech and planning ---
    let transcriber: Option<Arc<dyn Transcriber>> = match &config.transcription {
        Some(whisper) => {
            tracing::info!(url = %whisper.api_url, model = %whisper.model, "Transcription enabled");
            Some(Arc::new(WhisperTranscriber::new(whisper.clone())))
        }
        None => {
            tracing::warn!("WHISPER_API_KEY not set, transcription disabled");
            None
        }
    };

    let planner: Option<Arc<dyn CommandPlanner>> = match &config.planner {
        Some(gemini) => {
            let planner = GeminiPlanner::new(gemini.clone()).expect("Failed to load prompt template");
            tracing::info!(model = %gemini.model, "Command planner enabled");
            Some(Arc::new(planner))
        }
        None => {
            tracing::warn!("GOOGLE_API_KEY not set, command planning disabled");
            None
        }
    };

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        jobs: Arc::clone(&jobs),
        transcriber,
        planner,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let outcome = serve(
        listener,
        app,
        Arc::clone(&jobs),
        Duration::from_secs(config.shutdown_timeout_secs),
        shutdown_signal(),
    )
    .await
    .expect("Server error");

    match outcome {
        ShutdownOutcome::Clean => tracing::info!("Graceful shutdown complete"),
        ShutdownOutcome::ConnectionsOpen | ShutdownOutcome::JobsRunning => {
            tracing::warn!(
                active_jobs = jobs.active_jobs(),
                ?outcome,
                "Shutdown timeout reached, abandoning running jobs"
            );
            // Blocking job threads would otherwise hold the runtime open.
            std::process::exit(0);
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
