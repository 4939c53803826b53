//! Serve the router until a shutdown signal, then wind down within a bound.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use dronevox_jobs::JobService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// How a shutdown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every connection closed and every job finished in time.
    Clean,
    /// The timeout elapsed with connections still open.
    ConnectionsOpen,
    /// Connections closed but jobs were still pending or running.
    JobsRunning,
}

/// Serve `app` on `listener` until `signal` resolves.
///
/// On the signal, open job log streams are ended and the server stops
/// accepting connections. `shutdown_timeout`, counted from the signal, bounds
/// both the wait for in-flight connections and the wait for running jobs.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    jobs: Arc<JobService>,
    shutdown_timeout: Duration,
    signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<ShutdownOutcome> {
    let (signalled_tx, mut signalled_rx) = oneshot::channel::<Instant>();
    let closing = {
        let jobs = Arc::clone(&jobs);
        async move {
            signal.await;
            jobs.begin_shutdown();
            let _ = signalled_tx.send(Instant::now());
        }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(closing)
        .into_future();
    tokio::pin!(server);

    let signalled_at = tokio::select! {
        biased;
        at = &mut signalled_rx => at.unwrap_or_else(|_| Instant::now()),
        result = &mut server => {
            result?;
            return Ok(drain_jobs(&jobs, Instant::now() + shutdown_timeout).await);
        }
    };

    let deadline = signalled_at + shutdown_timeout;
    match tokio::time::timeout_at(deadline, &mut server).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs_f64(),
                "Connections still open at shutdown timeout",
            );
            return Ok(ShutdownOutcome::ConnectionsOpen);
        }
    }

    tracing::info!("Server stopped accepting connections, waiting for running jobs");
    Ok(drain_jobs(&jobs, deadline).await)
}

/// Wait until no job is pending or running, up to `deadline`.
async fn drain_jobs(jobs: &JobService, deadline: Instant) -> ShutdownOutcome {
    while jobs.active_jobs() > 0 {
        if Instant::now() >= deadline {
            return ShutdownOutcome::JobsRunning;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    ShutdownOutcome::Clean
}
