//! Handlers for job submission, log queries and live log streams.

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use dronevox_core::{Command, JobId};
use dronevox_jobs::{LatestLogs, LogChunk, StreamEvent};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// A missing list is treated like an empty one and rejected.
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub command_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub from: usize,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    #[serde(default)]
    pub from: usize,
    /// The job the client is currently following, if any.
    pub job_id: Option<String>,
    #[serde(default)]
    pub running_only: bool,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Start a job for the given commands. Returns 201 as soon as the job is
/// registered; the commands run in the background.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    let submitted = state.jobs.submit(input.commands)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: submitted.job_id,
            command_file: submitted.command_file.map(|p| p.display().to_string()),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/logs?from=N
pub async fn get_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<LogChunk>> {
    let chunk = state.jobs.get_logs(&id, query.from)?;
    Ok(Json(chunk))
}

/// GET /api/v1/command-logs/latest?from=N&job_id=...&running_only=true
///
/// Logs of the most recent job. When `job_id` is not that job, the response
/// starts from line 0 with `reset: true`.
pub async fn latest_logs(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
) -> AppResult<Json<LatestLogs>> {
    let latest = state
        .jobs
        .get_latest(query.from, query.job_id.as_deref(), query.running_only)?;
    Ok(Json(latest))
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/stream?from=N
///
/// Server-sent events: one `data:` frame per log line, then a single
/// `status` event once the job is terminal. An unknown job yields one
/// `error` event carrying `not_found`; `read_failed` and `shutting_down`
/// are the only other error payloads.
pub async fn stream_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .jobs
        .stream_logs(&id, query.from)
        .map(|event| Ok(to_sse_event(event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Line(line) => Event::default().data(line),
        StreamEvent::Status(status) => Event::default().event("status").data(status.as_str()),
        StreamEvent::NotFound => Event::default().event("error").data("not_found"),
        StreamEvent::ReadFailed => Event::default().event("error").data("read_failed"),
        StreamEvent::Closing => Event::default().event("error").data("shutting_down"),
    }
}
