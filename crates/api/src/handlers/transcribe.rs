//! Voice upload: transcribe, plan commands, and start a job.

use axum::extract::{Multipart, State};
use axum::Json;
use dronevox_core::JobId;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Longest command text echoed into the response log line.
const SUMMARY_CHARS: usize = 120;

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    /// Model output shown to the user, or a note on why there is none.
    pub command: String,
    pub command_payload: Option<Value>,
    pub commands: Value,
    pub job_id: Option<JobId>,
    pub command_file: Option<String>,
}

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// POST /api/v1/transcribe
///
/// Multipart upload with a `file` field. Returns 400 when the upload has no
/// file name and 500 when transcription fails. Planning and submission
/// problems do not fail the request; they leave `job_id` null and explain
/// themselves in `command`.
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<TranscribeResponse>> {
    let upload = read_upload(multipart).await?;
    tracing::info!(
        file_name = %upload.file_name,
        content_type = ?upload.content_type,
        size = upload.bytes.len(),
        "transcribe received",
    );

    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or_else(|| AppError::Transcription("transcription is not configured".into()))?;
    let text = transcriber
        .transcribe(&upload.file_name, upload.bytes)
        .await
        .map_err(|e| AppError::Transcription(e.to_string()))?;

    let mut response = TranscribeResponse {
        text,
        command: String::new(),
        command_payload: None,
        commands: Value::Array(Vec::new()),
        job_id: None,
        command_file: None,
    };

    if !response.text.is_empty() {
        plan_and_submit(&state, &mut response).await;
    }

    tracing::info!(
        job_id = ?response.job_id,
        text_len = response.text.len(),
        command_summary = %summarize(&response.command),
        "transcribe response",
    );

    Ok(Json(response))
}

async fn plan_and_submit(state: &AppState, response: &mut TranscribeResponse) {
    let Some(planner) = state.planner.as_ref() else {
        response.command = "(command planning is not configured)".to_string();
        return;
    };

    let plan = match planner.plan(&response.text).await {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!(error = %e, "command planning failed");
            response.command = format!("(command generation failed: {e})");
            return;
        }
    };

    response.command = plan.display_text.clone();
    response.commands = plan
        .payload
        .get("commands")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    response.command_payload = Some(plan.payload.clone());

    if plan.commands.is_empty() {
        if response.command.is_empty() {
            response.command = "(no commands were generated)".to_string();
        }
        return;
    }

    let command_count = plan.commands.len();
    match state.jobs.submit_with_payload(plan.commands, &plan.payload) {
        Ok(submitted) => {
            let command_file = submitted.command_file.map(|p| p.display().to_string());
            tracing::info!(
                job_id = %submitted.job_id,
                commands = command_count,
                command_file = ?command_file,
                "job started from voice command",
            );
            response.job_id = Some(submitted.job_id);
            response.command_file = command_file;
        }
        Err(e) => tracing::warn!(error = %e, "voice command job was not started"),
    }
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Uploaded file has no file name".into()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        return Ok(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::BadRequest("Missing required 'file' field".into()))
}

fn summarize(command: &str) -> String {
    if command.chars().count() > SUMMARY_CHARS {
        let head: String = command.chars().take(SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        command.to_string()
    }
}
