//! Speech-to-text over an OpenAI-compatible transcription endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::TranscriptionError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Audio container suffixes passed through unchanged.
const KNOWN_AUDIO_SUFFIXES: [&str; 6] = ["wav", "mp3", "m4a", "webm", "ogg", "flac"];

/// Converts an uploaded recording to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`, originally named `file_name`. The result is trimmed.
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<String, TranscriptionError>;
}

/// Normalise an upload name for the transcription service.
///
/// Known audio suffixes are kept (lowercased); anything else is sent as
/// `.wav`, which most decoders sniff correctly regardless.
pub fn normalize_audio_name(file_name: &str) -> String {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext.to_lowercase()),
        _ => (file_name, String::new()),
    };
    let ext = if KNOWN_AUDIO_SUFFIXES.contains(&ext.as_str()) {
        ext
    } else {
        "wav".to_string()
    };
    let stem = if stem.is_empty() { "audio" } else { stem };
    format!("{stem}.{ext}")
}

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl WhisperConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// HTTP client for a Whisper-style transcription endpoint.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    config: WhisperConfig,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl WhisperTranscriber {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, file_name: &str, audio: Vec<u8>) -> Result<String, TranscriptionError> {
        let upload_name = normalize_audio_name(file_name);
        let size = audio.len();
        let form = Form::new()
            .text("model", self.config.model.clone())
            .part("file", Part::bytes(audio).file_name(upload_name.clone()));

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.trim().to_string();
        tracing::debug!(file = %upload_name, size, text_len = text.len(), "transcription done");
        Ok(text)
    }
}
