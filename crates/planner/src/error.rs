/// Errors from turning transcribed text into a command plan.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The model API returned a non-2xx status code.
    #[error("Model API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("No model supporting generateContent is available")]
    NoModelAvailable,

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("No valid JSON object found in model response")]
    NoJson,

    /// The payload parsed but its `commands` entry is not a command list.
    #[error("Invalid command list in model response: {0}")]
    InvalidCommands(serde_json::Error),

    #[error("Failed to read prompt template: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Errors from the speech-to-text service.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transcription API error ({status}): {body}")]
    Api { status: u16, body: String },
}
