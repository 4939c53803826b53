//! Speech-to-command planning.
//!
//! Turns an uploaded utterance into a drone command plan in two steps:
//! [`Transcriber`] converts audio to text, then [`CommandPlanner`] asks a
//! language model for a `{"commands": [...]}` payload.

pub mod error;
pub mod extract;
pub mod gemini;
pub mod plan;
pub mod prompt;
pub mod transcribe;

pub use error::{PlannerError, TranscriptionError};
pub use gemini::{GeminiConfig, GeminiPlanner};
pub use plan::{CommandPlanner, DronePlan};
pub use transcribe::{normalize_audio_name, Transcriber, WhisperConfig, WhisperTranscriber};
