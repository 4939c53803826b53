pub mod jobs;
pub mod transcribe;
