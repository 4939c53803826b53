//! Shared domain types for the voice-driven drone job engine.
//!
//! Everything here is pure data plus small helpers, so every other crate in
//! the workspace can depend on it without pulling in a runtime.

pub mod command;
pub mod error;
pub mod log_line;
pub mod status;
pub mod types;

pub use command::{Command, Params};
pub use error::CoreError;
pub use status::JobStatus;
pub use types::JobId;
