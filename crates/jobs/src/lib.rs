//! Asynchronous job execution and log streaming.
//!
//! - [`store`] - per-job append-only log, mirrored to a file.
//! - [`registry`] - job id → log/status map plus the latest job id.
//! - [`runner`] - the per-job state machine driving a drone.
//! - [`relay`] - line-buffers drone progress output into the log.
//! - [`stream`] - live log subscription until terminal status.
//! - [`service`] - the submission and query boundary.
//! - [`history`] - persisted copies of submitted command payloads.

pub mod history;
pub mod registry;
pub mod relay;
pub mod runner;
pub mod service;
pub mod store;
pub mod stream;

pub use registry::JobRegistry;
pub use runner::{JobRunner, UnknownActionPolicy};
pub use service::{DroneFactory, JobService, JobsConfig, LatestLogs, SubmittedJob};
pub use store::{JobLog, LogChunk};
pub use stream::StreamEvent;
