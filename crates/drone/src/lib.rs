//! Simulated drone capability.
//!
//! Each supported action blocks for roughly the time the physical manoeuvre
//! would take and reports progress lines to an injected writer:
//!
//! - [`DroneControl`] - the seam the job runner drives.
//! - [`DroneExecutor`] - the time-based simulator, one instance per job.
//! - [`Sleeper`] - how the simulator waits (real sleep or recorded).

pub mod error;
pub mod executor;
pub mod params;
pub mod sleeper;

pub use error::DroneError;
pub use executor::{DroneConfig, DroneControl, DroneExecutor};
pub use sleeper::{RecordingSleeper, Sleeper, ThreadSleeper};
