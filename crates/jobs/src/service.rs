//! Job submission and query boundary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dronevox_core::{Command, CoreError, JobId, JobStatus};
use dronevox_drone::{DroneConfig, DroneControl, DroneExecutor, Sleeper};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::history::save_command_payload;
use crate::registry::JobRegistry;
use crate::runner::{JobRunner, UnknownActionPolicy};
use crate::store::{JobLog, LogChunk};

/// Default interval between stream polls when no append wakes the reader.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Builds the drone a new job runs against. Called once per job, on the
/// job's own blocking thread.
pub type DroneFactory = Arc<dyn Fn() -> Box<dyn DroneControl> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Directory for `<job_id>.log` files.
    pub log_dir: PathBuf,
    /// Directory for `<job_id>.json` payload copies.
    pub history_dir: PathBuf,
    /// Upper bound on how long a stream waits between polls.
    pub poll_interval: Duration,
    pub unknown_action_policy: UnknownActionPolicy,
}

impl JobsConfig {
    /// Config rooted at `root`, with `command_logs/` and `command_history/`
    /// beneath it and default timing and policy.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            log_dir: root.join("command_logs"),
            history_dir: root.join("command_history"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            unknown_action_policy: UnknownActionPolicy::default(),
        }
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
    /// Where the payload copy landed, when it could be written.
    pub command_file: Option<PathBuf>,
}

/// Logs of the most recent job as seen by a client that may have been
/// following an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestLogs {
    pub job_id: Option<JobId>,
    pub logs: Vec<String>,
    pub next_index: usize,
    pub status: Option<JobStatus>,
    /// `true` when the latest job is not the one the client named; the
    /// client should drop its cursor and start over from these logs.
    pub reset: bool,
}

impl LatestLogs {
    fn none() -> Self {
        Self {
            job_id: None,
            logs: Vec::new(),
            next_index: 0,
            status: None,
            reset: false,
        }
    }
}

pub struct JobService {
    registry: JobRegistry,
    config: JobsConfig,
    drone_factory: DroneFactory,
    closing: watch::Sender<bool>,
}

impl JobService {
    pub fn new(config: JobsConfig, drone_factory: DroneFactory) -> Self {
        Self {
            registry: JobRegistry::new(config.log_dir.clone()),
            config,
            drone_factory,
            closing: watch::Sender::new(false),
        }
    }

    /// Service whose jobs run against the time-based drone simulator.
    pub fn simulated(config: JobsConfig, drone: DroneConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        let factory: DroneFactory = Arc::new(move || {
            Box::new(DroneExecutor::new(drone, Arc::clone(&sleeper))) as Box<dyn DroneControl>
        });
        Self::new(config, factory)
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// End every open log stream. Running jobs are left alone.
    pub fn begin_shutdown(&self) {
        if !self.closing.send_replace(true) {
            tracing::info!(active_jobs = self.active_jobs(), "closing job log streams");
        }
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    pub(crate) fn closing(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    /// Submit `commands`, saving `{"commands": [...]}` as the payload copy.
    pub fn submit(&self, commands: Vec<Command>) -> Result<SubmittedJob, CoreError> {
        let payload = serde_json::json!({ "commands": commands });
        self.submit_with_payload(commands, &payload)
    }

    /// Register a job for `commands`, persist `payload`, and start the job in
    /// the background. Returns without waiting for any command to run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit_with_payload(
        &self,
        commands: Vec<Command>,
        payload: &serde_json::Value,
    ) -> Result<SubmittedJob, CoreError> {
        if commands.is_empty() {
            return Err(CoreError::InvalidArgument(
                "commands list is empty".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Internal(format!("no async runtime to run the job on: {e}")))?;

        let log = self.registry.register()?;
        let job_id = log.id();

        let command_file = match save_command_payload(&self.config.history_dir, job_id, payload) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(%job_id, error = %e, "failed to save command payload");
                None
            }
        };

        tracing::info!(
            %job_id,
            commands = commands.len(),
            command_file = ?command_file,
            "job submitted",
        );

        let runner_log = Arc::clone(&log);
        let factory = Arc::clone(&self.drone_factory);
        let policy = self.config.unknown_action_policy;
        runtime.spawn(async move {
            let joined = tokio::task::spawn_blocking(move || {
                let drone = factory();
                JobRunner::new(runner_log, commands, drone, policy).run()
            })
            .await;

            if let Err(err) = joined {
                let reason = describe_join_error(err);
                tracing::error!(%job_id, %reason, "job runner crashed");
                log.fail_unexpectedly(&reason);
            }
        });

        Ok(SubmittedJob {
            job_id,
            command_file,
        })
    }

    /// Lines of `job_id` from `from` onward, with the job's current status.
    pub fn get_logs(&self, job_id: &str, from: usize) -> Result<LogChunk, CoreError> {
        let chunk = self.lookup(job_id)?.read_from(from)?;
        tracing::debug!(
            job_id,
            requested_from = from,
            returned_lines = chunk.logs.len(),
            next_index = chunk.next_index,
            status = %chunk.status,
            "job logs chunk",
        );
        Ok(chunk)
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatus, CoreError> {
        Ok(self.lookup(job_id)?.status())
    }

    /// Jobs still pending or running.
    pub fn active_jobs(&self) -> usize {
        self.registry.active_count()
    }

    pub fn latest_job_id(&self) -> Option<JobId> {
        self.registry.latest()
    }

    /// Logs of the most recent job.
    ///
    /// `from` is honoured only when `known_job_id` names that job; otherwise
    /// the read starts at 0 and `reset` is set. With `running_only`, a latest
    /// job that is not currently running yields the empty view.
    pub fn get_latest(
        &self,
        from: usize,
        known_job_id: Option<&str>,
        running_only: bool,
    ) -> Result<LatestLogs, CoreError> {
        let Some(latest) = self.registry.latest() else {
            return Ok(LatestLogs::none());
        };

        let latest_text = latest.to_string();
        let is_known = known_job_id.map(str::trim) == Some(latest_text.as_str());
        let start = if is_known { from } else { 0 };
        let chunk = self.lookup(&latest_text)?.read_from(start)?;

        if running_only && chunk.status != JobStatus::Running {
            return Ok(LatestLogs::none());
        }

        Ok(LatestLogs {
            job_id: Some(latest),
            logs: chunk.logs,
            next_index: chunk.next_index,
            status: Some(chunk.status),
            reset: !is_known,
        })
    }

    pub(crate) fn lookup(&self, job_id: &str) -> Result<Arc<JobLog>, CoreError> {
        self.registry.find(job_id)
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_cancelled() {
        return "runner task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("runner panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("runner panicked: {msg}")
    } else {
        "runner panicked".to_string()
    }
}
