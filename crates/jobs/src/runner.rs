//! Per-job state machine.
//!
//! A runner owns one job from `Running` to a terminal status. Commands run
//! strictly in order; the first drone error ends the job as `Failed` and
//! nothing after it runs. There is no retry.

use std::str::FromStr;
use std::sync::Arc;

use dronevox_core::{Command, JobStatus};
use dronevox_drone::DroneControl;

use crate::relay::LineRelay;
use crate::store::JobLog;

/// What to do with a command whose action has no dedicated drone handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownActionPolicy {
    /// Log a skip line and continue with the next command.
    #[default]
    Skip,
    /// Hand the command to the drone's fallback handler.
    Tolerate,
    /// Log the rejection and fail the job.
    Fail,
}

impl FromStr for UnknownActionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "tolerate" => Ok(Self::Tolerate),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "invalid unknown action policy: {other} (expected \"skip\", \"tolerate\" or \"fail\")"
            )),
        }
    }
}

pub struct JobRunner {
    log: Arc<JobLog>,
    commands: Vec<Command>,
    drone: Box<dyn DroneControl>,
    policy: UnknownActionPolicy,
}

impl JobRunner {
    pub fn new(
        log: Arc<JobLog>,
        commands: Vec<Command>,
        drone: Box<dyn DroneControl>,
        policy: UnknownActionPolicy,
    ) -> Self {
        Self {
            log,
            commands,
            drone,
            policy,
        }
    }

    /// Drive the job to a terminal status and return it. Blocks for the
    /// simulated duration of every command.
    pub fn run(mut self) -> JobStatus {
        let job_id = self.log.id();
        self.log.set_status(JobStatus::Running);
        tracing::info!(%job_id, commands = self.commands.len(), "job started");
        self.note("Drone simulation started.");

        let outcome = {
            let mut relay = LineRelay::new(Arc::clone(&self.log));
            let outcome = self.execute_all(&mut relay);
            if let Err(e) = relay.finish() {
                tracing::error!(%job_id, error = %e, "failed to flush relayed output");
            }
            outcome
        };

        if outcome == JobStatus::Completed {
            self.note("All commands completed successfully.");
        }
        self.log.set_status(outcome);

        if !self.log.status().is_terminal() {
            self.log
                .fail_unexpectedly("job ended without reaching a terminal status");
        }

        let status = self.log.status();
        tracing::info!(%job_id, %status, "job finished");
        status
    }

    fn execute_all(&mut self, relay: &mut LineRelay) -> JobStatus {
        let total = self.commands.len();
        let commands = std::mem::take(&mut self.commands);

        for (idx, command) in commands.iter().enumerate() {
            let idx = idx + 1;

            let Some(action) = command.action_name() else {
                let raw = serde_json::to_string(command).unwrap_or_default();
                self.note(&format!("[{idx}] skipped: missing action {raw}"));
                continue;
            };

            self.note(&format!(
                "[{idx}/{total}] '{action}' starting (params={})",
                serde_json::Value::Object(command.params.clone())
            ));

            if !self.drone.has_capability(action) {
                match self.policy {
                    UnknownActionPolicy::Skip => {
                        self.note(&format!("'{action}' skipped: unknown action"));
                        continue;
                    }
                    UnknownActionPolicy::Fail => {
                        self.note(&format!("'{action}' rejected: unknown action"));
                        return JobStatus::Failed;
                    }
                    UnknownActionPolicy::Tolerate => {}
                }
            }

            match self.drone.execute(action, &command.params, relay) {
                Ok(()) => self.note(&format!("'{action}' completed.")),
                Err(e) => {
                    tracing::warn!(job_id = %self.log.id(), action, error = %e, "command failed");
                    self.note(&format!("'{action}' failed: {e}"));
                    return JobStatus::Failed;
                }
            }
        }

        JobStatus::Completed
    }

    fn note(&self, message: &str) {
        if let Err(e) = self.log.append(message) {
            tracing::error!(job_id = %self.log.id(), error = %e, "failed to persist log line");
        }
    }
}
