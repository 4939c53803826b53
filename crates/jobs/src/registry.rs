//! Job id → log/status registry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dronevox_core::{CoreError, JobId};
use parking_lot::RwLock;

use crate::store::JobLog;

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<JobId, Arc<JobLog>>,
    latest: Option<JobId>,
}

/// Every job submitted during this process's lifetime.
///
/// Entries are never removed. Registration and the latest-id update happen
/// under one write lock, so concurrent submissions cannot interleave them.
pub struct JobRegistry {
    log_dir: PathBuf,
    state: RwLock<RegistryState>,
}

impl JobRegistry {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Allocate a fresh id, create its empty log file, and record it as the
    /// latest job. The new job starts `Pending`.
    ///
    /// The id is checked and the file created under the write lock, so an
    /// existing job's log is never reopened.
    pub fn register(&self) -> Result<Arc<JobLog>, CoreError> {
        fs::create_dir_all(&self.log_dir)?;
        let mut state = self.state.write();
        loop {
            let id = JobId::new();
            let Entry::Vacant(slot) = state.jobs.entry(id) else {
                continue;
            };
            let log = match JobLog::create(&self.log_dir, id) {
                Ok(log) => Arc::new(log),
                // A file left by an earlier process; pick another id.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            slot.insert(Arc::clone(&log));
            state.latest = Some(id);
            return Ok(log);
        }
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<JobLog>> {
        self.state.read().jobs.get(id).cloned()
    }

    /// Look up a job by its textual id. Malformed ids are simply unknown.
    pub fn find(&self, id: &str) -> Result<Arc<JobLog>, CoreError> {
        id.parse::<JobId>()
            .ok()
            .and_then(|parsed| self.get(&parsed))
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    pub fn latest(&self) -> Option<JobId> {
        self.state.read().latest
    }

    pub fn len(&self) -> usize {
        self.state.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs not yet in a terminal status.
    pub fn active_count(&self) -> usize {
        self.state
            .read()
            .jobs
            .values()
            .filter(|log| !log.status().is_terminal())
            .count()
    }
}
