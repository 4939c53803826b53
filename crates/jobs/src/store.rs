//! Per-job append-only log store.
//!
//! Every line is written to the job's file first and only then counted in
//! memory, both under one mutex. Readers take the durable length under that
//! mutex and then re-read the file, so a read never observes a line that has
//! not been fully written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use dronevox_core::log_line::format_log_line;
use dronevox_core::{CoreError, JobId, JobStatus};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// A slice of a job's log starting at some offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogChunk {
    pub logs: Vec<String>,
    pub next_index: usize,
    pub status: JobStatus,
}

struct LogState {
    lines: Vec<String>,
    file: File,
    /// Byte length of the fully written lines in `file`.
    committed: u64,
    status: JobStatus,
}

pub struct JobLog {
    id: JobId,
    path: PathBuf,
    state: Mutex<LogState>,
    changed: Notify,
}

impl JobLog {
    /// Create `<dir>/<id>.log` and start the job as `Pending`.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] rather than touching an
    /// existing file.
    pub fn create(dir: &Path, id: JobId) -> io::Result<Self> {
        let path = dir.join(format!("{id}.log"));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self {
            id,
            path,
            state: Mutex::new(LogState {
                lines: Vec::new(),
                file,
                committed: 0,
                status: JobStatus::Pending,
            }),
            changed: Notify::new(),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Number of durably written lines.
    pub fn len(&self) -> usize {
        self.state.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one timestamped line.
    ///
    /// Line breaks inside `message` are flattened to spaces so that one
    /// append is always exactly one line of the file.
    pub fn append(&self, message: &str) -> io::Result<()> {
        let entry = format_log_line(&message.replace(['\r', '\n'], " "));
        {
            let mut state = self.state.lock();
            let record = format!("{entry}\n");
            let committed = state.committed;
            if let Err(e) = write_record(&mut state.file, committed, record.as_bytes()) {
                // Drop any fragment; the next append starts at `committed` anyway.
                if let Err(trim) = state.file.set_len(committed) {
                    tracing::warn!(job_id = %self.id, error = %trim, "failed to trim partial log line");
                }
                return Err(e);
            }
            state.committed += record.len() as u64;
            state.lines.push(entry);
        }
        self.changed.notify_waiters();
        Ok(())
    }

    /// Move to `next` if the transition is legal. Returns whether it moved.
    pub fn set_status(&self, next: JobStatus) -> bool {
        let moved = {
            let mut state = self.state.lock();
            if state.status.can_transition_to(next) {
                state.status = next;
                true
            } else {
                false
            }
        };
        if moved {
            self.changed.notify_waiters();
        } else {
            tracing::warn!(job_id = %self.id, to = %next, "ignored illegal status transition");
        }
        moved
    }

    /// Record an unexpected failure and force the job to `Failed` unless it
    /// already reached a terminal status.
    pub fn fail_unexpectedly(&self, reason: &str) {
        if self.status().is_terminal() {
            return;
        }
        if let Err(e) = self.append(&format!("Unexpected failure: {reason}")) {
            tracing::error!(job_id = %self.id, error = %e, "failed to persist log line");
        }
        self.set_status(JobStatus::Failed);
    }

    /// Every line at position `>= offset`, read back from the file.
    ///
    /// `offset` is clamped to the current length, so `next_index` never
    /// points past the end of the log.
    pub fn read_from(&self, offset: usize) -> Result<LogChunk, CoreError> {
        let (durable, status) = {
            let state = self.state.lock();
            (state.lines.len(), state.status)
        };

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CoreError::job_not_found(self.id));
            }
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = contents.lines().take(durable).collect();
        let start = offset.min(lines.len());
        let logs: Vec<String> = lines[start..].iter().map(|l| l.to_string()).collect();
        let next_index = start + logs.len();

        Ok(LogChunk {
            logs,
            next_index,
            status,
        })
    }

    /// Future that resolves on the next append or status change.
    ///
    /// Call [`Notified::enable`] on it before reading to avoid missing a
    /// change that lands between the read and the wait.
    pub fn changed(&self) -> Notified<'_> {
        self.changed.notified()
    }
}

/// Write `record` at byte `offset`, overwriting whatever a failed earlier
/// write left there.
fn write_record<W: Write + Seek>(out: &mut W, offset: u64, record: &[u8]) -> io::Result<()> {
    out.seek(SeekFrom::Start(offset))?;
    out.write_all(record)?;
    out.flush()
}

impl std::fmt::Debug for JobLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLog")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("status", &self.status())
            .finish()
    }
}
