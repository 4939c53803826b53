//! Live log subscription.
//!
//! A stream re-reads the log from its cursor, emits every new line, and
//! waits for the next append (or the poll interval, whichever comes first)
//! until the job is terminal. It then emits the status once and ends.
//! [`JobService::begin_shutdown`] ends every open stream early.

use std::collections::VecDeque;
use std::sync::Arc;

use dronevox_core::{CoreError, JobStatus};
use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::service::JobService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One log line, in log order.
    Line(String),
    /// The job reached this terminal status; nothing follows.
    Status(JobStatus),
    /// The job is unknown (or vanished); nothing follows.
    NotFound,
    /// Reading the log failed for another reason; nothing follows. The
    /// cause is logged server-side only.
    ReadFailed,
    /// The service is shutting down; nothing follows.
    Closing,
}

struct StreamState {
    service: Arc<JobService>,
    job_id: String,
    cursor: usize,
    pending: VecDeque<StreamEvent>,
    done: bool,
    closing: watch::Receiver<bool>,
}

impl StreamState {
    async fn poll(&mut self) {
        if *self.closing.borrow() {
            tracing::info!(job_id = %self.job_id, "job stream closed for shutdown");
            self.finish_with(StreamEvent::Closing);
            return;
        }

        let log = match self.service.lookup(&self.job_id) {
            Ok(log) => log,
            Err(_) => {
                self.finish_with(StreamEvent::NotFound);
                return;
            }
        };

        let changed = log.changed();
        tokio::pin!(changed);
        changed.as_mut().enable();

        let chunk = match log.read_from(self.cursor) {
            Ok(chunk) => chunk,
            Err(CoreError::NotFound { .. }) => {
                self.finish_with(StreamEvent::NotFound);
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "job stream read failed");
                self.finish_with(StreamEvent::ReadFailed);
                return;
            }
        };

        let fresh = !chunk.logs.is_empty();
        if fresh {
            tracing::debug!(
                job_id = %self.job_id,
                lines = chunk.logs.len(),
                next_index = chunk.next_index,
                "job stream chunk",
            );
            self.pending
                .extend(chunk.logs.into_iter().map(StreamEvent::Line));
            self.cursor = chunk.next_index;
        }

        if chunk.status.is_terminal() {
            tracing::info!(job_id = %self.job_id, status = %chunk.status, "job stream end");
            self.pending.push_back(StreamEvent::Status(chunk.status));
            self.done = true;
            return;
        }

        if !fresh {
            tokio::select! {
                () = &mut changed => {}
                () = tokio::time::sleep(self.service.config().poll_interval) => {}
                _ = self.closing.changed() => {}
            }
        }
    }

    fn finish_with(&mut self, event: StreamEvent) {
        if event == StreamEvent::NotFound {
            tracing::info!(job_id = %self.job_id, "job stream missing");
        }
        self.pending.push_back(event);
        self.done = true;
    }
}

impl JobService {
    /// Follow `job_id` from line `from` until it reaches a terminal status.
    ///
    /// The stream is finite and not restartable; a reconnecting client opens
    /// a new one with its own cursor. Dropping it has no effect on the job,
    /// and neither does a shutdown ending it.
    pub fn stream_logs(
        self: &Arc<Self>,
        job_id: &str,
        from: usize,
    ) -> impl Stream<Item = StreamEvent> + Send + 'static {
        tracing::info!(job_id, from, "job stream begin");
        let state = StreamState {
            service: Arc::clone(self),
            job_id: job_id.to_string(),
            cursor: from,
            pending: VecDeque::new(),
            done: false,
            closing: self.closing(),
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Some((event, state));
                }
                if state.done {
                    return None;
                }
                state.poll().await;
            }
        })
    }
}
