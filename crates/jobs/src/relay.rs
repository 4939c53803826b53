//! Line-buffered relay from drone progress output into a job log.

use std::io::{self, Write};
use std::sync::Arc;

use crate::store::JobLog;

/// Buffers written bytes until a full line is seen, then appends it.
///
/// Lines are right-trimmed and blank lines are dropped. Whatever is left in
/// the buffer is flushed as a final line by [`LineRelay::finish`] or on drop.
pub struct LineRelay {
    log: Arc<JobLog>,
    buffer: Vec<u8>,
}

impl LineRelay {
    pub fn new(log: Arc<JobLog>) -> Self {
        Self {
            log,
            buffer: Vec::new(),
        }
    }

    /// Flush a trailing partial line, if any.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rest = std::mem::take(&mut self.buffer);
        self.emit(&rest)
    }

    fn emit(&self, raw: &[u8]) -> io::Result<()> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim_end();
        if line.trim().is_empty() {
            return Ok(());
        }
        tracing::debug!(job_id = %self.log.id(), "{line}");
        self.log.append(line)
    }
}

impl Write for LineRelay {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.emit(&line[..pos])?;
        }
        Ok(buf.len())
    }

    /// Complete lines are already relayed on write; partial lines wait for
    /// their terminator or for [`LineRelay::finish`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineRelay {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::error!(job_id = %self.log.id(), error = %e, "failed to flush relayed output");
        }
    }
}
