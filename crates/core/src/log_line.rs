//! Formatting of persisted job log lines: `[HH:MM:SS] message`.

use chrono::{Local, NaiveTime};

/// Format `message` stamped with the current local wall-clock time.
pub fn format_log_line(message: &str) -> String {
    format_log_line_at(Local::now().time(), message)
}

/// Format `message` stamped with an explicit time of day.
pub fn format_log_line_at(time: NaiveTime, message: &str) -> String {
    format!("[{}] {message}", time.format("%H:%M:%S"))
}
