//! Persisted copies of submitted command payloads, one JSON file per job.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dronevox_core::JobId;

/// Write `payload` as pretty-printed JSON to `<dir>/<job_id>.json`.
pub fn save_command_payload(
    dir: &Path,
    job_id: JobId,
    payload: &serde_json::Value,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{job_id}.json"));
    let text = serde_json::to_string_pretty(payload)?;
    fs::write(&path, text)?;
    Ok(path)
}
