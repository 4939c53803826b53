use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dronevox_drone::DroneConfig;
use dronevox_jobs::{JobsConfig, UnknownActionPolicy};
use dronevox_planner::{GeminiConfig, WhisperConfig};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. The planner and
/// the transcriber are only enabled when their API keys are set.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Does not bound how
    /// long an SSE stream stays open.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs to finish (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub jobs: JobsConfig,
    pub drone: DroneConfig,
    pub planner: Option<GeminiConfig>,
    pub transcription: Option<WhisperConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                          |
    /// |---------------------------|--------------------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                                        |
    /// | `PORT`                    | `3000`                                           |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`                          |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                             |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                                             |
    /// | `COMMAND_LOG_DIR`         | `command_logs`                                   |
    /// | `COMMAND_HISTORY_DIR`     | `command_history`                                |
    /// | `STREAM_POLL_INTERVAL_MS` | `1000`                                           |
    /// | `UNKNOWN_ACTION_POLICY`   | `skip`                                           |
    /// | `DRONE_DEFAULT_SPEED`     | `30`                                             |
    /// | `DRONE_ROTATION_SPEED`    | `90`                                             |
    /// | `GOOGLE_API_KEY`          | unset (planner disabled)                         |
    /// | `GENAI_MODEL`             | `gemini-2.5-flash`                               |
    /// | `PROMPT_PATH`             | unset (built-in prompt)                          |
    /// | `WHISPER_API_URL`         | `https://api.openai.com/v1/audio/transcriptions` |
    /// | `WHISPER_API_KEY`         | unset (transcription disabled)                   |
    /// | `WHISPER_MODEL`           | `whisper-1`                                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("PORT", "3000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "30");
        let shutdown_timeout_secs: u64 = parse_var("SHUTDOWN_TIMEOUT_SECS", "30");

        let jobs = JobsConfig {
            log_dir: PathBuf::from(var_or("COMMAND_LOG_DIR", "command_logs")),
            history_dir: PathBuf::from(var_or("COMMAND_HISTORY_DIR", "command_history")),
            poll_interval: Duration::from_millis(parse_var("STREAM_POLL_INTERVAL_MS", "1000")),
            unknown_action_policy: parse_var::<UnknownActionPolicy>("UNKNOWN_ACTION_POLICY", "skip"),
        };

        let drone = DroneConfig {
            default_speed: parse_positive("DRONE_DEFAULT_SPEED", "30"),
            rotation_speed: parse_positive("DRONE_ROTATION_SPEED", "90"),
        };

        let planner = non_empty_var("GOOGLE_API_KEY").map(|key| {
            let mut config = GeminiConfig::new(key);
            if let Some(model) = non_empty_var("GENAI_MODEL") {
                config.model = model;
            }
            config.prompt_path = non_empty_var("PROMPT_PATH").map(PathBuf::from);
            config
        });

        let transcription = non_empty_var("WHISPER_API_KEY").map(|key| {
            let mut config = WhisperConfig::new(key);
            if let Some(url) = non_empty_var("WHISPER_API_URL") {
                config.api_url = url;
            }
            if let Some(model) = non_empty_var("WHISPER_MODEL") {
                config.model = model;
            }
            config
        });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jobs,
            drone,
            planner,
            transcription,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: Display,
{
    var_or(name, default)
        .parse()
        .unwrap_or_else(|e| panic!("{name} is invalid: {e}"))
}

fn parse_positive(name: &str, default: &str) -> f64 {
    let value: f64 = parse_var(name, default);
    assert!(
        value.is_finite() && value > 0.0,
        "{name} must be a positive number"
    );
    value
}
