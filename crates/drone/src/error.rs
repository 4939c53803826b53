/// Failure of a single drone action. Always fatal for the step that raised it.
#[derive(Debug, thiserror::Error)]
pub enum DroneError {
    /// A required parameter was absent.
    #[error("'{action}' requires parameter '{param}'")]
    MissingParam { action: String, param: String },

    /// A parameter could not be coerced to a number.
    #[error("'{action}' parameter '{param}' is not a number: {value}")]
    NotANumber {
        action: String,
        param: String,
        value: String,
    },

    /// The computed wait was negative, infinite or NaN (e.g. zero speed).
    #[error("'{action}' produced an invalid duration of {seconds} seconds")]
    InvalidDuration { action: String, seconds: f64 },

    /// Writing a progress line failed.
    #[error("progress output failed: {0}")]
    Progress(#[from] std::io::Error),
}
