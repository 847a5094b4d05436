use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("Scheduler Error: {0}")]
    Scheduler(String),
    #[error("UI Error: {0}")]
    Ui(String),
}

// Capture Error Type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("The capture stream has no decoded frame yet.")]
    NotReady,
    #[error("The requested constraint was rejected: {0}")]
    ConstraintRejected(String),
    #[error("Failed to decode frame: {0}")]
    Decode(String),
    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

// Outcome of a single submit that did not produce a result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("Server busy, backing off")]
    RateLimited,
    #[error("Predict error {0}")]
    ServerError(u16),
    #[error("Network error {0}")]
    NetworkFailure(String),
}

impl From<reqwest::Error> for SubmitError {
    fn from(error: reqwest::Error) -> Self {
        SubmitError::NetworkFailure(error.to_string())
    }
}
