use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ScorableError {
    /// Invalid or contradictory input, detected before any remote call.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The service answered with a non-2xx status.
    #[error("request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("no prompt tests were created")]
    NoJobsCreated,

    #[error("calibration failed for prompt '{prompt}' with model '{model}': {source}")]
    CalibrationFailed {
        prompt: String,
        model: String,
        #[source]
        source: Box<ScorableError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScorableError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Yaml(_) | Self::Json(_) => 2,
            Self::RequestFailed { .. }
            | Self::Network { .. }
            | Self::InvalidResponse { .. }
            | Self::NotFound { .. } => 3,
            Self::NoJobsCreated => 4,
            Self::CalibrationFailed { .. } => 5,
            Self::DeadlineExceeded { .. } => 6,
            Self::Io(_) => 7,
            Self::Cancelled => 130,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScorableError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

pub type ScorableResult<T> = Result<T, ScorableError>;
