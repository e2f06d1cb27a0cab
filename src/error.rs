use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: reqwest::StatusCode },
    #[error("invalid JSON payload: {message}")]
    Json { message: String },
    #[error("cannot build endpoint URL for {path}")]
    InvalidUrl {
        path: &'static str,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification backend failed")]
    Backend,
    #[error("invalid notification payload: {0}")]
    InvalidPayload(String),
    #[error("badge update failed for {path}")]
    Badge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for ApiError {
    fn from(source: reqwest::Error) -> Self {
        if source.is_status() {
            if let Some(status) = source.status() {
                return Self::HttpStatus { status };
            }
        }
        Self::Request { source }
    }
}

impl Error {
    /// Erreurs qui ne concernent qu'un cycle de poll : le tick suivant réessaie.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::Request { .. } | ApiError::HttpStatus { .. } | ApiError::Json { .. })
        )
    }
}
