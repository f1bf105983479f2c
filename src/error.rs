use thiserror::Error;

/// Failures surfaced by the synchronization engine and its collaborators.
///
/// Cloneable so a failure can sit inside a slot's observable state next to
/// the last good value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Configuration IDs not set")]
    ConfigurationNotSet,

    #[error("Endpoint not set")]
    EndpointNotSet,

    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Parameter not found")]
    NotFound,

    #[error("Error: {code} - {message}")]
    ServerError { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Empty response body")]
    EmptyResponseBody,

    #[error("Local store error: {0}")]
    LocalStore(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter {0} has not been loaded yet")]
    NotLoaded(String),

    #[error("Parameter {0} has no content")]
    EmptyContent(String),

    #[error("Invalid preference: {0}")]
    InvalidPreference(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            SyncError::Transport(format!("malformed payload: {}", err))
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}
