//! Client error types.

use thiserror::Error;

use gotray_core::TracingError;
use gotray_server::ServerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the daemon internals (pid file, status file, ...).
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The daemon is in an unexpected state.
    #[error("daemon error: {0}")]
    Daemon(String),
}

impl From<TracingError> for ClientError {
    fn from(err: TracingError) -> Self {
        Self::Config(err.to_string())
    }
}
