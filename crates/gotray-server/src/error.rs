//! Server error types.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
///
/// Connection failures never show up here: workers turn them into registry
/// state and retry.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (pid file, status file, etc.).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error while reading or writing the status file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server is already running.
    #[error("Server is already running (PID file exists: {path})")]
    AlreadyRunning { path: String },

    /// No running server could be found.
    #[error("Server is not running (no live PID in {path})")]
    NotRunning { path: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an already running error.
    pub fn already_running(path: impl Into<String>) -> Self {
        Self::AlreadyRunning { path: path.into() }
    }

    /// Creates a not running error.
    pub fn not_running(path: impl Into<String>) -> Self {
        Self::NotRunning { path: path.into() }
    }
}
