//! Reconnect delays and failure classification.
//!
//! Every failed or closed connection waits `default_delay` before the next
//! attempt. A failure classified as unauthorized waits `unauthorized_delay`
//! instead, for the next attempt only; the delay drops back once a cycle
//! ends without an authorization failure.

use std::fmt;
use std::time::Duration;

/// HTTP status returned by push servers for a bad or missing token.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// How a connection failure affects the reconnect delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure, handshake failure, abrupt close.
    Transport,
    /// The server explicitly rejected the credentials.
    Unauthorized,
}

impl FailureKind {
    /// Classifies a failure by its HTTP-style status code.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(STATUS_UNAUTHORIZED) => Self::Unauthorized,
            _ => Self::Transport,
        }
    }
}

/// A connection failure reduced to what the registry and backoff need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFailure {
    /// HTTP status of a rejected handshake, if any.
    pub status: Option<u16>,
    /// Description of the underlying error.
    pub message: String,
}

impl ConnectFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A failure without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::from_status(self.status)
    }

    /// Short one-line summary stored as the registry's last error.
    pub fn summary(&self) -> String {
        match self.status {
            Some(status) => format!("status={} error={}", status, self.message),
            None => format!("status=none error={}", self.message),
        }
    }
}

impl fmt::Display for ConnectFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Reconnect delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after a close or a transport failure.
    pub default_delay: Duration,
    /// Delay after an authorization failure.
    pub unauthorized_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(10),
            unauthorized_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(default_delay: Duration, unauthorized_delay: Duration) -> Self {
        Self {
            default_delay,
            unauthorized_delay,
        }
    }

    /// Returns the delay before the next attempt, given the failure
    /// that ended the last cycle, if any.
    pub fn delay_after(&self, failure: Option<FailureKind>) -> Duration {
        match failure {
            Some(FailureKind::Unauthorized) => self.unauthorized_delay,
            Some(FailureKind::Transport) | None => self.default_delay,
        }
    }
}
