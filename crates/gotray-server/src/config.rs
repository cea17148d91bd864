//! Daemon configuration.

use std::path::PathBuf;
use std::time::Duration;

use gotray_core::EndpointConfig;

use crate::backoff::BackoffPolicy;

/// Everything the manager needs to (re)build its worker set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Endpoints to connect to, in configuration order.
    pub endpoints: Vec<EndpointConfig>,

    /// How long notifications stay visible.
    pub notify_timeout: Duration,

    /// Length of the mute window opened by `silence`.
    pub silent_duration: Duration,

    /// Disable certificate validation for every endpoint.
    pub ignore_tls_errors: bool,

    /// Reconnect delays.
    pub backoff: BackoffPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            notify_timeout: Duration::from_secs(30),
            silent_duration: Duration::from_secs(10 * 60),
            ignore_tls_errors: false,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration for the given endpoints.
    pub fn new(endpoints: Vec<EndpointConfig>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    /// Builder: set notification timeout.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Builder: set silence duration.
    pub fn with_silent_duration(mut self, duration: Duration) -> Self {
        self.silent_duration = duration;
        self
    }

    /// Builder: set relaxed TLS.
    pub fn with_ignore_tls_errors(mut self, ignore: bool) -> Self {
        self.ignore_tls_errors = ignore;
        self
    }

    /// Builder: set backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Returns a path for a runtime file named `gotray.<suffix>`.
///
/// Uses `$XDG_RUNTIME_DIR` if available, otherwise falls back to
/// `/tmp/gotray-$UID.<suffix>`.
pub(crate) fn runtime_path(suffix: &str) -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join(format!("gotray.{}", suffix))
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/gotray-{}.{}", uid, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.notify_timeout, Duration::from_secs(30));
        assert_eq!(config.silent_duration, Duration::from_secs(600));
        assert!(!config.ignore_tls_errors);
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn custom_config() {
        let endpoints = EndpointConfig::parse_all(["[A]ws://a/stream?token=1", "ws://b"]);
        let config = ManagerConfig::new(endpoints.clone())
            .with_notify_timeout(Duration::from_secs(5))
            .with_silent_duration(Duration::from_secs(3600))
            .with_ignore_tls_errors(true)
            .with_backoff(BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(2)));

        assert_eq!(config.endpoints, endpoints);
        assert_eq!(config.notify_timeout, Duration::from_secs(5));
        assert_eq!(config.silent_duration, Duration::from_secs(3600));
        assert!(config.ignore_tls_errors);
        assert_eq!(config.backoff.unauthorized_delay, Duration::from_secs(2));
    }

    #[test]
    fn runtime_path_format() {
        let path = runtime_path("status.json");
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("gotray"));
        assert!(path_str.ends_with(".status.json"));
    }
}
