//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/gotray/config.toml` by default:
//!
//! ```toml
//! endpoints = [
//!     "[Home]wss://push.example.org/stream?token=abc",
//! ]
//! notify_timeout = "30s"
//! silent_duration = "10m"
//! ignore_tls_errors = false
//!
//! [notifications]
//! app_name = "gotray"
//!
//! [logging]
//! format = "compact"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use gotray_core::{EndpointConfig, TracingOutputFormat, parse_label};
use gotray_server::{ManagerConfig, NotifyConfig};

use crate::error::{ClientError, ClientResult};

/// Configuration for gotray.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint lines, optionally prefixed with `[Display Name]`.
    pub endpoints: Vec<String>,

    /// How long notifications stay visible (`30s`, `2m`, ...).
    pub notify_timeout: String,

    /// How long `silence` mutes notifications (`10m`, `1h`, ...).
    pub silent_duration: String,

    /// Skip TLS certificate validation for every endpoint.
    pub ignore_tls_errors: bool,

    /// Notification settings.
    pub notifications: NotificationSettings,

    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            notify_timeout: "30s".to_string(),
            silent_duration: "10m".to_string(),
            ignore_tls_errors: false,
            notifications: NotificationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Application name used when an endpoint has no display name.
    pub app_name: String,

    /// Custom notification icon path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_path: Option<String>,

    /// Urgency override ("low", "normal", "critical").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            app_name: "gotray".to_string(),
            icon_path: None,
            urgency: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Daemon log format: `pretty`, `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Loads configuration, writing a default file first if none exists.
    pub fn load_or_create(path: &Path) -> ClientResult<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        config.save_to(path)?;
        info!(path = %path.display(), "Config created with defaults");
        Ok(config)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ClientResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serializes the configuration as pretty TOML.
    pub fn to_toml(&self) -> ClientResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gotray")
    }

    /// Parses the endpoint lines, skipping blank ones.
    pub fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        EndpointConfig::parse_all(&self.endpoints)
    }

    /// Parsed daemon log format.
    pub fn log_format(&self) -> ClientResult<TracingOutputFormat> {
        Ok(self.logging.format.parse()?)
    }

    /// Builds the manager configuration.
    pub fn to_manager_config(&self) -> ClientResult<ManagerConfig> {
        let notify_timeout = parse_label(&self.notify_timeout)
            .map_err(|e| ClientError::Config(format!("notify_timeout: {}", e)))?;
        let silent_duration = parse_label(&self.silent_duration)
            .map_err(|e| ClientError::Config(format!("silent_duration: {}", e)))?;

        Ok(ManagerConfig::new(self.endpoint_configs())
            .with_notify_timeout(notify_timeout)
            .with_silent_duration(silent_duration)
            .with_ignore_tls_errors(self.ignore_tls_errors))
    }

    /// Builds the desktop notifier configuration.
    pub fn notify_config(&self) -> NotifyConfig {
        let mut config = NotifyConfig::default().with_app_name(&self.notifications.app_name);
        if let Some(ref icon) = self.notifications.icon_path {
            config = config.with_icon_path(icon);
        }
        if let Some(ref urgency) = self.notifications.urgency {
            config = config.with_urgency(urgency);
        }
        config
    }

    /// Checks every setting, returning one message per problem.
    ///
    /// Endpoints without a token are reported too; the daemon only warns
    /// about them since the server decides whether they are valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if let Err(e) = parse_label(&self.notify_timeout) {
            problems.push(format!("notify_timeout: {}", e));
        }
        if let Err(e) = parse_label(&self.silent_duration) {
            problems.push(format!("silent_duration: {}", e));
        }
        if let Err(e) = self.log_format() {
            problems.push(format!("logging.format: {}", e));
        }

        for endpoint in self.endpoint_configs() {
            match Url::parse(&endpoint.address) {
                Ok(url) if matches!(url.scheme(), "ws" | "wss") => {
                    if endpoint.token().is_none() {
                        problems.push(format!(
                            "endpoint {:?}: missing 'token' query parameter",
                            endpoint.display_name
                        ));
                    }
                }
                Ok(url) => problems.push(format!(
                    "endpoint {:?}: unsupported scheme {:?} (expected ws or wss)",
                    endpoint.display_name,
                    url.scheme()
                )),
                Err(e) => problems.push(format!(
                    "endpoint {:?}: invalid address: {}",
                    endpoint.display_name, e
                )),
            }
        }

        problems
    }
}
