//! Desktop notifications for pushed messages.
//!
//! Workers hand every decoded, unmuted message to a [`Notifier`]. Dispatch is
//! fire-and-forget: the desktop notifier shows the popup on the blocking pool
//! so a slow notification daemon never stalls a connection.

use std::time::Duration;

use notify_rust::Notification as DesktopNotification;
#[cfg(target_os = "linux")]
use notify_rust::Urgency;
use tracing::{debug, error};

/// One notification to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Display name of the endpoint the message came from.
    pub source: String,
    /// How long the popup stays visible.
    pub timeout: Duration,
}

/// Receives notifications from workers.
pub trait Notifier: Send + Sync {
    /// Dispatches a notification. Must not block beyond handing it off.
    fn notify(&self, notification: Notification);
}

/// Configuration for the desktop notifier.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Application name used when the endpoint has no display name.
    pub app_name: String,
    /// Urgency override ("low", "normal", "critical").
    pub urgency: Option<String>,
    /// Custom notification icon path.
    pub icon_path: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            app_name: "gotray".to_string(),
            urgency: None,
            icon_path: None,
        }
    }
}

impl NotifyConfig {
    /// Builder: set app name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Builder: set urgency override.
    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = Some(urgency.into());
        self
    }

    /// Builder: set icon path.
    pub fn with_icon_path(mut self, path: impl Into<String>) -> Self {
        self.icon_path = Some(path.into());
        self
    }
}

/// Shows notifications through the platform notification service.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier {
    config: NotifyConfig,
}

impl DesktopNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    fn build(&self, notification: &Notification) -> DesktopNotification {
        let app_name = if notification.source.is_empty() {
            self.config.app_name.as_str()
        } else {
            notification.source.as_str()
        };

        let mut popup = DesktopNotification::new();
        popup
            .appname(app_name)
            .summary(&notification.title)
            .body(&notification.body)
            .timeout(notification.timeout);

        if let Some(ref icon) = self.config.icon_path {
            popup.icon(icon);
        }

        #[cfg(target_os = "linux")]
        if let Some(ref urgency) = self.config.urgency {
            popup.urgency(parse_urgency(urgency));
        }

        popup
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: Notification) {
        let popup = self.build(&notification);
        let show = move || match popup.show() {
            Ok(_) => debug!(
                title = %notification.title,
                source = %notification.source,
                "Notification sent"
            ),
            Err(e) => error!(
                error = %e,
                title = %notification.title,
                source = %notification.source,
                "Failed to send notification"
            ),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(show);
            }
            Err(_) => show(),
        }
    }
}

/// Parses an urgency string into a notify-rust Urgency value.
#[cfg(target_os = "linux")]
fn parse_urgency(s: &str) -> Urgency {
    match s.to_lowercase().as_str() {
        "low" => Urgency::Low,
        "critical" => Urgency::Critical,
        _ => Urgency::Normal,
    }
}

/// Notifier that remembers every notification, for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
