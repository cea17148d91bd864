//! Connection health aggregation and rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of offline endpoints listed in a summary.
const MAX_OFFLINE_LISTED: usize = 10;

/// Maximum length of a rendered failure reason.
const MAX_REASON_LEN: usize = 120;

/// Connection state of one endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub address: String,
    pub online: bool,
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// Creates an offline entry with no error.
    pub fn offline(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            online: false,
            last_error: None,
        }
    }
}

/// Aggregate health over every tracked endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Every endpoint is online.
    Ok,
    /// At least one endpoint is online, at least one is not.
    Partial,
    /// No endpoint is online, or none is configured.
    Down,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Partial => write!(f, "partial"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Aggregates online flags. An empty set counts as down.
pub fn aggregate(online: &[bool]) -> Health {
    if online.is_empty() {
        return Health::Down;
    }
    if online.iter().all(|&o| o) {
        Health::Ok
    } else if online.iter().any(|&o| o) {
        Health::Partial
    } else {
        Health::Down
    }
}

/// Aggregates a registry snapshot.
pub fn aggregate_states(states: &[ConnectionState]) -> Health {
    let flags: Vec<bool> = states.iter().map(|s| s.online).collect();
    aggregate(&flags)
}

/// A human-readable summary of a registry snapshot.
#[derive(Debug, Clone)]
pub struct HealthSummary<'a> {
    states: &'a [ConnectionState],
}

impl<'a> HealthSummary<'a> {
    pub fn new(states: &'a [ConnectionState]) -> Self {
        Self { states }
    }

    pub fn health(&self) -> Health {
        aggregate_states(self.states)
    }

    pub fn online_count(&self) -> usize {
        self.states.iter().filter(|s| s.online).count()
    }

    /// Renders the summary as multi-line text.
    pub fn render(&self) -> String {
        let mut lines = vec![format!(
            "{}/{} connections online",
            self.online_count(),
            self.states.len()
        )];

        let offline: Vec<&ConnectionState> = self.states.iter().filter(|s| !s.online).collect();
        if !offline.is_empty() {
            lines.push("offline:".to_string());
            for state in offline.iter().take(MAX_OFFLINE_LISTED) {
                lines.push(format!("  - {}", state.address));
                if let Some(ref reason) = state.last_error {
                    lines.push(format!("      reason: {}", truncate_reason(reason)));
                }
            }
            if offline.len() > MAX_OFFLINE_LISTED {
                lines.push("  ...".to_string());
            }
        }

        lines.join("\n")
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_REASON_LEN {
        return reason.to_string();
    }
    let kept: String = reason.chars().take(MAX_REASON_LEN - 3).collect();
    format!("{}...", kept)
}
