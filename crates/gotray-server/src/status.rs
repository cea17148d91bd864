//! Status file health reporter.
//!
//! The daemon has no socket; instead a reporter task polls the registry and
//! publishes a JSON snapshot to a well-known runtime path, which `gotray
//! status` reads back. The file is replaced atomically, so readers never see
//! a half-written snapshot.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gotray_core::{ConnectionState, Health, HealthSummary, aggregate_states};

use crate::config::runtime_path;
use crate::error::ServerResult;
use crate::mute::MuteWindow;
use crate::registry::Registry;
use crate::signals::ShutdownSignal;

/// Default time between registry polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot written by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFile {
    pub health: Health,
    pub generated_at: DateTime<Utc>,
    /// End of the mute window, if notifications are muted.
    pub muted_until: Option<DateTime<Utc>>,
    /// Pid of the daemon that wrote the file.
    pub pid: u32,
    pub endpoints: Vec<ConnectionState>,
}

impl StatusFile {
    /// Captures the current registry and mute state.
    pub fn capture(registry: &Registry, mute: &MuteWindow) -> Self {
        let endpoints = registry.snapshot();
        Self {
            health: aggregate_states(&endpoints),
            generated_at: Utc::now(),
            muted_until: mute.muted_until(),
            pid: std::process::id(),
            endpoints,
        }
    }

    /// The tooltip-style summary of the endpoints.
    pub fn summary(&self) -> String {
        HealthSummary::new(&self.endpoints).render()
    }

    /// Writes the snapshot to `path` via a temporary file and a rename.
    pub fn write(&self, path: &Path) -> ServerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = tmp_path(path);
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads a snapshot previously written by [`StatusFile::write`].
    pub fn read(path: &Path) -> ServerResult<Self> {
        let contents = fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// True when two snapshots differ in anything but their timestamp.
    fn same_state(&self, other: &Self) -> bool {
        self.endpoints == other.endpoints && self.muted_until == other.muted_until
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Returns the default status file path.
///
/// Uses `$XDG_RUNTIME_DIR/gotray.status.json` if available,
/// otherwise falls back to `/tmp/gotray-$UID.status.json`.
pub fn default_status_path() -> PathBuf {
    runtime_path("status.json")
}

/// Polls the registry and keeps the status file current.
pub struct StatusReporter {
    registry: Registry,
    mute: MuteWindow,
    path: PathBuf,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(registry: Registry, mute: MuteWindow, path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            mute,
            path: path.into(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Builder: set poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs until `stop` fires, then removes the status file.
    pub async fn run(self, stop: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let stop = stop.wait();
        tokio::pin!(stop);

        let mut last: Option<StatusFile> = None;
        info!(path = %self.path.display(), "Status reporter started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let current = StatusFile::capture(&self.registry, &self.mute);
                    if last.as_ref().is_some_and(|prev| prev.same_state(&current)) {
                        continue;
                    }
                    if let Some(prev) = last.as_ref().filter(|prev| prev.health != current.health) {
                        info!(from = %prev.health, to = %current.health, "Health changed");
                    }
                    match current.write(&self.path) {
                        Ok(()) => debug!(health = %current.health, "Status file updated"),
                        Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to write status file"),
                    }
                    last = Some(current);
                }
                _ = &mut stop => break,
            }
        }

        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Status file not removed");
        }
        debug!("Status reporter stopped");
    }
}
