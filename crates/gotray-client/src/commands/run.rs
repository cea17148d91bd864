//! Run command: the daemon in the foreground.
//!
//! This module wires the daemon components together:
//! - PID file (prevents duplicate instances, lets the CLI find us)
//! - Signal handler (shutdown, reload, silence, unsilence)
//! - Manager with the WebSocket transport and desktop notifier
//! - Status reporter (publishes connection health)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use gotray_core::format_label;
use gotray_server::{
    DesktopNotifier, Manager, PidFile, Signal, SignalHandler, StatusReporter, WsTransport,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Paths used by a running daemon.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub config: PathBuf,
    pub pid: PathBuf,
    pub status: PathBuf,
}

/// Runs the daemon until SIGTERM/SIGINT.
pub async fn run(paths: &DaemonPaths) -> ClientResult<()> {
    let config = ClientConfig::load_or_create(&paths.config)?;
    let manager_config = config.to_manager_config()?;
    if manager_config.endpoints.is_empty() {
        warn!(
            path = %paths.config.display(),
            "No endpoints configured; add them to the config file and run `gotray reload`"
        );
    }

    let _pid_file = PidFile::create(&paths.pid)?;

    let mut signals = SignalHandler::new();
    signals.spawn_listener()?;
    let mut control = signals
        .take_control()
        .ok_or_else(|| ClientError::Daemon("signal control channel already taken".into()))?;

    let notifier = Arc::new(DesktopNotifier::new(config.notify_config()));
    let transport = Arc::new(WsTransport::default());
    let mut manager = Manager::new(notifier, transport);

    info!(
        endpoints = manager_config.endpoints.len(),
        notify_timeout = %format_label(manager_config.notify_timeout),
        silent_duration = %format_label(manager_config.silent_duration),
        "Starting gotray"
    );
    manager.restart(manager_config);

    let reporter = StatusReporter::new(
        manager.registry().clone(),
        manager.mute().clone(),
        &paths.status,
    );
    let reporter_task = tokio::spawn(reporter.run(signals.shutdown()));

    let shutdown = signals.shutdown().wait();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            request = control.recv() => match request {
                Some(Signal::Reload) => reload(&mut manager, &paths.config),
                Some(Signal::Silence) => {
                    manager.silence();
                }
                Some(Signal::Unsilence) => manager.unsilence(),
                Some(Signal::Shutdown) | None => break,
            },
        }
    }

    info!("Shutting down...");
    manager.shutdown().await;
    signals.trigger_shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), reporter_task).await;

    info!("gotray stopped");
    Ok(())
}

/// Re-reads the configuration and restarts every worker. A broken file
/// keeps the current workers running.
fn reload(manager: &mut Manager, path: &Path) {
    let config = match ClientConfig::load_from(path).and_then(|c| c.to_manager_config()) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Reload failed, keeping current configuration");
            return;
        }
    };
    info!(endpoints = config.endpoints.len(), "Reloading configuration");
    manager.restart(config);
}
