//! Worker set orchestration.
//!
//! The manager owns the live worker set. A restart replaces it wholesale:
//! the old set is cancelled, the registry is rebuilt from the new endpoint
//! list, and one fresh worker is spawned per distinct address. Old workers
//! are not awaited; their generation is stale the moment the registry is
//! reset, so nothing they do afterwards is visible.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ManagerConfig;
use crate::mute::MuteWindow;
use crate::notify::Notifier;
use crate::registry::{Generation, Registry};
use crate::transport::Transport;
use crate::worker::{Worker, WorkerContext};

/// How long shutdown waits for workers before aborting them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// One generation of running workers.
struct WorkerSet {
    generation: Generation,
    cancel: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerSet {
    fn cancel(&self) {
        // Receivers may already be gone if every worker has exited.
        let _ = self.cancel.send(true);
    }
}

/// Starts, restarts and stops connection workers.
pub struct Manager {
    registry: Registry,
    mute: MuteWindow,
    notifier: Arc<dyn Notifier>,
    transport: Arc<dyn Transport>,
    config: ManagerConfig,
    workers: Option<WorkerSet>,
}

impl Manager {
    /// Creates a manager with no running workers.
    pub fn new(notifier: Arc<dyn Notifier>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: Registry::new(),
            mute: MuteWindow::new(),
            notifier,
            transport,
            config: ManagerConfig::default(),
            workers: None,
        }
    }

    /// Builder: use the given mute window instead of a fresh one.
    pub fn with_mute_window(mut self, mute: MuteWindow) -> Self {
        self.mute = mute;
        self
    }

    /// Replaces the worker set with one built from `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn restart(&mut self, config: ManagerConfig) {
        if let Some(old) = self.workers.take() {
            debug!(generation = old.generation, "Cancelling previous workers");
            old.cancel();
        }

        let mut seen = HashSet::new();
        let endpoints: Vec<_> = config
            .endpoints
            .iter()
            .filter(|endpoint| {
                if endpoint.address.is_empty() {
                    warn!(endpoint = %endpoint.display_name, "Empty address, ignoring");
                    return false;
                }
                let fresh = seen.insert(endpoint.address.clone());
                if !fresh {
                    warn!(
                        endpoint = %endpoint.display_name,
                        address = %endpoint.address,
                        "Duplicate address, ignoring"
                    );
                }
                fresh
            })
            .cloned()
            .collect();

        let generation = self
            .registry
            .reset(endpoints.iter().map(|endpoint| endpoint.address.as_str()));

        let ctx = WorkerContext {
            registry: self.registry.clone(),
            mute: self.mute.clone(),
            notifier: self.notifier.clone(),
            transport: self.transport.clone(),
            backoff: config.backoff,
            notify_timeout: config.notify_timeout,
            ignore_tls_errors: config.ignore_tls_errors,
        };

        let (cancel, cancel_rx) = watch::channel(false);
        let handles = endpoints
            .into_iter()
            .map(|endpoint| {
                let worker = Worker::new(endpoint, ctx.clone(), generation, cancel_rx.clone());
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();

        info!(
            generation = generation,
            endpoints = handles.len(),
            "Connection workers started"
        );

        self.config = config;
        self.workers = Some(WorkerSet {
            generation,
            cancel,
            handles,
        });
    }

    /// Mutes notifications for the configured silence duration.
    pub fn silence(&self) -> DateTime<Utc> {
        self.mute.silence(self.config.silent_duration)
    }

    /// Ends the mute window.
    pub fn unsilence(&self) {
        self.mute.unsilence();
    }

    /// Stops every worker and waits for them to exit, up to a bound.
    ///
    /// Afterwards every registry entry is offline.
    pub async fn shutdown(&mut self) {
        if let Some(set) = self.workers.take() {
            set.cancel();
            let count = set.handles.len();
            let mut handles = set.handles;
            let join_all = async {
                for handle in handles.iter_mut() {
                    let _ = handle.await;
                }
            };
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all).await.is_err() {
                warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Workers did not stop in time, aborting"
                );
                for handle in &handles {
                    handle.abort();
                }
            }
            info!(workers = count, "Connection workers stopped");
        }
        self.registry.mark_all_offline();
    }

    /// The shared registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The shared mute window.
    pub fn mute(&self) -> &MuteWindow {
        &self.mute
    }

    /// The configuration of the current worker set.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Number of running workers.
    pub fn worker_count(&self) -> usize {
        self.workers.as_ref().map_or(0, |set| set.handles.len())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Some(set) = self.workers.take() {
            set.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mute::ManualClock;
    use crate::notify::RecordingNotifier;
    use crate::worker::tests::{Script, ScriptedTransport};
    use gotray_core::{EndpointConfig, Health};

    fn config(lines: &[&str]) -> ManagerConfig {
        ManagerConfig::new(EndpointConfig::parse_all(lines))
    }

    fn manager(opens: usize) -> (Manager, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(vec![Script::Open(vec![]); opens]);
        let manager = Manager::new(Arc::new(RecordingNotifier::default()), transport.clone())
            .with_mute_window(MuteWindow::with_clock(ManualClock::new()));
        (manager, transport)
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn addresses(manager: &Manager) -> Vec<String> {
        manager
            .registry()
            .snapshot()
            .into_iter()
            .map(|state| state.address)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn restart_starts_one_worker_per_endpoint() {
        let (mut manager, _) = manager(2);
        manager.restart(config(&["[A]ws://a/?token=1", "[B]ws://b/?token=2"]));
        assert_eq!(manager.worker_count(), 2);
        settle().await;

        assert_eq!(manager.registry().health(), Health::Ok);
        manager.shutdown().await;
        assert_eq!(manager.registry().health(), Health::Down);
        assert_eq!(manager.worker_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_registry_keys() {
        let (mut manager, _) = manager(4);
        manager.restart(config(&["ws://a/?token=1", "ws://b/?token=2"]));
        settle().await;
        assert_eq!(addresses(&manager), vec!["ws://a/?token=1", "ws://b/?token=2"]);

        manager.restart(config(&["ws://b/?token=2", "ws://c/?token=3"]));
        settle().await;
        assert_eq!(addresses(&manager), vec!["ws://b/?token=2", "ws://c/?token=3"]);
        assert_eq!(manager.registry().health(), Health::Ok);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_workers_do_not_touch_new_registry() {
        let (mut manager, transport) = manager(1);
        manager.restart(config(&["ws://a/?token=1"]));
        settle().await;
        assert!(manager.registry().get("ws://a/?token=1").unwrap().online);

        // The new worker fails on connect. The old worker's exit write
        // belongs to a stale generation and must not clear that error.
        manager.restart(config(&["ws://a/?token=1"]));
        settle().await;
        let state = manager.registry().get("ws://a/?token=1").unwrap();
        assert!(!state.online);
        assert_eq!(
            state.last_error.as_deref(),
            Some("status=none error=script exhausted")
        );
        assert_eq!(transport.attempts().len(), 2);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_without_address_are_skipped() {
        let (mut manager, transport) = manager(1);
        manager.restart(config(&["[Empty]", "[Home]ws://a/?token=1", "[Blank]   "]));
        assert_eq!(manager.worker_count(), 1);
        settle().await;

        assert_eq!(addresses(&manager), vec!["ws://a/?token=1"]);
        assert_eq!(manager.registry().health(), Health::Ok);
        assert_eq!(transport.attempts().len(), 1);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_addresses_get_one_worker() {
        let (mut manager, _) = manager(2);
        manager.restart(config(&["[One]ws://a/?token=1", "[Two]ws://a/?token=1"]));
        assert_eq!(manager.worker_count(), 1);
        assert_eq!(manager.registry().len(), 1);
        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_restart_is_down() {
        let (mut manager, transport) = manager(0);
        manager.restart(ManagerConfig::default());
        settle().await;
        assert!(manager.registry().is_empty());
        assert_eq!(manager.registry().health(), Health::Down);
        assert!(transport.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_uses_configured_duration() {
        let (mut manager, _) = manager(0);
        manager.restart(ManagerConfig::default().with_silent_duration(Duration::from_secs(90)));
        let until = manager.silence();
        assert!(manager.mute().is_muted());
        assert_eq!(manager.mute().muted_until(), Some(until));

        manager.unsilence();
        assert!(!manager.mute().is_muted());
    }
}
