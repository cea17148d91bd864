//! Connection worker.
//!
//! One worker owns one endpoint for the lifetime of a worker set:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Backoff -> Connecting -> ...
//!                      \__________________/      \
//!                       failure or close          +-> Terminated (cancelled)
//! ```
//!
//! Cancellation is cooperative. The worker checks its cancel flag at every
//! loop boundary, and additionally races it against the connect, the receive
//! loop and the backoff sleep so a restart takes effect promptly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use gotray_core::{DecodedMessage, EndpointConfig};

use crate::backoff::{BackoffPolicy, FailureKind};
use crate::mute::MuteWindow;
use crate::notify::{Notification, Notifier};
use crate::registry::{Generation, Registry};
use crate::transport::{ConnectionEvent, Session, Transport};

/// Shared collaborators handed to every worker at spawn time.
#[derive(Clone)]
pub struct WorkerContext {
    pub registry: Registry,
    pub mute: MuteWindow,
    pub notifier: Arc<dyn Notifier>,
    pub transport: Arc<dyn Transport>,
    pub backoff: BackoffPolicy,
    /// Timeout passed to the notifier for every popup.
    pub notify_timeout: Duration,
    /// Disable certificate validation for this worker's endpoint.
    pub ignore_tls_errors: bool,
}

/// Outcome of one connect + receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    /// The connection ended; `failure` is what ended it, if anything.
    Ended { failure: Option<FailureKind> },
    /// Cancellation was observed mid-cycle.
    Cancelled,
}

/// Worker for a single endpoint.
pub struct Worker {
    endpoint: EndpointConfig,
    ctx: WorkerContext,
    generation: Generation,
    cancel: watch::Receiver<bool>,
}

impl Worker {
    /// Creates a worker. `cancel` flips to `true` when the worker set is
    /// replaced or shut down; a dropped sender counts as cancellation too.
    pub fn new(
        endpoint: EndpointConfig,
        ctx: WorkerContext,
        generation: Generation,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            endpoint,
            ctx,
            generation,
            cancel,
        }
    }

    /// Runs until cancelled.
    pub async fn run(mut self) {
        self.check_token();

        loop {
            if self.is_cancelled() {
                break;
            }

            let failure = match self.cycle().await {
                Cycle::Ended { failure } => failure,
                Cycle::Cancelled => break,
            };

            if self.is_cancelled() {
                break;
            }

            let delay = self.ctx.backoff.delay_after(failure);
            if failure == Some(FailureKind::Unauthorized) {
                warn!(
                    endpoint = %self.endpoint.display_name,
                    delay_secs = delay.as_secs(),
                    "Authorization failure, backing off longer"
                );
            }
            info!(
                endpoint = %self.endpoint.display_name,
                delay_secs = delay.as_secs(),
                "Reconnecting after delay"
            );

            let sleep = tokio::time::sleep(delay);
            tokio::select! {
                _ = sleep => {}
                _ = cancelled(&mut self.cancel) => break,
            }
        }

        self.ctx
            .registry
            .mark_offline(self.generation, &self.endpoint.address, None);
        info!(endpoint = %self.endpoint.display_name, "Worker stopped");
    }

    /// Logs a warning when the address carries no token. The server is the
    /// authority on validity, so the attempt proceeds anyway.
    fn check_token(&self) {
        if self.endpoint.token().is_none() {
            warn!(
                endpoint = %self.endpoint.display_name,
                address = %self.endpoint.address,
                "Missing 'token' query parameter"
            );
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    /// One connect attempt followed, on success, by the receive loop.
    async fn cycle(&mut self) -> Cycle {
        let address = self.endpoint.address.clone();
        self.ctx.registry.mark_connecting(self.generation, &address);
        info!(endpoint = %self.endpoint.display_name, address = %address, "Connecting");

        let connect = self.ctx.transport.connect(&address, self.ctx.ignore_tls_errors);
        let result = tokio::select! {
            result = connect => result,
            _ = cancelled(&mut self.cancel) => return Cycle::Cancelled,
        };

        let mut session = match result {
            Ok(session) => session,
            Err(failure) => {
                let kind = failure.kind();
                self.apply(ConnectionEvent::Error(failure));
                return Cycle::Ended {
                    failure: Some(kind),
                };
            }
        };
        self.apply(ConnectionEvent::Opened);

        self.receive(session.as_mut()).await
    }

    async fn receive(&mut self, session: &mut dyn Session) -> Cycle {
        loop {
            let event = tokio::select! {
                event = session.next_event() => Some(event),
                _ = cancelled(&mut self.cancel) => None,
            };
            let Some(event) = event else {
                session.close().await;
                return Cycle::Cancelled;
            };

            match event {
                ConnectionEvent::Error(ref failure) => {
                    let kind = failure.kind();
                    self.apply(event);
                    return Cycle::Ended {
                        failure: Some(kind),
                    };
                }
                ConnectionEvent::Closed { .. } => {
                    self.apply(event);
                    return Cycle::Ended { failure: None };
                }
                event => self.apply(event),
            }
        }
    }

    /// Applies one event to the registry and the notifier.
    fn apply(&self, event: ConnectionEvent) {
        let name = &self.endpoint.display_name;
        let address = &self.endpoint.address;
        match event {
            ConnectionEvent::Opened => {
                self.ctx.registry.mark_online(self.generation, address);
                info!(endpoint = %name, address = %address, "Connected");
            }
            ConnectionEvent::Message(bytes) => self.deliver(&bytes),
            ConnectionEvent::Closed { code, reason } => {
                self.ctx.registry.mark_offline(self.generation, address, None);
                info!(
                    endpoint = %name,
                    address = %address,
                    code = ?code,
                    reason = %reason,
                    "Disconnected"
                );
            }
            ConnectionEvent::Error(failure) => {
                let summary = failure.summary();
                warn!(endpoint = %name, address = %address, error = %summary, "Connection error");
                self.ctx
                    .registry
                    .mark_offline(self.generation, address, Some(summary));
            }
        }
    }

    /// Decodes a frame and shows it unless notifications are muted.
    fn deliver(&self, bytes: &[u8]) {
        let message = match DecodedMessage::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(endpoint = %self.endpoint.display_name, error = %e, "Dropping frame");
                return;
            }
        };

        if self.ctx.mute.is_muted() {
            debug!(
                endpoint = %self.endpoint.display_name,
                title = %message.title,
                "Muted, dropping message"
            );
            return;
        }

        self.ctx.notifier.notify(Notification {
            title: message.title,
            body: message.body,
            source: self.endpoint.display_name.clone(),
            timeout: self.ctx.notify_timeout,
        });
    }
}

/// Completes once the cancel flag is set or its sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}
