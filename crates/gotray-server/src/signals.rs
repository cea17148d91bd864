//! Unix signal handling for the daemon.
//!
//! The daemon has no IPC socket, so signals are its control surface:
//! - SIGTERM/SIGINT: graceful shutdown
//! - SIGHUP: reload the configuration and restart workers
//! - SIGUSR1: silence notifications for the configured duration
//! - SIGUSR2: unsilence notifications
//!
//! Shutdown is a latched flag on a watch channel; the other signals are
//! queued on an unbounded channel so none is lost between two loop turns.

use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Shutdown signal (SIGTERM, SIGINT).
    Shutdown,
    /// Reload configuration signal (SIGHUP).
    Reload,
    /// Silence notifications (SIGUSR1).
    Silence,
    /// Unsilence notifications (SIGUSR2).
    Unsilence,
}

impl Signal {
    /// The Unix signal number used to deliver this request to a daemon.
    #[cfg(unix)]
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Self::Shutdown => libc::SIGTERM,
            Self::Reload => libc::SIGHUP,
            Self::Silence => libc::SIGUSR1,
            Self::Unsilence => libc::SIGUSR2,
        }
    }
}

/// Signal handler that manages Unix signal processing.
pub struct SignalHandler {
    /// Channel to signal shutdown.
    shutdown_tx: Arc<watch::Sender<bool>>,
    /// Channel to receive shutdown signal.
    shutdown_rx: watch::Receiver<bool>,
    /// Queue of non-shutdown requests.
    control_tx: mpsc::UnboundedSender<Signal>,
    control_rx: Option<mpsc::UnboundedReceiver<Signal>>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    /// Creates a new signal handler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            control_tx,
            control_rx: Some(control_rx),
        }
    }

    /// Installs the signal handlers and spawns the listener task.
    ///
    /// This should be called once at daemon startup.
    #[cfg(unix)]
    pub fn spawn_listener(&self) -> io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigusr1 = signal(SignalKind::user_defined1())?;
        let mut sigusr2 = signal(SignalKind::user_defined2())?;

        let shutdown_tx = self.shutdown_tx.clone();
        let control_tx = self.control_tx.clone();

        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT, initiating shutdown");
                        let _ = shutdown_tx.send(true);
                        break;
                    }
                    _ = sighup.recv() => Signal::Reload,
                    _ = sigusr1.recv() => Signal::Silence,
                    _ = sigusr2.recv() => Signal::Unsilence,
                };
                info!(signal = ?request, "Received control signal");
                if control_tx.send(request).is_err() {
                    break;
                }
            }

            debug!("Signal listener stopped");
        });
        Ok(())
    }

    /// Non-Unix implementation: only Ctrl+C is handled.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) -> io::Result<()> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C, initiating shutdown");
                let _ = shutdown_tx.send(true);
            }
        });
        Ok(())
    }

    /// Returns a future that completes when a shutdown signal is received.
    pub fn shutdown(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_rx.clone(),
        }
    }

    /// Takes the receiving end of the control queue. Returns `None` after
    /// the first call.
    pub fn take_control(&mut self) -> Option<mpsc::UnboundedReceiver<Signal>> {
        self.control_rx.take()
    }

    /// Returns true if shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Programmatically delivers a signal.
    pub fn trigger(&self, signal: Signal) {
        match signal {
            Signal::Shutdown => self.trigger_shutdown(),
            other => {
                let _ = self.control_tx.send(other);
            }
        }
    }

    /// Programmatically triggers a shutdown.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

}

/// A signal that completes when shutdown is signaled.
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal. A dropped sender counts as shutdown.
    pub async fn wait(mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_handler_shutdown() {
        let handler = SignalHandler::new();
        assert!(!handler.is_shutdown());

        handler.trigger(Signal::Shutdown);
        assert!(handler.is_shutdown());
    }

    #[tokio::test]
    async fn control_signals_are_queued_in_order() {
        let mut handler = SignalHandler::new();
        let mut control = handler.take_control().unwrap();
        assert!(handler.take_control().is_none());

        handler.trigger(Signal::Silence);
        handler.trigger(Signal::Reload);
        handler.trigger(Signal::Unsilence);

        assert_eq!(control.recv().await, Some(Signal::Silence));
        assert_eq!(control.recv().await, Some(Signal::Reload));
        assert_eq!(control.recv().await, Some(Signal::Unsilence));
        assert!(!handler.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_signal_wait() {
        let handler = SignalHandler::new();
        let shutdown = handler.shutdown();

        let tx = handler.shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(true);
        });

        let result = tokio::time::timeout(Duration::from_millis(100), shutdown.wait()).await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn raw_signal_numbers() {
        assert_eq!(Signal::Shutdown.as_raw(), libc::SIGTERM);
        assert_eq!(Signal::Reload.as_raw(), libc::SIGHUP);
        assert_eq!(Signal::Silence.as_raw(), libc::SIGUSR1);
        assert_eq!(Signal::Unsilence.as_raw(), libc::SIGUSR2);
    }
}
