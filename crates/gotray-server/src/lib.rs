//! Daemon: connection workers, registry, mute window, notifications.
//!
//! This crate provides the gotray daemon internals:
//! - One connection worker per push endpoint, reconnecting with backoff
//! - A generation-tagged registry of per-endpoint connection state
//! - A process-wide mute window gating desktop notifications
//! - A status file reporter, PID file and signal handling
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gotray_core::EndpointConfig;
//! use gotray_server::{DesktopNotifier, Manager, ManagerConfig, WsTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager = Manager::new(
//!         Arc::new(DesktopNotifier::default()),
//!         Arc::new(WsTransport::default()),
//!     );
//!     let endpoints = EndpointConfig::parse_all(["[Home]wss://push.example.org/stream?token=abc"]);
//!     manager.restart(ManagerConfig::new(endpoints));
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     manager.shutdown().await;
//! }
//! ```

mod backoff;
mod config;
mod error;
mod manager;
mod mute;
mod notify;
mod pidfile;
mod registry;
mod signals;
mod status;
mod transport;
mod worker;

pub use backoff::{BackoffPolicy, ConnectFailure, FailureKind, STATUS_UNAUTHORIZED};
pub use config::ManagerConfig;
pub use error::{ServerError, ServerResult};
pub use manager::Manager;
pub use mute::{Clock, MuteWindow, SystemClock};
pub use notify::{DesktopNotifier, Notification, Notifier, NotifyConfig};
pub use pidfile::{PidFile, default_pid_path, read_pid, running_pid, send_signal};
pub use registry::{Generation, Registry};
pub use signals::{ShutdownSignal, Signal, SignalHandler};
pub use status::{DEFAULT_POLL_INTERVAL, StatusFile, StatusReporter, default_status_path};
pub use transport::{
    BoxFuture, ConnectionEvent, Keepalive, Session, Transport, WsTransport, failure_from_ws,
};
pub use worker::{Worker, WorkerContext};
