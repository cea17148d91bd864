//! Process-wide mute window.
//!
//! While the window is open, decoded messages are dropped instead of being
//! shown. The window is a single timestamp, so an atomic is enough: there is
//! no compound invariant, only visibility between the writer and the workers.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared mute state. Cloning shares the same window.
#[derive(Clone)]
pub struct MuteWindow {
    /// `mute_until` in milliseconds since the Unix epoch.
    until_ms: Arc<AtomicI64>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MuteWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuteWindow")
            .field("until", &self.until())
            .field("muted", &self.is_muted())
            .finish()
    }
}

impl Default for MuteWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl MuteWindow {
    /// Creates an inactive window using the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an inactive window using the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now().timestamp_millis();
        Self {
            until_ms: Arc::new(AtomicI64::new(now)),
            clock,
        }
    }

    /// Mutes notifications for `duration` from now.
    pub fn silence(&self, duration: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|span| now.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.until_ms.store(until.timestamp_millis(), Ordering::Release);
        info!(until = %until, minutes = duration.as_secs() / 60, "Notifications silenced");
        until
    }

    /// Ends the mute window immediately.
    pub fn unsilence(&self) {
        let now = self.clock.now().timestamp_millis();
        self.until_ms.store(now, Ordering::Release);
        info!("Notifications unsilenced");
    }

    /// Returns true while `now < mute_until`.
    pub fn is_muted(&self) -> bool {
        self.clock.now().timestamp_millis() < self.until_ms.load(Ordering::Acquire)
    }

    /// Returns the end of the window.
    pub fn until(&self) -> DateTime<Utc> {
        let ms = self.until_ms.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the end of the window if it is still open.
    pub fn muted_until(&self) -> Option<DateTime<Utc>> {
        self.is_muted().then(|| self.until())
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        })
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
