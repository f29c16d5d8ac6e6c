//! [`Watchdog`] – monitor liveness tracking.
//!
//! Every monitor loop calls [`Watchdog::heartbeat`] after each tick.  The
//! watchdog remembers the instant of the last heartbeat and considers a
//! monitor *frozen* once its deadline has been exceeded, which is how a
//! sensor read or detection call that wedged past its own timeout gets
//! noticed.
//!
//! The supervisor calls [`Watchdog::check_all`] periodically and logs the
//! frozen monitors.  All methods take `&self`; share the watchdog behind an
//! [`Arc`][std::sync::Arc].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tipsy_types::MonitorKind;
use tokio::time::Instant;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorHealth {
    /// The monitor has sent a heartbeat within its deadline.
    Healthy,
    /// The monitor has not sent a heartbeat within its deadline.
    TimedOut,
}

struct Entry {
    last_heartbeat: Instant,
    timeout: Duration,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > self.timeout
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks heartbeats from registered monitors and detects frozen ones.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tipsy_kernel::watchdog::{MonitorHealth, Watchdog};
/// use tipsy_types::MonitorKind;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let wd = Watchdog::new();
/// wd.register(MonitorKind::Obstacle, Duration::from_secs(1));
/// wd.heartbeat(MonitorKind::Obstacle);
///
/// assert_eq!(wd.health(MonitorKind::Obstacle), MonitorHealth::Healthy);
/// # });
/// ```
#[derive(Default)]
pub struct Watchdog {
    monitors: Mutex<HashMap<MonitorKind, Entry>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<MonitorKind, Entry>> {
        self.monitors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `monitor` with a maximum heartbeat `timeout`.
    ///
    /// The last heartbeat starts at now.  Re-registering resets the deadline.
    pub fn register(&self, monitor: MonitorKind, timeout: Duration) {
        self.entries().insert(
            monitor,
            Entry {
                last_heartbeat: Instant::now(),
                timeout,
            },
        );
    }

    /// Record a heartbeat for `monitor`.  No-op for unregistered monitors.
    pub fn heartbeat(&self, monitor: MonitorKind) {
        if let Some(entry) = self.entries().get_mut(&monitor) {
            entry.last_heartbeat = Instant::now();
        }
    }

    /// Stop tracking `monitor`, e.g. once its loop has exited cleanly.
    pub fn retire(&self, monitor: MonitorKind) {
        self.entries().remove(&monitor);
    }

    /// Unknown monitors are reported as [`MonitorHealth::TimedOut`].
    pub fn health(&self, monitor: MonitorKind) -> MonitorHealth {
        let now = Instant::now();
        match self.entries().get(&monitor) {
            Some(entry) if !entry.expired(now) => MonitorHealth::Healthy,
            _ => MonitorHealth::TimedOut,
        }
    }

    /// Every monitor past its deadline, sorted by name.
    pub fn check_all(&self) -> Vec<MonitorKind> {
        let now = Instant::now();
        let mut frozen: Vec<_> = self
            .entries()
            .iter()
            .filter(|(_, entry)| entry.expired(now))
            .map(|(kind, _)| *kind)
            .collect();
        frozen.sort_by_key(|kind| kind.name());
        frozen
    }
}
