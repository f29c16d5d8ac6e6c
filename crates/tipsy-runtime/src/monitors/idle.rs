//! [`IdleTimeoutMonitor`] – go exploring after standing still too long.
//!
//! Fires an `ExploreSpin` once the time since the base last entered idle
//! exceeds the idle timeout.  The boundary is exclusive: exactly at the
//! timeout nothing fires.  The register state itself is not consulted; the
//! arbiter discards the request if something else is already running.

use std::time::Duration;

use async_trait::async_trait;
use tipsy_kernel::LocomotionHandle;
use tipsy_types::{LocomotionSnapshot, MonitorKind, MotionIntent, TipsyError};
use tokio::time::Instant;
use tracing::debug;

use super::{HeadingSource, Monitor, random_heading};
use crate::config::BehaviorConfig;

/// `true` once `now - last_idle_at` is strictly greater than `timeout`.
pub fn idle_expired(snapshot: &LocomotionSnapshot, now: Instant, timeout: Duration) -> bool {
    snapshot.idle_elapsed(now) > timeout
}

pub struct IdleTimeoutMonitor {
    locomotion: LocomotionHandle,
    timeout: Duration,
    period: Duration,
    heading: HeadingSource,
}

impl IdleTimeoutMonitor {
    pub fn new(config: &BehaviorConfig, locomotion: LocomotionHandle) -> Self {
        Self {
            locomotion,
            timeout: config.idle_timeout(),
            period: config.safety_poll_interval(),
            heading: Box::new(random_heading),
        }
    }

    /// Replace the random heading source.
    pub fn with_heading(mut self, heading: impl FnMut() -> f64 + Send + Sync + 'static) -> Self {
        self.heading = Box::new(heading);
        self
    }
}

#[async_trait]
impl Monitor for IdleTimeoutMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::IdleTimeout
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) -> Result<Option<MotionIntent>, TipsyError> {
        let snapshot = self.locomotion.read();
        let now = Instant::now();
        if !idle_expired(&snapshot, now, self.timeout) {
            return Ok(None);
        }
        debug!(
            idle_s = snapshot.idle_elapsed(now).as_secs_f64(),
            "Idle too long, exploring"
        );
        Ok(Some(MotionIntent::explore_spin((self.heading)())))
    }
}
