//! The four concurrent monitors and the loop that drives them.
//!
//! A monitor is a small piece of policy: each [`Monitor::tick`] queries the
//! collaborators it needs, reads the locomotion register if it cares, and
//! either proposes one [`MotionIntent`] or nothing.  [`run_monitor`] owns the
//! poll-sleep loop around it: it submits the intent to the arbiter, waits
//! for the verdict, heartbeats the watchdog (also while waiting), and never
//! lets a failed query end the loop.
//!
//! | Monitor | Period | Intent |
//! |---|---|---|
//! | [`ObstacleMonitor`] | safety poll (10 ms) | `Stop` |
//! | [`CollisionRecoveryMonitor`] | safety poll (10 ms) | `Recover` |
//! | [`PersonSeekMonitor`] | perception interval (3 s) | `Approach` / `ExploreSpin` |
//! | [`IdleTimeoutMonitor`] | safety poll (10 ms) | `ExploreSpin` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tipsy_kernel::{IntentSender, Verdict, Watchdog};
use tipsy_types::{MonitorKind, MotionIntent, TipsyError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod collision;
pub mod idle;
pub mod obstacle;
pub mod person;
pub mod ranging;

pub use collision::CollisionRecoveryMonitor;
pub use idle::IdleTimeoutMonitor;
pub use obstacle::ObstacleMonitor;
pub use person::PersonSeekMonitor;

// ────────────────────────────────────────────────────────────────────────────
// Monitor trait
// ────────────────────────────────────────────────────────────────────────────

/// One independently scheduled behavior.
#[async_trait]
pub trait Monitor: Send {
    fn kind(&self) -> MonitorKind;

    /// Sleep between the end of one tick and the start of the next.
    fn period(&self) -> Duration;

    /// Evaluate once.  An `Err` means a query failed and this tick is
    /// skipped; it never ends the loop.
    async fn tick(&mut self) -> Result<Option<MotionIntent>, TipsyError>;
}

/// Source of exploratory spin headings.
pub type HeadingSource = Box<dyn FnMut() -> f64 + Send + Sync>;

/// A uniformly random heading in `[0, 360)` degrees.
pub fn random_heading() -> f64 {
    rand::thread_rng().gen_range(0.0..360.0)
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// What one monitor did over its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub monitor: MonitorKind,
    pub ticks: u64,
    pub submitted: u64,
    pub executed: u64,
    pub discarded: u64,
    pub preempted: u64,
    /// Ticks skipped because a sensor, orientation or perception query failed.
    pub query_errors: u64,
    /// Submitted intents whose motion failed.
    pub motion_errors: u64,
    pub last_error: Option<String>,
}

impl MonitorReport {
    pub fn new(monitor: MonitorKind) -> Self {
        Self {
            monitor,
            ticks: 0,
            submitted: 0,
            executed: 0,
            discarded: 0,
            preempted: 0,
            query_errors: 0,
            motion_errors: 0,
            last_error: None,
        }
    }

    fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Executed => self.executed += 1,
            Verdict::Discarded { .. } => self.discarded += 1,
            Verdict::Preempted { .. } => self.preempted += 1,
            Verdict::Failed(error) => {
                self.motion_errors += 1;
                self.last_error = Some(error.to_string());
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Poll loop
// ────────────────────────────────────────────────────────────────────────────

/// Drive `monitor` until `cancel` fires or the arbiter goes away.
///
/// The monitor must already be registered with `watchdog`; it is retired on
/// a clean exit.
pub async fn run_monitor(
    mut monitor: Box<dyn Monitor>,
    intents: IntentSender,
    watchdog: Arc<Watchdog>,
    cancel: CancellationToken,
) -> MonitorReport {
    let kind = monitor.kind();
    let period = monitor.period();
    let mut report = MonitorReport::new(kind);
    info!(monitor = %kind, period_ms = period.as_millis() as u64, "Monitor started");

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = monitor.tick() => outcome,
        };
        report.ticks += 1;

        match outcome {
            Ok(None) => {}
            Ok(Some(intent)) => {
                report.submitted += 1;
                debug!(monitor = %kind, intent = %intent.kind(), "Submitting intent");
                let Some(verdict) =
                    await_verdict(&intents, kind, intent, period, &watchdog, &cancel).await
                else {
                    break;
                };
                match verdict {
                    Ok(verdict) => {
                        if let Verdict::Failed(error) = &verdict {
                            warn!(monitor = %kind, %error, "Intent failed");
                        }
                        report.record(&verdict);
                    }
                    Err(error) => {
                        info!(monitor = %kind, %error, "Arbiter gone, monitor exiting");
                        break;
                    }
                }
            }
            Err(error) => {
                warn!(monitor = %kind, %error, "Query failed, skipping tick");
                report.query_errors += 1;
                report.last_error = Some(error.to_string());
            }
        }

        watchdog.heartbeat(kind);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }

    watchdog.retire(kind);
    info!(monitor = %kind, ticks = report.ticks, "Monitor stopped");
    report
}

/// Submit `intent` and wait for its verdict, heartbeating every `period`
/// meanwhile so a long motion does not look like a frozen monitor.
/// `None` once `cancel` fires.
async fn await_verdict(
    intents: &IntentSender,
    kind: MonitorKind,
    intent: MotionIntent,
    period: Duration,
    watchdog: &Watchdog,
    cancel: &CancellationToken,
) -> Option<Result<Verdict, TipsyError>> {
    let submit = intents.submit(kind, intent);
    tokio::pin!(submit);
    // `interval` panics on a zero period.
    let mut keepalive = tokio::time::interval(period.max(Duration::from_millis(1)));
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            verdict = &mut submit => return Some(verdict),
            _ = keepalive.tick() => watchdog.heartbeat(kind),
        }
    }
}
