//! [`Supervisor`] – wires the arbiter and the four monitors together, runs
//! them until shutdown, and aggregates what each of them did.
//!
//! Every monitor runs as its own Tokio task.  A monitor that panics is
//! reported as failed in the [`SupervisorReport`]; the others keep running
//! until the shutdown token fires.  The supervisor also polls the
//! [`Watchdog`] and logs monitors that have stopped ticking.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tipsy_hal::Robot;
use tipsy_kernel::{
    Arbiter, ArbiterReport, IntentSender, LocomotionHandle, PitchLimit, TipDetector, Watchdog,
};
use tipsy_middleware::LocomotionBus;
use tipsy_types::{MonitorKind, TipsyError};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::BehaviorConfig;
use crate::monitors::{
    CollisionRecoveryMonitor, IdleTimeoutMonitor, Monitor, MonitorReport, ObstacleMonitor,
    PersonSeekMonitor, run_monitor,
};

/// How often the watchdog is checked for frozen monitors.
const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_secs(1);

// ────────────────────────────────────────────────────────────────────────────
// Report types
// ────────────────────────────────────────────────────────────────────────────

/// Why a supervised task produced no report.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskFailure {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled before finishing")]
    Cancelled,
}

impl From<JoinError> for TaskFailure {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return TaskFailure::Cancelled;
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        TaskFailure::Panicked(message)
    }
}

/// One monitor's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub monitor: MonitorKind,
    pub result: Result<MonitorReport, TaskFailure>,
}

/// Everything the engine did between start and shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorReport {
    pub monitors: Vec<MonitorOutcome>,
    pub arbiter: Result<ArbiterReport, TaskFailure>,
}

impl SupervisorReport {
    /// The report of `monitor`, if it finished cleanly.
    pub fn monitor(&self, monitor: MonitorKind) -> Option<&MonitorReport> {
        self.monitors
            .iter()
            .find(|outcome| outcome.monitor == monitor)
            .and_then(|outcome| outcome.result.as_ref().ok())
    }

    /// Monitors whose task failed.
    pub fn failed_monitors(&self) -> Vec<MonitorKind> {
        self.monitors
            .iter()
            .filter(|outcome| outcome.result.is_err())
            .map(|outcome| outcome.monitor)
            .collect()
    }

    /// `true` when every task finished cleanly.
    pub fn is_clean(&self) -> bool {
        self.arbiter.is_ok() && self.failed_monitors().is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Supervisor
// ────────────────────────────────────────────────────────────────────────────

/// Owns the arbiter and the monitors until [`Supervisor::run`].
pub struct Supervisor {
    config: BehaviorConfig,
    robot: Robot,
    arbiter: Arbiter,
    intents: IntentSender,
    monitors: Vec<Box<dyn Monitor>>,
}

impl Supervisor {
    /// Validate `config` and build the arbiter plus the four standard
    /// monitors against `robot`.
    ///
    /// # Errors
    ///
    /// [`TipsyError::InvalidConfig`] for an invalid configuration or a robot
    /// without ranging sensors.
    pub fn new(
        config: BehaviorConfig,
        robot: Robot,
        bus: LocomotionBus,
    ) -> Result<Self, TipsyError> {
        config.validate()?;
        if robot.ranging.is_empty() {
            return Err(TipsyError::InvalidConfig(
                "robot has no ranging sensors".to_string(),
            ));
        }
        if robot.ranging.len() != config.sensor_count {
            warn!(
                configured = config.sensor_count,
                attached = robot.ranging.len(),
                "Ranging sensor count differs from configuration, using attached sensors"
            );
        }

        let (arbiter, intents) = Arbiter::new(robot.base.clone(), bus, config.motion_timeout());
        let locomotion = arbiter.locomotion();
        let detector = Arc::new(PitchLimit::new(config.tip_pitch_limit_deg));

        let monitors: Vec<Box<dyn Monitor>> = vec![
            Box::new(ObstacleMonitor::new(
                &config,
                robot.ranging.clone(),
                locomotion.clone(),
            )),
            Box::new(CollisionRecoveryMonitor::new(
                &config,
                robot.orientation.clone(),
                detector,
            )),
            Box::new(PersonSeekMonitor::new(
                &config,
                robot.perception.clone(),
                robot.ranging.clone(),
            )),
            Box::new(IdleTimeoutMonitor::new(&config, locomotion)),
        ];

        Ok(Self {
            config,
            robot,
            arbiter,
            intents,
            monitors,
        })
    }

    /// Replace the tip detector used by the collision-recovery monitor.
    pub fn with_tip_detector(self, detector: impl TipDetector + 'static) -> Self {
        let monitor = CollisionRecoveryMonitor::new(
            &self.config,
            self.robot.orientation.clone(),
            Arc::new(detector),
        );
        self.with_monitor(Box::new(monitor))
    }

    /// Replace the monitor of the same kind as `monitor`.
    pub fn with_monitor(mut self, monitor: Box<dyn Monitor>) -> Self {
        let kind = monitor.kind();
        match self.monitors.iter().position(|m| m.kind() == kind) {
            Some(index) => self.monitors[index] = monitor,
            None => self.monitors.push(monitor),
        }
        self
    }

    /// Read handle onto the locomotion register.
    pub fn locomotion(&self) -> LocomotionHandle {
        self.arbiter.locomotion()
    }

    /// Run until `cancel` fires, then stop the base and report.
    pub async fn run(self, cancel: CancellationToken) -> SupervisorReport {
        let Self {
            config,
            arbiter,
            intents,
            monitors,
            ..
        } = self;

        info!(monitors = monitors.len(), "Supervisor starting");
        let arbiter_task = tokio::spawn(arbiter.run(cancel.clone()));

        let watchdog = Arc::new(Watchdog::new());
        let mut kinds = Vec::with_capacity(monitors.len());
        let mut handles = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            let kind = monitor.kind();
            watchdog.register(kind, config.watchdog_deadline(monitor.period()));
            kinds.push(kind);
            handles.push(tokio::spawn(run_monitor(
                monitor,
                intents.clone(),
                watchdog.clone(),
                cancel.clone(),
            )));
        }
        // Only the monitors hold senders now; the arbiter also ends when
        // they have all gone.
        drop(intents);

        let watch_stop = cancel.child_token();
        let watch_task = tokio::spawn(watch_monitors(watchdog, watch_stop.clone()));

        let results = join_all(handles).await;
        watch_stop.cancel();
        if let Err(err) = watch_task.await {
            warn!(error = %err, "Watchdog task ended abnormally");
        }

        let monitors = kinds
            .into_iter()
            .zip(results)
            .map(|(monitor, result)| {
                let result = result.map_err(TaskFailure::from);
                if let Err(failure) = &result {
                    error!(%monitor, %failure, "Monitor task failed");
                }
                MonitorOutcome { monitor, result }
            })
            .collect();

        let arbiter = arbiter_task.await.map_err(TaskFailure::from);
        if let Err(failure) = &arbiter {
            error!(%failure, "Arbiter task failed");
        }

        info!("Supervisor stopped");
        SupervisorReport { monitors, arbiter }
    }
}

/// Log frozen monitors every [`WATCHDOG_CHECK_INTERVAL`] until `stop` fires.
async fn watch_monitors(watchdog: Arc<Watchdog>, stop: CancellationToken) {
    let mut interval = tokio::time::interval(WATCHDOG_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = interval.tick() => {
                for monitor in watchdog.check_all() {
                    warn!(%monitor, "Monitor has not ticked within its deadline");
                }
            }
        }
    }
}
