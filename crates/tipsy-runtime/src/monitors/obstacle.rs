//! [`ObstacleMonitor`] – stop before driving into something.
//!
//! Fires `Stop` iff at least one ranging sensor reads below the obstacle
//! threshold **and** the base is moving forward at the moment of evaluation.
//! Backing up and spinning are left to the collision-recovery monitor.  No
//! debounce: one qualifying sample is enough.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tipsy_hal::RangingSensor;
use tipsy_kernel::LocomotionHandle;
use tipsy_types::{LocomotionState, MonitorKind, MotionIntent, TipsyError};
use tracing::info;

use super::{Monitor, ranging};
use crate::config::BehaviorConfig;

/// `true` when an obstacle reading should stop the base in `state`.
pub fn should_stop(state: LocomotionState, obstacle_near: bool) -> bool {
    obstacle_near && state == LocomotionState::MovingForward
}

pub struct ObstacleMonitor {
    sensors: Vec<Arc<dyn RangingSensor>>,
    locomotion: LocomotionHandle,
    threshold_m: f64,
    period: Duration,
    query_timeout: Duration,
}

impl ObstacleMonitor {
    pub fn new(
        config: &BehaviorConfig,
        sensors: Vec<Arc<dyn RangingSensor>>,
        locomotion: LocomotionHandle,
    ) -> Self {
        Self {
            sensors,
            locomotion,
            threshold_m: config.obstacle_threshold_m,
            period: config.safety_poll_interval(),
            query_timeout: config.query_timeout(),
        }
    }
}

#[async_trait]
impl Monitor for ObstacleMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::Obstacle
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) -> Result<Option<MotionIntent>, TipsyError> {
        let near =
            ranging::any_closer_than(&self.sensors, self.threshold_m, self.query_timeout).await?;
        // Read the register after the sensors so the state is as fresh as
        // possible when combined with the reading.
        let state = self.locomotion.state();
        if should_stop(state, near) {
            info!(threshold_m = self.threshold_m, "Obstacle ahead, stopping");
            return Ok(Some(MotionIntent::Stop));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipsy_hal::SimRobot;
    use tipsy_types::LocomotionSnapshot;
    use tokio::time::Instant;

    fn monitor(sim: &SimRobot, state: LocomotionState) -> ObstacleMonitor {
        let snapshot = LocomotionSnapshot {
            state,
            last_idle_at: Instant::now(),
        };
        ObstacleMonitor::new(
            &BehaviorConfig::default(),
            sim.robot().ranging,
            LocomotionHandle::detached(snapshot),
        )
    }

    #[test]
    fn only_forward_motion_is_stopped() {
        assert!(should_stop(LocomotionState::MovingForward, true));
        for state in [
            LocomotionState::Idle,
            LocomotionState::MovingBackward,
            LocomotionState::Spinning,
        ] {
            assert!(!should_stop(state, true), "{state} must not stop");
        }
        assert!(!should_stop(LocomotionState::MovingForward, false));
    }

    #[tokio::test]
    async fn stops_when_forward_and_close() {
        let sim = SimRobot::builder().with_clear_distance(0.5).build();
        let mut m = monitor(&sim, LocomotionState::MovingForward);
        assert_eq!(m.tick().await.unwrap(), Some(MotionIntent::Stop));
    }

    #[tokio::test]
    async fn spinning_next_to_obstacle_does_not_stop() {
        let sim = SimRobot::builder().with_clear_distance(0.3).build();
        let mut m = monitor(&sim, LocomotionState::Spinning);
        assert_eq!(m.tick().await.unwrap(), None);
    }

    #[tokio::test]
    async fn any_single_sensor_qualifies() {
        let sim = SimRobot::builder()
            .with_ranging_sensors(3)
            .with_clear_distance(2.0)
            .build();
        sim.ranging[2].set_distance(0.59);
        let mut m = monitor(&sim, LocomotionState::MovingForward);
        assert_eq!(m.tick().await.unwrap(), Some(MotionIntent::Stop));
    }

    #[tokio::test]
    async fn failed_read_is_an_error_not_a_stop() {
        let sim = SimRobot::builder().build();
        sim.ranging[0].set_failing(true);
        let mut m = monitor(&sim, LocomotionState::MovingForward);
        assert!(matches!(m.tick().await, Err(TipsyError::Sensor(_))));
    }
}
