//! [`CollisionRecoveryMonitor`] – back off and turn around when tipping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tipsy_hal::OrientationSensor;
use tipsy_kernel::TipDetector;
use tipsy_types::{MonitorKind, MotionIntent, SensorError, TipsyError};
use tracing::info;

use super::Monitor;
use crate::config::BehaviorConfig;

pub struct CollisionRecoveryMonitor {
    sensor: Arc<dyn OrientationSensor>,
    detector: Arc<dyn TipDetector>,
    period: Duration,
    query_timeout: Duration,
}

impl CollisionRecoveryMonitor {
    pub fn new(
        config: &BehaviorConfig,
        sensor: Arc<dyn OrientationSensor>,
        detector: Arc<dyn TipDetector>,
    ) -> Self {
        Self {
            sensor,
            detector,
            period: config.safety_poll_interval(),
            query_timeout: config.query_timeout(),
        }
    }
}

#[async_trait]
impl Monitor for CollisionRecoveryMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::CollisionRecovery
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) -> Result<Option<MotionIntent>, TipsyError> {
        let sample = tokio::time::timeout(self.query_timeout, self.sensor.read())
            .await
            .map_err(|_| SensorError::Timeout {
                sensor: self.sensor.id().to_string(),
                timeout_ms: self.query_timeout.as_millis() as u64,
            })??;

        if self.detector.is_tipping(&sample) {
            info!(
                detector = self.detector.name(),
                pitch_deg = sample.pitch_deg,
                roll_deg = sample.roll_deg,
                "Tipping detected, recovering"
            );
            return Ok(Some(MotionIntent::recover()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipsy_hal::SimRobot;
    use tipsy_kernel::PitchLimit;
    use tipsy_types::OrientationSample;

    fn monitor(sim: &SimRobot) -> CollisionRecoveryMonitor {
        CollisionRecoveryMonitor::new(
            &BehaviorConfig::default(),
            sim.orientation.clone(),
            Arc::new(PitchLimit::default()),
        )
    }

    #[tokio::test]
    async fn level_robot_does_nothing() {
        let sim = SimRobot::builder().build();
        assert_eq!(monitor(&sim).tick().await.unwrap(), None);
    }

    #[tokio::test]
    async fn tipping_emits_fixed_recover() {
        let sim = SimRobot::builder().build();
        sim.orientation.set_sample(OrientationSample::pitched(-40.0));
        assert_eq!(
            monitor(&sim).tick().await.unwrap(),
            Some(MotionIntent::Recover {
                backward_distance_mm: 800,
                backward_speed_mm_s: 100,
                turn_degrees: 180.0,
                turn_speed_deg_s: 45.0,
            })
        );
    }

    #[tokio::test]
    async fn custom_detector_is_used() {
        let sim = SimRobot::builder().build();
        let mut m = CollisionRecoveryMonitor::new(
            &BehaviorConfig::default(),
            sim.orientation.clone(),
            Arc::new(|_: &OrientationSample| true),
        );
        assert!(m.tick().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_orientation_read_times_out() {
        let sim = SimRobot::builder().build();
        sim.orientation.set_stalled(true);
        let err = monitor(&sim).tick().await.unwrap_err();
        assert!(matches!(
            err,
            TipsyError::Sensor(SensorError::Timeout { timeout_ms: 500, .. })
        ));
    }
}
