//! [`BehaviorConfig`] – every tunable the behavior engine reads.
//!
//! All fields have serde defaults, so a partial TOML table (or none at all)
//! yields a working configuration.  Durations are stored in milliseconds
//! and exposed as [`Duration`] through accessor methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tipsy_types::TipsyError;

/// Behavior engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// A ranging reading below this (metres) while moving forward stops the base.
    pub obstacle_threshold_m: f64,
    /// Every ranging reading must exceed this (metres) before approaching.
    pub approach_clearance_m: f64,
    /// A detection must score strictly above this to count.
    pub confidence_threshold: f64,
    /// Detection label that identifies a person.
    pub person_label: String,
    /// Camera passed to the perception service.
    pub camera_name: String,
    /// Pause between person-seek ticks.
    pub perception_interval_ms: u64,
    /// Idle time after which the robot goes exploring.
    pub idle_timeout_ms: u64,
    /// Period of the obstacle, collision and idle monitors.
    pub safety_poll_interval_ms: u64,
    /// Number of ranging sensors (`ultrasonic_sensor1..N`).
    pub sensor_count: usize,
    /// Upper bound on any single sensor, orientation or perception query.
    pub query_timeout_ms: u64,
    /// Upper bound on any single base command.
    pub motion_timeout_ms: u64,
    /// Pitch magnitude (degrees) treated as tipping.
    pub tip_pitch_limit_deg: f64,
    /// A monitor is reported frozen after `watchdog_grace` missed periods
    /// (plus the time one tick may legitimately spend in queries).
    pub watchdog_grace: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            obstacle_threshold_m: 0.6,
            approach_clearance_m: 0.6,
            confidence_threshold: 0.7,
            person_label: "Person".to_string(),
            camera_name: "cam".to_string(),
            perception_interval_ms: 3_000,
            idle_timeout_ms: 30_000,
            safety_poll_interval_ms: 10,
            sensor_count: 1,
            query_timeout_ms: 500,
            motion_timeout_ms: 30_000,
            tip_pitch_limit_deg: 20.0,
            watchdog_grace: 5,
        }
    }
}

impl BehaviorConfig {
    pub fn perception_interval(&self) -> Duration {
        Duration::from_millis(self.perception_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn safety_poll_interval(&self) -> Duration {
        Duration::from_millis(self.safety_poll_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn motion_timeout(&self) -> Duration {
        Duration::from_millis(self.motion_timeout_ms)
    }

    /// Heartbeat deadline for a monitor ticking every `period`.
    ///
    /// `watchdog_grace` missed periods plus the time one tick may spend in
    /// bounded queries: one per sensor and one more (detection or
    /// orientation).  Time spent waiting on a verdict is not counted; the
    /// poll loop keeps heartbeating while it waits.
    pub fn watchdog_deadline(&self, period: Duration) -> Duration {
        let queries = u32::try_from(self.sensor_count)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        period * self.watchdog_grace + self.query_timeout() * queries
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), TipsyError> {
        fn positive_metres(name: &str, value: f64) -> Result<(), TipsyError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TipsyError::InvalidConfig(format!(
                    "{name} must be a positive distance, got {value}"
                )))
            }
        }
        fn non_zero(name: &str, value: u64) -> Result<(), TipsyError> {
            if value > 0 {
                Ok(())
            } else {
                Err(TipsyError::InvalidConfig(format!("{name} must be > 0")))
            }
        }

        positive_metres("obstacle_threshold_m", self.obstacle_threshold_m)?;
        positive_metres("approach_clearance_m", self.approach_clearance_m)?;
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TipsyError::InvalidConfig(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.person_label.trim().is_empty() {
            return Err(TipsyError::InvalidConfig(
                "person_label must not be empty".to_string(),
            ));
        }
        if self.camera_name.trim().is_empty() {
            return Err(TipsyError::InvalidConfig(
                "camera_name must not be empty".to_string(),
            ));
        }
        non_zero("perception_interval_ms", self.perception_interval_ms)?;
        non_zero("idle_timeout_ms", self.idle_timeout_ms)?;
        non_zero("safety_poll_interval_ms", self.safety_poll_interval_ms)?;
        non_zero("sensor_count", self.sensor_count as u64)?;
        non_zero("query_timeout_ms", self.query_timeout_ms)?;
        non_zero("motion_timeout_ms", self.motion_timeout_ms)?;
        non_zero("watchdog_grace", u64::from(self.watchdog_grace))?;
        if !(self.tip_pitch_limit_deg > 0.0 && self.tip_pitch_limit_deg < 90.0) {
            return Err(TipsyError::InvalidConfig(format!(
                "tip_pitch_limit_deg must be within (0, 90), got {}",
                self.tip_pitch_limit_deg
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let cfg = BehaviorConfig::default();
        assert_eq!(cfg.obstacle_threshold_m, 0.6);
        assert_eq!(cfg.approach_clearance_m, 0.6);
        assert_eq!(cfg.confidence_threshold, 0.7);
        assert_eq!(cfg.person_label, "Person");
        assert_eq!(cfg.camera_name, "cam");
        assert_eq!(cfg.perception_interval(), Duration::from_secs(3));
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.safety_poll_interval(), Duration::from_millis(10));
        assert_eq!(cfg.sensor_count, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: BehaviorConfig =
            serde_json::from_str(r#"{ "sensor_count": 3, "person_label": "human" }"#).unwrap();
        assert_eq!(cfg.sensor_count, 3);
        assert_eq!(cfg.person_label, "human");
        assert_eq!(cfg.idle_timeout_ms, 30_000);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<Box<dyn Fn(&mut BehaviorConfig)>> = vec![
            Box::new(|c| c.obstacle_threshold_m = 0.0),
            Box::new(|c| c.approach_clearance_m = f64::NAN),
            Box::new(|c| c.confidence_threshold = 1.5),
            Box::new(|c| c.person_label = " ".to_string()),
            Box::new(|c| c.camera_name = String::new()),
            Box::new(|c| c.perception_interval_ms = 0),
            Box::new(|c| c.safety_poll_interval_ms = 0),
            Box::new(|c| c.sensor_count = 0),
            Box::new(|c| c.query_timeout_ms = 0),
            Box::new(|c| c.watchdog_grace = 0),
            Box::new(|c| c.tip_pitch_limit_deg = 95.0),
        ];
        for mutate in cases {
            let mut cfg = BehaviorConfig::default();
            mutate(&mut cfg);
            assert!(
                matches!(cfg.validate(), Err(TipsyError::InvalidConfig(_))),
                "{cfg:?} should be rejected"
            );
        }
    }

    #[test]
    fn watchdog_deadline_is_grace_periods_plus_one_tick_of_queries() {
        let cfg = BehaviorConfig::default();
        // 5 × 10 ms + 2 × 500 ms
        assert_eq!(
            cfg.watchdog_deadline(cfg.safety_poll_interval()),
            Duration::from_millis(1_050)
        );
        // 5 × 3 s + 2 × 500 ms
        assert_eq!(
            cfg.watchdog_deadline(cfg.perception_interval()),
            Duration::from_millis(16_000)
        );
    }
}
