//! [`SimRobot`] – a complete simulated robot for CI and headless runs.
//!
//! Builds one [`SimBase`], `N` [`SimRangingSensor`]s named
//! `ultrasonic_sensor1..N`, a level [`SimOrientationSensor`], and an empty
//! [`SimPerception`], and hands out both the concrete handles (to steer the
//! simulation) and a [`Robot`] of trait objects (to give to the engine).
//!
//! # Example
//!
//! ```rust
//! use tipsy_hal::{RangingSensor, SimRobot};
//!
//! let sim = SimRobot::builder()
//!     .with_ranging_sensors(2)
//!     .with_clear_distance(1.5)
//!     .build();
//!
//! assert_eq!(sim.ranging.len(), 2);
//! let robot = sim.robot();
//! assert_eq!(robot.ranging[1].id(), "ultrasonic_sensor2");
//! ```

use std::sync::Arc;

use crate::Robot;
use crate::sensors::{RangingSensor, ranging_sensor_id};
use crate::sim::{SimBase, SimOrientationSensor, SimPerception, SimRangingSensor};

/// Concrete handles to every simulated device.
pub struct SimRobot {
    pub base: Arc<SimBase>,
    pub ranging: Vec<Arc<SimRangingSensor>>,
    pub orientation: Arc<SimOrientationSensor>,
    pub perception: Arc<SimPerception>,
}

impl SimRobot {
    pub fn builder() -> SimRobotBuilder {
        SimRobotBuilder::default()
    }

    /// The trait-object view the behavior engine consumes.  All handles
    /// share state with `self`.
    pub fn robot(&self) -> Robot {
        Robot {
            base: self.base.clone(),
            ranging: self
                .ranging
                .iter()
                .map(|s| s.clone() as Arc<dyn RangingSensor>)
                .collect(),
            orientation: self.orientation.clone(),
            perception: self.perception.clone(),
        }
    }

    /// Set every ranging sensor to `distance_m`.
    pub fn set_all_distances(&self, distance_m: f64) {
        for sensor in &self.ranging {
            sensor.set_distance(distance_m);
        }
    }
}

/// Builder for [`SimRobot`].
pub struct SimRobotBuilder {
    base_id: String,
    sensor_count: usize,
    clear_distance_m: f64,
}

impl Default for SimRobotBuilder {
    fn default() -> Self {
        Self {
            base_id: "tipsy-base".to_string(),
            sensor_count: 1,
            clear_distance_m: 2.0,
        }
    }
}

impl SimRobotBuilder {
    pub fn with_base_id(mut self, id: impl Into<String>) -> Self {
        self.base_id = id.into();
        self
    }

    pub fn with_ranging_sensors(mut self, count: usize) -> Self {
        self.sensor_count = count;
        self
    }

    /// Initial distance reported by every ranging sensor.
    pub fn with_clear_distance(mut self, distance_m: f64) -> Self {
        self.clear_distance_m = distance_m;
        self
    }

    pub fn build(self) -> SimRobot {
        SimRobot {
            base: Arc::new(SimBase::new(self.base_id)),
            ranging: (1..=self.sensor_count)
                .map(|n| {
                    Arc::new(SimRangingSensor::new(
                        ranging_sensor_id(n),
                        self.clear_distance_m,
                    ))
                })
                .collect(),
            orientation: Arc::new(SimOrientationSensor::new("movement_sensor")),
            perception: Arc::new(SimPerception::new()),
        }
    }
}
