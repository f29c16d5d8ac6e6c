//! Ranging and orientation sensor traits.

use async_trait::async_trait;
use tipsy_types::{OrientationSample, SensorError, SensorSample};

/// Identifier of the `n`-th ranging sensor (1-based), matching the names the
/// robot configuration assigns: `ultrasonic_sensor1`, `ultrasonic_sensor2`, …
pub fn ranging_sensor_id(n: usize) -> String {
    format!("ultrasonic_sensor{n}")
}

/// A distance sensor (ultrasonic, ToF, …).
#[async_trait]
pub trait RangingSensor: Send + Sync {
    /// Stable identifier, e.g. `"ultrasonic_sensor1"`.
    fn id(&self) -> &str;

    /// Take one reading.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::ReadFailed`] when the device cannot be read.
    async fn read(&self) -> Result<SensorSample, SensorError>;
}

/// An attitude source (IMU, movement sensor, …).
#[async_trait]
pub trait OrientationSensor: Send + Sync {
    /// Stable identifier, e.g. `"movement_sensor"`.
    fn id(&self) -> &str;

    /// Sample the current orientation.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::ReadFailed`] when the device cannot be read.
    async fn read(&self) -> Result<OrientationSample, SensorError>;
}
