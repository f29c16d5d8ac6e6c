//! Bounded ranging-sensor queries shared by the obstacle and person monitors.
//!
//! Sensors are read one after another, each under its own timeout.  Both
//! checks short-circuit on the first reading that settles the answer.

use std::sync::Arc;
use std::time::Duration;

use tipsy_hal::RangingSensor;
use tipsy_types::SensorError;

/// Read one sensor, mapping an expired `timeout` to [`SensorError::Timeout`].
pub async fn read_distance(
    sensor: &dyn RangingSensor,
    timeout: Duration,
) -> Result<f64, SensorError> {
    let sample = tokio::time::timeout(timeout, sensor.read())
        .await
        .map_err(|_| SensorError::Timeout {
            sensor: sensor.id().to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })??;
    Ok(sample.distance_m)
}

/// `true` if any sensor reads strictly below `threshold_m`.
pub async fn any_closer_than(
    sensors: &[Arc<dyn RangingSensor>],
    threshold_m: f64,
    timeout: Duration,
) -> Result<bool, SensorError> {
    for sensor in sensors {
        if read_distance(sensor.as_ref(), timeout).await? < threshold_m {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `true` if every sensor reads strictly above `threshold_m`.
pub async fn all_farther_than(
    sensors: &[Arc<dyn RangingSensor>],
    threshold_m: f64,
    timeout: Duration,
) -> Result<bool, SensorError> {
    for sensor in sensors {
        if read_distance(sensor.as_ref(), timeout).await? <= threshold_m {
            return Ok(false);
        }
    }
    Ok(true)
}
