//! In-process simulation drivers for tests and headless runs.
//!
//! Every driver records what it was asked to do and answers with settable,
//! plausible data.  Failures and stalls can be injected at runtime so the
//! behavior engine's error paths can be exercised without hardware.
//!
//! Motion is simulated against the Tokio clock: a move of `d` mm at `v` mm/s
//! takes `d / v` seconds in 10 ms steps, so under a paused test clock the
//! whole engine runs deterministically and instantly.
//!
//! # Example
//!
//! ```rust
//! use tipsy_hal::sim::SimRangingSensor;
//! use tipsy_hal::RangingSensor;
//!
//! # tokio_test_block_on(async {
//! let sensor = SimRangingSensor::new("ultrasonic_sensor1", 1.0);
//! sensor.set_distance(0.3);
//! assert_eq!(sensor.read().await.unwrap().distance_m, 0.3);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tipsy_types::{
    Detection, MotionError, OrientationSample, PerceptionError, Primitive, SensorError,
    SensorSample,
};
use tracing::debug;

use crate::base::Base;
use crate::perception::PerceptionService;
use crate::sensors::{OrientationSensor, RangingSensor};

/// Simulation time step for straight moves.
const MOVE_STEP: Duration = Duration::from_millis(10);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared fault switches: `failing` makes every call return an error,
/// `stalled` makes every call hang forever.
#[derive(Default)]
struct Faults {
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl Faults {
    /// Hang if stalled; report whether the call should fail.
    async fn gate(&self) -> bool {
        if self.stalled.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }
        self.failing.load(Ordering::Acquire)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Base
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct BaseLog {
    commands: Vec<Primitive>,
    last_move_progress_mm: f64,
    odometer_mm: f64,
}

/// A simulated drive base that records commands and tracks distance covered.
pub struct SimBase {
    id: String,
    log: Mutex<BaseLog>,
    faults: Faults,
}

impl SimBase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: Mutex::new(BaseLog::default()),
            faults: Faults::default(),
        }
    }

    /// Every command received so far, in order, including `Stop`.
    pub fn commands(&self) -> Vec<Primitive> {
        lock(&self.log).commands.clone()
    }

    /// Commands excluding `Stop`.
    pub fn motions(&self) -> Vec<Primitive> {
        lock(&self.log)
            .commands
            .iter()
            .filter(|p| !matches!(p, Primitive::Stop))
            .cloned()
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        lock(&self.log)
            .commands
            .iter()
            .filter(|p| matches!(p, Primitive::Stop))
            .count()
    }

    /// Distance covered by the most recent straight move, in mm.  Stays at
    /// the partial value if that move was abandoned.
    pub fn last_move_progress_mm(&self) -> f64 {
        lock(&self.log).last_move_progress_mm
    }

    /// Total straight-line distance covered, in mm.
    pub fn odometer_mm(&self) -> f64 {
        lock(&self.log).odometer_mm
    }

    /// Make every motion command (not `stop`) fail.
    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::Release);
    }

    /// Make every motion command (not `stop`) hang.
    pub fn set_stalled(&self, stalled: bool) {
        self.faults.stalled.store(stalled, Ordering::Release);
    }

    fn record(&self, primitive: Primitive) {
        debug!(base = %self.id, ?primitive, "sim base command");
        lock(&self.log).commands.push(primitive);
    }

    fn fault(&self, command: &str) -> MotionError {
        MotionError::CommandFailed {
            command: command.to_string(),
            details: format!("simulated fault on '{}'", self.id),
        }
    }
}

#[async_trait]
impl Base for SimBase {
    fn id(&self) -> &str {
        &self.id
    }

    async fn move_straight(&self, distance_mm: i32, speed_mm_s: u32) -> Result<(), MotionError> {
        self.record(Primitive::MoveStraight {
            distance_mm,
            speed_mm_s,
        });
        if self.faults.gate().await {
            return Err(self.fault("move_straight"));
        }
        if speed_mm_s == 0 {
            return Err(MotionError::CommandFailed {
                command: "move_straight".to_string(),
                details: "speed must be positive".to_string(),
            });
        }

        let total = f64::from(distance_mm.unsigned_abs());
        let per_step = f64::from(speed_mm_s) * MOVE_STEP.as_secs_f64();
        lock(&self.log).last_move_progress_mm = 0.0;
        let mut covered = 0.0;
        while covered < total {
            tokio::time::sleep(MOVE_STEP).await;
            let next = (covered + per_step).min(total);
            let mut log = lock(&self.log);
            log.odometer_mm += next - covered;
            log.last_move_progress_mm = next;
            covered = next;
        }
        Ok(())
    }

    async fn spin(&self, degrees: f64, angular_speed_deg_s: f64) -> Result<(), MotionError> {
        self.record(Primitive::Spin {
            degrees,
            angular_speed_deg_s,
        });
        if self.faults.gate().await {
            return Err(self.fault("spin"));
        }
        if angular_speed_deg_s <= 0.0 {
            return Err(MotionError::CommandFailed {
                command: "spin".to_string(),
                details: "angular speed must be positive".to_string(),
            });
        }
        tokio::time::sleep(Duration::from_secs_f64(degrees / angular_speed_deg_s)).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), MotionError> {
        self.record(Primitive::Stop);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ranging sensor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated ranging sensor returning a settable distance.
pub struct SimRangingSensor {
    id: String,
    distance_m: Mutex<f64>,
    reads: AtomicU64,
    faults: Faults,
}

impl SimRangingSensor {
    pub fn new(id: impl Into<String>, distance_m: f64) -> Self {
        Self {
            id: id.into(),
            distance_m: Mutex::new(distance_m),
            reads: AtomicU64::new(0),
            faults: Faults::default(),
        }
    }

    pub fn set_distance(&self, distance_m: f64) {
        *lock(&self.distance_m) = distance_m;
    }

    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::Release);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.faults.stalled.store(stalled, Ordering::Release);
    }

    /// Number of reads served (successful or not).
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RangingSensor for SimRangingSensor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read(&self) -> Result<SensorSample, SensorError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.faults.gate().await {
            return Err(SensorError::ReadFailed {
                sensor: self.id.clone(),
                details: "simulated read fault".to_string(),
            });
        }
        Ok(SensorSample {
            distance_m: *lock(&self.distance_m),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orientation sensor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated orientation source returning a settable attitude.
pub struct SimOrientationSensor {
    id: String,
    sample: Mutex<OrientationSample>,
    faults: Faults,
}

impl SimOrientationSensor {
    /// A level sensor.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sample: Mutex::new(OrientationSample::level()),
            faults: Faults::default(),
        }
    }

    pub fn set_sample(&self, sample: OrientationSample) {
        *lock(&self.sample) = sample;
    }

    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::Release);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.faults.stalled.store(stalled, Ordering::Release);
    }
}

#[async_trait]
impl OrientationSensor for SimOrientationSensor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read(&self) -> Result<OrientationSample, SensorError> {
        if self.faults.gate().await {
            return Err(SensorError::ReadFailed {
                sensor: self.id.clone(),
                details: "simulated read fault".to_string(),
            });
        }
        Ok(*lock(&self.sample))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Perception
// ────────────────────────────────────────────────────────────────────────────

/// A simulated perception service returning a settable detection set for
/// every frame.
#[derive(Default)]
pub struct SimPerception {
    detections: Mutex<Vec<Detection>>,
    last_camera: Mutex<Option<String>>,
    calls: AtomicU64,
    faults: Faults,
}

impl SimPerception {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_detections(&self, detections: Vec<Detection>) {
        *lock(&self.detections) = detections;
    }

    pub fn set_failing(&self, failing: bool) {
        self.faults.failing.store(failing, Ordering::Release);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.faults.stalled.store(stalled, Ordering::Release);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Camera name passed to the most recent `detect` call.
    pub fn last_camera(&self) -> Option<String> {
        lock(&self.last_camera).clone()
    }
}

#[async_trait]
impl PerceptionService for SimPerception {
    async fn detect(&self, camera: &str) -> Result<Vec<Detection>, PerceptionError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_camera) = Some(camera.to_string());
        if self.faults.gate().await {
            return Err(PerceptionError::DetectFailed {
                camera: camera.to_string(),
                details: "simulated inference fault".to_string(),
            });
        }
        Ok(lock(&self.detections).clone())
    }
}
