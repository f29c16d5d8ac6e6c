//! `tipsy-types` – shared data model for the Tipsy behavior engine.
//!
//! Every crate in the workspace speaks in these types: the locomotion state
//! register, the intents monitors submit to the arbiter, the primitives the
//! arbiter drives the base with, the ephemeral sensor/perception samples, and
//! the error taxonomy.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Motion profile constants
// ────────────────────────────────────────────────────────────────────────────

/// Forward distance covered by one approach.
pub const APPROACH_DISTANCE_MM: u32 = 800;
/// Forward speed used while approaching a person.
pub const APPROACH_SPEED_MM_S: u32 = 250;
/// Angular speed used for every exploratory and recovery spin.
pub const SPIN_SPEED_DEG_S: f64 = 45.0;
/// Distance the base backs away after a tip/collision event.
pub const RECOVER_BACKWARD_MM: u32 = 800;
/// Speed used while backing away.
pub const RECOVER_BACKWARD_SPEED_MM_S: u32 = 100;
/// Turn executed after backing away.
pub const RECOVER_TURN_DEG: f64 = 180.0;

// ────────────────────────────────────────────────────────────────────────────
// Locomotion state
// ────────────────────────────────────────────────────────────────────────────

/// The single shared locomotion register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocomotionState {
    Idle,
    MovingForward,
    MovingBackward,
    Spinning,
}

impl LocomotionState {
    /// `true` for every state except [`LocomotionState::Idle`].
    pub fn is_moving(self) -> bool {
        !matches!(self, LocomotionState::Idle)
    }
}

impl fmt::Display for LocomotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocomotionState::Idle => write!(f, "idle"),
            LocomotionState::MovingForward => write!(f, "moving_forward"),
            LocomotionState::MovingBackward => write!(f, "moving_backward"),
            LocomotionState::Spinning => write!(f, "spinning"),
        }
    }
}

/// A fully-formed read of the locomotion register: the state plus the time
/// the base last entered [`LocomotionState::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocomotionSnapshot {
    pub state: LocomotionState,
    pub last_idle_at: Instant,
}

impl LocomotionSnapshot {
    /// An idle snapshot whose idle period started at `at`.
    pub fn idle_since(at: Instant) -> Self {
        Self {
            state: LocomotionState::Idle,
            last_idle_at: at,
        }
    }

    /// Time elapsed between the last transition into idle and `now`.
    /// Saturates to zero if `now` precedes `last_idle_at`.
    pub fn idle_elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_idle_at)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Intents
// ────────────────────────────────────────────────────────────────────────────

/// The kind of a [`MotionIntent`], ordered by arbitration priority
/// (lowest first, so `Ord` can pick the winner directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    ExploreSpin,
    Approach,
    Stop,
    Recover,
}

impl IntentKind {
    /// Numeric priority; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            IntentKind::ExploreSpin => 0,
            IntentKind::Approach => 1,
            IntentKind::Stop => 2,
            IntentKind::Recover => 3,
        }
    }

    /// `true` for kinds allowed to interrupt an in-flight primitive.
    pub fn preempts(self) -> bool {
        matches!(self, IntentKind::Stop | IntentKind::Recover)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentKind::ExploreSpin => write!(f, "explore_spin"),
            IntentKind::Approach => write!(f, "approach"),
            IntentKind::Stop => write!(f, "stop"),
            IntentKind::Recover => write!(f, "recover"),
        }
    }
}

/// An action requested by a monitor, not yet executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", content = "params", rename_all = "snake_case")]
pub enum MotionIntent {
    /// Halt the base immediately.
    Stop,
    /// Drive straight ahead towards a detected person.
    Approach { distance_mm: u32, speed_mm_s: u32 },
    /// Turn in place to look around.
    ExploreSpin {
        degrees: f64,
        angular_speed_deg_s: f64,
    },
    /// Back away, then turn around.
    Recover {
        backward_distance_mm: u32,
        backward_speed_mm_s: u32,
        turn_degrees: f64,
        turn_speed_deg_s: f64,
    },
}

impl MotionIntent {
    /// The standard approach: 800 mm forward at 250 mm/s.
    pub fn approach() -> Self {
        MotionIntent::Approach {
            distance_mm: APPROACH_DISTANCE_MM,
            speed_mm_s: APPROACH_SPEED_MM_S,
        }
    }

    /// An exploratory spin of `degrees` at the standard angular speed.
    pub fn explore_spin(degrees: f64) -> Self {
        MotionIntent::ExploreSpin {
            degrees,
            angular_speed_deg_s: SPIN_SPEED_DEG_S,
        }
    }

    /// The fixed recovery manoeuvre: back 800 mm at 100 mm/s, then 180° at 45°/s.
    pub fn recover() -> Self {
        MotionIntent::Recover {
            backward_distance_mm: RECOVER_BACKWARD_MM,
            backward_speed_mm_s: RECOVER_BACKWARD_SPEED_MM_S,
            turn_degrees: RECOVER_TURN_DEG,
            turn_speed_deg_s: SPIN_SPEED_DEG_S,
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            MotionIntent::Stop => IntentKind::Stop,
            MotionIntent::Approach { .. } => IntentKind::Approach,
            MotionIntent::ExploreSpin { .. } => IntentKind::ExploreSpin,
            MotionIntent::Recover { .. } => IntentKind::Recover,
        }
    }

    pub fn priority(&self) -> u8 {
        self.kind().priority()
    }

    /// The ordered primitive sequence that carries out this intent.
    ///
    /// Fails with [`MotionError::InvalidPrimitive`] when a distance does not
    /// fit a signed base command.
    pub fn plan(&self) -> Result<Vec<Primitive>, MotionError> {
        let plan = match *self {
            MotionIntent::Stop => vec![Primitive::Stop],
            MotionIntent::Approach {
                distance_mm,
                speed_mm_s,
            } => vec![Primitive::MoveStraight {
                distance_mm: signed_mm(distance_mm)?,
                speed_mm_s,
            }],
            MotionIntent::ExploreSpin {
                degrees,
                angular_speed_deg_s,
            } => vec![Primitive::Spin {
                degrees,
                angular_speed_deg_s,
            }],
            MotionIntent::Recover {
                backward_distance_mm,
                backward_speed_mm_s,
                turn_degrees,
                turn_speed_deg_s,
            } => vec![
                Primitive::MoveStraight {
                    distance_mm: -signed_mm(backward_distance_mm)?,
                    speed_mm_s: backward_speed_mm_s,
                },
                Primitive::Spin {
                    degrees: turn_degrees,
                    angular_speed_deg_s: turn_speed_deg_s,
                },
            ],
        };
        Ok(plan)
    }
}

fn signed_mm(distance_mm: u32) -> Result<i32, MotionError> {
    i32::try_from(distance_mm).map_err(|_| {
        MotionError::InvalidPrimitive(format!("distance {distance_mm} mm is out of range"))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Primitives
// ────────────────────────────────────────────────────────────────────────────

/// One atomic base motion command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Primitive {
    /// Positive distance drives forward, negative drives backward.
    MoveStraight { distance_mm: i32, speed_mm_s: u32 },
    /// Clockwise turn in place; `degrees` is never negative.
    Spin {
        degrees: f64,
        angular_speed_deg_s: f64,
    },
    Stop,
}

impl Primitive {
    /// The state the register holds while this primitive runs.
    /// `None` for [`Primitive::Stop`], which only ever leads into idle.
    pub fn locomotion_state(&self) -> Option<LocomotionState> {
        match self {
            Primitive::MoveStraight { distance_mm, .. } if *distance_mm < 0 => {
                Some(LocomotionState::MovingBackward)
            }
            Primitive::MoveStraight { .. } => Some(LocomotionState::MovingForward),
            Primitive::Spin { .. } => Some(LocomotionState::Spinning),
            Primitive::Stop => None,
        }
    }

    /// Short command name used in logs and error messages.
    pub fn command(&self) -> &'static str {
        match self {
            Primitive::MoveStraight { .. } => "move_straight",
            Primitive::Spin { .. } => "spin",
            Primitive::Stop => "stop",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Ephemeral samples
// ────────────────────────────────────────────────────────────────────────────

/// One ranging-sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Distance to the nearest echo, in metres.
    pub distance_m: f64,
}

/// One object detection from a perception frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label assigned by the model, e.g. `"Person"`.
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Attitude of the base as Euler angles, in degrees. Level is all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSample {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

impl OrientationSample {
    pub fn level() -> Self {
        Self::default()
    }

    pub fn pitched(pitch_deg: f64) -> Self {
        Self {
            pitch_deg,
            ..Self::default()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Monitors
// ────────────────────────────────────────────────────────────────────────────

/// Identity of the four concurrent monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    Obstacle,
    CollisionRecovery,
    PersonSeek,
    IdleTimeout,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 4] = [
        MonitorKind::Obstacle,
        MonitorKind::CollisionRecovery,
        MonitorKind::PersonSeek,
        MonitorKind::IdleTimeout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MonitorKind::Obstacle => "obstacle",
            MonitorKind::CollisionRecovery => "collision_recovery",
            MonitorKind::PersonSeek => "person_seek",
            MonitorKind::IdleTimeout => "idle_timeout",
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus events
// ────────────────────────────────────────────────────────────────────────────

/// Event wrapper published by the arbiter on the locomotion bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocomotionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"tipsy-kernel::arbiter"`
    pub source: String,
    pub payload: LocomotionPayload,
}

impl LocomotionEvent {
    pub fn new(source: impl Into<String>, payload: LocomotionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// What happened on the locomotion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LocomotionPayload {
    StateChanged {
        from: LocomotionState,
        to: LocomotionState,
    },
    /// `coalesced` counts the duplicate submissions folded into this run.
    IntentExecuted {
        intent: MotionIntent,
        coalesced: usize,
    },
    IntentDiscarded {
        intent: MotionIntent,
        winner: IntentKind,
    },
    IntentPreempted {
        intent: MotionIntent,
        by: IntentKind,
    },
    MotionFault {
        intent: MotionIntent,
        error: MotionError,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Ranging or orientation read failure.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorError {
    #[error("Sensor '{sensor}' read failed: {details}")]
    ReadFailed { sensor: String, details: String },

    #[error("Sensor '{sensor}' did not answer within {timeout_ms} ms")]
    Timeout { sensor: String, timeout_ms: u64 },
}

/// Perception inference failure.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerceptionError {
    #[error("Detection on camera '{camera}' failed: {details}")]
    DetectFailed { camera: String, details: String },

    #[error("Detection on camera '{camera}' did not finish within {timeout_ms} ms")]
    Timeout { camera: String, timeout_ms: u64 },
}

/// Base command failure.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionError {
    #[error("Base command '{command}' failed: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Base command '{command}' did not complete within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Invalid primitive: {0}")]
    InvalidPrimitive(String),
}

/// Umbrella error spanning every failure the engine can observe.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TipsyError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Perception(#[from] PerceptionError),

    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Two preempting intents landed in the same cycle. Resolved by
    /// priority; only ever logged.
    #[error("Preemption race: {winner} won over {loser}")]
    PreemptionRace { winner: IntentKind, loser: IntentKind },

    #[error("Arbiter is no longer accepting intents")]
    ArbiterUnavailable,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
