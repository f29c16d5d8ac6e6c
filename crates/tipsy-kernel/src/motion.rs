//! Primitive execution against a [`Base`].
//!
//! [`execute`] is the only place that talks to the base driver.  It checks a
//! [`Primitive`] before dispatch, then bounds the call with a timeout so a
//! wedged driver surfaces as [`MotionError::Timeout`] rather than hanging
//! the arbiter.

use std::time::Duration;

use tipsy_hal::Base;
use tipsy_types::{MotionError, Primitive};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Reject primitives the base cannot meaningfully execute.
///
/// - spin angles must be finite and within `[0, 360)`
/// - every speed must be strictly positive
pub fn validate(primitive: &Primitive) -> Result<(), MotionError> {
    match *primitive {
        Primitive::MoveStraight { speed_mm_s, .. } if speed_mm_s == 0 => Err(
            MotionError::InvalidPrimitive("move_straight speed must be > 0 mm/s".to_string()),
        ),
        Primitive::Spin { degrees, .. } if !degrees.is_finite() || !(0.0..360.0).contains(&degrees) => {
            Err(MotionError::InvalidPrimitive(format!(
                "spin of {degrees}° is outside [0, 360)"
            )))
        }
        Primitive::Spin {
            angular_speed_deg_s,
            ..
        } if !angular_speed_deg_s.is_finite() || angular_speed_deg_s <= 0.0 => {
            Err(MotionError::InvalidPrimitive(format!(
                "spin speed of {angular_speed_deg_s}°/s must be > 0"
            )))
        }
        _ => Ok(()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Execution
// ────────────────────────────────────────────────────────────────────────────

/// Validate and run one primitive, waiting at most `timeout` for the base.
///
/// Returns once the base reports the motion complete.  Dropping the returned
/// future abandons the wait; callers that preempt must follow up with
/// [`Base::stop`].
pub async fn execute(
    base: &dyn Base,
    primitive: &Primitive,
    timeout: Duration,
) -> Result<(), MotionError> {
    validate(primitive)?;
    debug!(base = base.id(), ?primitive, "Dispatching primitive");

    let call = async {
        match *primitive {
            Primitive::MoveStraight {
                distance_mm,
                speed_mm_s,
            } => base.move_straight(distance_mm, speed_mm_s).await,
            Primitive::Spin {
                degrees,
                angular_speed_deg_s,
            } => base.spin(degrees, angular_speed_deg_s).await,
            Primitive::Stop => base.stop().await,
        }
    };

    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| MotionError::Timeout {
            command: primitive.command().to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipsy_hal::sim::SimBase;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn validate_accepts_standard_primitives() {
        assert!(validate(&Primitive::Stop).is_ok());
        assert!(
            validate(&Primitive::MoveStraight {
                distance_mm: -800,
                speed_mm_s: 100
            })
            .is_ok()
        );
        assert!(
            validate(&Primitive::Spin {
                degrees: 0.0,
                angular_speed_deg_s: 45.0
            })
            .is_ok()
        );
        assert!(
            validate(&Primitive::Spin {
                degrees: 359.9,
                angular_speed_deg_s: 45.0
            })
            .is_ok()
        );
    }

    #[test]
    fn validate_rejects_bad_spins() {
        for degrees in [-1.0, 360.0, f64::NAN, f64::INFINITY] {
            let spin = Primitive::Spin {
                degrees,
                angular_speed_deg_s: 45.0,
            };
            assert!(
                matches!(validate(&spin), Err(MotionError::InvalidPrimitive(_))),
                "{degrees} should be rejected"
            );
        }
        let stalled = Primitive::Spin {
            degrees: 90.0,
            angular_speed_deg_s: 0.0,
        };
        assert!(validate(&stalled).is_err());
    }

    #[test]
    fn validate_rejects_zero_speed_move() {
        let crawl = Primitive::MoveStraight {
            distance_mm: 800,
            speed_mm_s: 0,
        };
        assert!(validate(&crawl).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn execute_dispatches_to_base() {
        let base = SimBase::new("tipsy-base");
        let spin = Primitive::Spin {
            degrees: 90.0,
            angular_speed_deg_s: 45.0,
        };
        execute(&base, &spin, LONG).await.unwrap();
        assert_eq!(base.commands(), vec![spin]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_primitive_never_reaches_base() {
        let base = SimBase::new("tipsy-base");
        let spin = Primitive::Spin {
            degrees: 720.0,
            angular_speed_deg_s: 45.0,
        };
        assert!(execute(&base, &spin, LONG).await.is_err());
        assert!(base.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_base_times_out() {
        let base = SimBase::new("tipsy-base");
        base.set_stalled(true);
        let spin = Primitive::Spin {
            degrees: 90.0,
            angular_speed_deg_s: 45.0,
        };
        let err = execute(&base, &spin, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MotionError::Timeout {
                command: "spin".to_string(),
                timeout_ms: 200
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn base_failure_propagates() {
        let base = SimBase::new("tipsy-base");
        base.set_failing(true);
        let err = execute(
            &base,
            &Primitive::MoveStraight {
                distance_mm: 800,
                speed_mm_s: 250,
            },
            LONG,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MotionError::CommandFailed { .. }));
    }
}
