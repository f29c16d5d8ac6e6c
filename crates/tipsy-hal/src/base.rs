//! Generic `Base` trait for a differential drive base.
//!
//! Drivers implement this trait; the arbiter only ever talks to the trait, so
//! a physical base, a remote session, or a simulation can be swapped without
//! touching any behavior logic.

use async_trait::async_trait;
use tipsy_types::MotionError;

/// A drive base that executes one motion command at a time.
///
/// Every command suspends the caller until the base confirms completion or
/// reports a failure.  Dropping the returned future abandons the wait; the
/// caller is then expected to call [`Base::stop`].
#[async_trait]
pub trait Base: Send + Sync {
    /// Stable identifier for this base, e.g. `"tipsy-base"`.
    fn id(&self) -> &str;

    /// Drive straight for `distance_mm`; the sign encodes direction
    /// (positive = forward, negative = backward).
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::CommandFailed`] if the base rejects or aborts
    /// the command.
    async fn move_straight(&self, distance_mm: i32, speed_mm_s: u32) -> Result<(), MotionError>;

    /// Turn clockwise in place by `degrees` (in `[0, 360)`).
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::CommandFailed`] if the base rejects or aborts
    /// the command.
    async fn spin(&self, degrees: f64, angular_speed_deg_s: f64) -> Result<(), MotionError>;

    /// Halt immediately.  Must be safe to call at any time, including when
    /// no command is in flight (a no-op then).
    async fn stop(&self) -> Result<(), MotionError>;
}
