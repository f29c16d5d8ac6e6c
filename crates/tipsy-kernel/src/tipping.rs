//! [`TipDetector`] – decides whether an orientation reading means the robot
//! is tipping over.
//!
//! The collision-recovery monitor holds one detector and asks it about every
//! orientation sample.  Detectors are pure predicates; any closure of the
//! right shape is one too.
//!
//! [`PitchLimit`] is the built-in detector: the robot is tipping once the
//! magnitude of its pitch exceeds a fixed limit.

use tipsy_types::OrientationSample;

/// Default pitch magnitude beyond which [`PitchLimit`] reports tipping.
pub const DEFAULT_PITCH_LIMIT_DEG: f64 = 20.0;

// ────────────────────────────────────────────────────────────────────────────
// TipDetector trait
// ────────────────────────────────────────────────────────────────────────────

/// A predicate over one orientation sample.
pub trait TipDetector: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// `true` when `sample` indicates the robot is tipping.
    fn is_tipping(&self, sample: &OrientationSample) -> bool;
}

impl<F> TipDetector for F
where
    F: Fn(&OrientationSample) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        "custom"
    }

    fn is_tipping(&self, sample: &OrientationSample) -> bool {
        self(sample)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in detector
// ────────────────────────────────────────────────────────────────────────────

/// Tipping when `|pitch| > limit_deg`.
///
/// # Example
///
/// ```
/// use tipsy_kernel::tipping::{PitchLimit, TipDetector};
/// use tipsy_types::OrientationSample;
///
/// let detector = PitchLimit::default();
/// assert!(!detector.is_tipping(&OrientationSample::level()));
/// assert!(detector.is_tipping(&OrientationSample::pitched(-35.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchLimit {
    pub limit_deg: f64,
}

impl PitchLimit {
    pub fn new(limit_deg: f64) -> Self {
        Self { limit_deg }
    }
}

impl Default for PitchLimit {
    fn default() -> Self {
        Self::new(DEFAULT_PITCH_LIMIT_DEG)
    }
}

impl TipDetector for PitchLimit {
    fn name(&self) -> &str {
        "pitch_limit"
    }

    fn is_tipping(&self, sample: &OrientationSample) -> bool {
        sample.pitch_deg.abs() > self.limit_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_not_tipping() {
        assert!(!PitchLimit::default().is_tipping(&OrientationSample::level()));
    }

    #[test]
    fn limit_is_exclusive() {
        let detector = PitchLimit::new(20.0);
        assert!(!detector.is_tipping(&OrientationSample::pitched(20.0)));
        assert!(detector.is_tipping(&OrientationSample::pitched(20.5)));
        assert!(detector.is_tipping(&OrientationSample::pitched(-20.5)));
    }

    #[test]
    fn closures_are_detectors() {
        let always = |_: &OrientationSample| true;
        assert!(always.is_tipping(&OrientationSample::level()));
        assert_eq!(always.name(), "custom");
    }

    #[test]
    fn boxed_detector_dispatch() {
        let detectors: Vec<Box<dyn TipDetector>> = vec![
            Box::new(PitchLimit::new(10.0)),
            Box::new(|s: &OrientationSample| s.roll_deg.abs() > 30.0),
        ];
        let sample = OrientationSample {
            roll_deg: 45.0,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
        };
        let tipping: Vec<_> = detectors
            .iter()
            .filter(|d| d.is_tipping(&sample))
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(tipping, vec!["custom".to_string()]);
    }
}
