//! [`PersonSeekMonitor`] – look for people; approach them or keep looking.
//!
//! Each tick runs detection on one camera frame:
//!
//! - a detection labelled as a person with confidence strictly above the
//!   threshold, and every ranging sensor strictly beyond the clearance,
//!   yields `Approach`;
//! - the same person but something within the clearance yields nothing
//!   (close enough already);
//! - no qualifying person yields an `ExploreSpin` to a random heading.
//!
//! The loop runs at the perception interval, much slower than the safety
//! monitors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tipsy_hal::{PerceptionService, RangingSensor};
use tipsy_types::{Detection, MonitorKind, MotionIntent, PerceptionError, TipsyError};
use tracing::{debug, info};

use super::{HeadingSource, Monitor, ranging, random_heading};
use crate::config::BehaviorConfig;

/// The first detection labelled `label` that scores above `threshold`.
///
/// Confident detections of anything else are logged at `debug`.
pub fn find_person<'a>(
    detections: &'a [Detection],
    label: &str,
    threshold: f64,
) -> Option<&'a Detection> {
    let mut found = None;
    for detection in detections.iter().filter(|d| d.confidence > threshold) {
        if detection.label == label {
            found.get_or_insert(detection);
        } else {
            debug!(label = %detection.label, confidence = detection.confidence, "Detected, not a person");
        }
    }
    found
}

pub struct PersonSeekMonitor {
    perception: Arc<dyn PerceptionService>,
    sensors: Vec<Arc<dyn RangingSensor>>,
    camera: String,
    person_label: String,
    confidence_threshold: f64,
    clearance_m: f64,
    period: Duration,
    query_timeout: Duration,
    heading: HeadingSource,
}

impl PersonSeekMonitor {
    pub fn new(
        config: &BehaviorConfig,
        perception: Arc<dyn PerceptionService>,
        sensors: Vec<Arc<dyn RangingSensor>>,
    ) -> Self {
        Self {
            perception,
            sensors,
            camera: config.camera_name.clone(),
            person_label: config.person_label.clone(),
            confidence_threshold: config.confidence_threshold,
            clearance_m: config.approach_clearance_m,
            period: config.perception_interval(),
            query_timeout: config.query_timeout(),
            heading: Box::new(random_heading),
        }
    }

    /// Replace the random heading source.
    pub fn with_heading(mut self, heading: impl FnMut() -> f64 + Send + Sync + 'static) -> Self {
        self.heading = Box::new(heading);
        self
    }

    async fn detect(&self) -> Result<Vec<Detection>, PerceptionError> {
        tokio::time::timeout(self.query_timeout, self.perception.detect(&self.camera))
            .await
            .map_err(|_| PerceptionError::Timeout {
                camera: self.camera.clone(),
                timeout_ms: self.query_timeout.as_millis() as u64,
            })?
    }
}

#[async_trait]
impl Monitor for PersonSeekMonitor {
    fn kind(&self) -> MonitorKind {
        MonitorKind::PersonSeek
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&mut self) -> Result<Option<MotionIntent>, TipsyError> {
        let detections = self.detect().await?;

        let Some(person) = find_person(&detections, &self.person_label, self.confidence_threshold)
        else {
            let heading = (self.heading)();
            debug!(heading_deg = heading, "No person in view, exploring");
            return Ok(Some(MotionIntent::explore_spin(heading)));
        };
        info!(confidence = person.confidence, "Person detected");

        if ranging::all_farther_than(&self.sensors, self.clearance_m, self.query_timeout).await? {
            Ok(Some(MotionIntent::approach()))
        } else {
            debug!(clearance_m = self.clearance_m, "Person within clearance, holding");
            Ok(None)
        }
    }
}
