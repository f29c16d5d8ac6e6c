//! Generic `PerceptionService` trait for object-detection inference.

use async_trait::async_trait;
use tipsy_types::{Detection, PerceptionError};

/// A vision service that runs detection on one frame of a named camera.
#[async_trait]
pub trait PerceptionService: Send + Sync {
    /// Capture a frame from `camera` and return every detection in it.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::DetectFailed`] if the frame cannot be
    /// captured or the model call fails.
    async fn detect(&self, camera: &str) -> Result<Vec<Detection>, PerceptionError>;
}
