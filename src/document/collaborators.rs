//! Field detection and labeling services the workflow delegates to.

use image::RgbImage;

use super::error::CollaboratorError;
use super::fields::{Detection, LabelingOutcome};

/// Finds fillable regions on a corrected page.
pub trait FieldDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, CollaboratorError>;
}

/// Names detected regions and describes pages.
pub trait FieldLabeler: Send + Sync {
    /// Labels `detections`, which are numbered from 1 on `annotated` in
    /// slice order.
    fn label(
        &self,
        annotated: &RgbImage,
        detections: &[Detection],
    ) -> Result<LabelingOutcome, CollaboratorError>;

    /// Short description of what the page is for.
    fn explain(&self, image: &RgbImage) -> Result<String, CollaboratorError>;
}
