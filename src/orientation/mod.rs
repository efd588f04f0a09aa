//! Upright-orientation disambiguation.
//!
//! The [`OrientationOracle`] runs an ordered list of strategies and commits
//! to the first one that reaches a decision. The learned detector comes
//! first; the projection heuristic follows and always decides, so
//! [`OrientationOracle::choose`] never fails.

pub mod heuristic;

use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::inference::InferenceError;
use crate::utils::image_utils::rotate_image;

pub use heuristic::ProjectionHeuristic;

/// Page rotation in 90-degree increments.
///
/// A variant names how the content is currently rotated; undoing it with
/// [`rotate_image`] yields the upright page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Upright.
    #[default]
    Oriented0,
    /// Content rotated 90 degrees clockwise.
    Oriented90,
    /// Upside down.
    Oriented180,
    /// Content rotated 270 degrees clockwise (90 degrees counter-clockwise).
    Oriented270,
}

impl Orientation {
    /// All orientations, in the order detector scores are reported.
    pub const ALL: [Orientation; 4] = [
        Orientation::Oriented0,
        Orientation::Oriented90,
        Orientation::Oriented180,
        Orientation::Oriented270,
    ];

    /// Converts a rotation angle in degrees to an [`Orientation`] variant.
    ///
    /// The angle is normalized to [0, 360) and rounded; non-cardinal angles
    /// return `None`.
    pub fn from_rotation_degrees(degrees: f32) -> Option<Self> {
        let normalized = ((degrees % 360.0) + 360.0) % 360.0;

        match normalized.round() as i32 {
            0 | 360 => Some(Orientation::Oriented0),
            90 => Some(Orientation::Oriented90),
            180 => Some(Orientation::Oriented180),
            270 => Some(Orientation::Oriented270),
            _ => None,
        }
    }

    #[must_use]
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Oriented0 => 0,
            Orientation::Oriented90 => 90,
            Orientation::Oriented180 => 180,
            Orientation::Oriented270 => 270,
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        (self.degrees() / 90) as usize
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationSource {
    Detector,
    TextConfidenceRecheck,
    ProjectionHeuristic,
    Default,
}

/// A chosen rotation hypothesis with its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationCandidate {
    pub orientation: Orientation,
    pub confidence: f32,
    pub source: OrientationSource,
}

impl OrientationCandidate {
    #[must_use]
    pub fn new(orientation: Orientation, confidence: f32, source: OrientationSource) -> Self {
        Self {
            orientation,
            confidence,
            source,
        }
    }
}

/// Result of one strategy in the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Decided(OrientationCandidate),
    Declined(String),
}

/// A single way of deciding page orientation.
pub trait OrientationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn decide(&self, image: &RgbImage) -> StrategyOutcome;
}

/// A learned orientation classifier.
///
/// `detect` returns scores for [`Orientation::ALL`] in order. Scores need not
/// be normalized; the oracle applies a softmax when they do not sum to one.
/// `text_confidence` estimates how confidently the image reads as upright
/// text; only relative values between two calls matter.
pub trait OrientationDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<[f32; 4], InferenceError>;

    fn text_confidence(&self, image: &RgbImage) -> Result<f32, InferenceError>;
}

fn normalize_scores(scores: [f32; 4]) -> [f32; 4] {
    let sum: f32 = scores.iter().sum();
    let is_distribution = scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores;
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = scores.map(|s| (s - max).exp());
    let total: f32 = exp.iter().sum();
    exp.map(|e| e / total)
}

/// Runs an [`OrientationDetector`], rechecking indecisive upside-down calls.
pub struct DetectorStrategy {
    detector: Arc<dyn OrientationDetector>,
    decisiveness_margin: f32,
}

impl DetectorStrategy {
    pub fn new(detector: Arc<dyn OrientationDetector>, decisiveness_margin: f32) -> Self {
        Self {
            detector,
            decisiveness_margin,
        }
    }

    /// Compares text confidence of the page read as-is and flipped.
    fn recheck_flip(&self, image: &RgbImage, fallback: OrientationCandidate) -> OrientationCandidate {
        let flipped = rotate_image(image, Orientation::Oriented180);
        let upright = self.detector.text_confidence(image);
        let inverted = self.detector.text_confidence(&flipped);

        match (upright, inverted) {
            (Ok(upright), Ok(inverted)) => {
                debug!(upright, inverted, "Rechecked 180 hypothesis with text confidence");
                if inverted > upright {
                    OrientationCandidate::new(
                        Orientation::Oriented180,
                        inverted,
                        OrientationSource::TextConfidenceRecheck,
                    )
                } else {
                    OrientationCandidate::new(
                        Orientation::Oriented0,
                        upright,
                        OrientationSource::TextConfidenceRecheck,
                    )
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Text confidence recheck failed, keeping detector result");
                fallback
            }
        }
    }
}

impl OrientationStrategy for DetectorStrategy {
    fn name(&self) -> &'static str {
        "detector"
    }

    fn decide(&self, image: &RgbImage) -> StrategyOutcome {
        let scores = match self.detector.detect(image) {
            Ok(scores) => normalize_scores(scores),
            Err(e) => {
                warn!(error = %e, "Orientation detector failed");
                return StrategyOutcome::Declined(e.to_string());
            }
        };

        if scores.iter().any(|s| !s.is_finite()) {
            return StrategyOutcome::Declined("detector returned non-finite scores".to_string());
        }

        let best = Orientation::ALL
            .into_iter()
            .max_by(|a, b| scores[a.index()].total_cmp(&scores[b.index()]))
            .unwrap_or_default();

        let candidate =
            OrientationCandidate::new(best, scores[best.index()], OrientationSource::Detector);

        let margin = scores[Orientation::Oriented180.index()] - scores[Orientation::Oriented0.index()];
        if best == Orientation::Oriented180 && margin < self.decisiveness_margin {
            return StrategyOutcome::Decided(self.recheck_flip(image, candidate));
        }

        StrategyOutcome::Decided(candidate)
    }
}

/// Chooses the rotation that makes a page upright.
pub struct OrientationOracle {
    strategies: Vec<Box<dyn OrientationStrategy>>,
}

impl OrientationOracle {
    /// Detector first when available, projection heuristic as fallback.
    pub fn new(detector: Option<Arc<dyn OrientationDetector>>, decisiveness_margin: f32) -> Self {
        let mut strategies: Vec<Box<dyn OrientationStrategy>> = Vec::new();
        if let Some(detector) = detector {
            strategies.push(Box::new(DetectorStrategy::new(detector, decisiveness_margin)));
        }
        strategies.push(Box::new(ProjectionHeuristic::default()));
        Self { strategies }
    }

    pub fn heuristic_only() -> Self {
        Self::new(None, 0.0)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn OrientationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the first decision of the strategy chain, or upright if every
    /// strategy declines.
    pub fn choose(&self, image: &RgbImage) -> OrientationCandidate {
        for strategy in &self.strategies {
            match strategy.decide(image) {
                StrategyOutcome::Decided(candidate) => {
                    debug!(
                        strategy = strategy.name(),
                        degrees = candidate.orientation.degrees(),
                        confidence = candidate.confidence,
                        "Orientation decided"
                    );
                    return candidate;
                }
                StrategyOutcome::Declined(reason) => {
                    debug!(strategy = strategy.name(), %reason, "Orientation strategy declined");
                }
            }
        }

        OrientationCandidate::new(Orientation::Oriented0, 0.0, OrientationSource::Default)
    }
}

impl Default for OrientationOracle {
    fn default() -> Self {
        Self::heuristic_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rotation_degrees() {
        assert_eq!(Orientation::from_rotation_degrees(0.0), Some(Orientation::Oriented0));
        assert_eq!(Orientation::from_rotation_degrees(-90.0), Some(Orientation::Oriented270));
        assert_eq!(Orientation::from_rotation_degrees(450.0), Some(Orientation::Oriented90));
        assert_eq!(Orientation::from_rotation_degrees(359.7), Some(Orientation::Oriented0));
        assert_eq!(Orientation::from_rotation_degrees(45.0), None);
    }

    #[test]
    fn test_normalize_scores_keeps_distribution() {
        let scores = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(normalize_scores(scores), scores);
    }

    #[test]
    fn test_normalize_scores_applies_softmax_to_logits() {
        let scores = normalize_scores([2.0, 0.0, 0.0, 0.0]);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(scores[0] > scores[1]);
        assert!((scores[1] - scores[3]).abs() < 1e-6);
    }
}
