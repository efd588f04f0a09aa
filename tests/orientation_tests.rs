mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::synthetic_form;
use formsight::inference::InferenceError;
use formsight::orientation::{
    Orientation, OrientationDetector, OrientationOracle, OrientationSource, ProjectionHeuristic,
};
use formsight::utils::image_utils::rotate_image;
use image::{imageops, Rgb, RgbImage};

/// Applies a clockwise content rotation of `degrees`.
fn rotated(image: &RgbImage, degrees: u32) -> RgbImage {
    match degrees {
        90 => imageops::rotate90(image),
        180 => imageops::rotate180(image),
        270 => imageops::rotate270(image),
        _ => image.clone(),
    }
}

/// Detector with fixed scores whose text confidence is high when a red
/// marker sits in the top-left corner.
struct ScriptedDetector {
    scores: [f32; 4],
    confidence_calls: AtomicUsize,
}

impl ScriptedDetector {
    fn new(scores: [f32; 4]) -> Self {
        Self {
            scores,
            confidence_calls: AtomicUsize::new(0),
        }
    }
}

impl OrientationDetector for ScriptedDetector {
    fn detect(&self, _image: &RgbImage) -> Result<[f32; 4], InferenceError> {
        Ok(self.scores)
    }

    fn text_confidence(&self, image: &RgbImage) -> Result<f32, InferenceError> {
        self.confidence_calls.fetch_add(1, Ordering::SeqCst);
        let marker = image.get_pixel(1, 1);
        Ok(if *marker == Rgb([255, 0, 0]) { 0.9 } else { 0.1 })
    }
}

struct BrokenDetector;

impl OrientationDetector for BrokenDetector {
    fn detect(&self, _image: &RgbImage) -> Result<[f32; 4], InferenceError> {
        Err(InferenceError::Unavailable {
            message: "model not loaded".to_string(),
        })
    }

    fn text_confidence(&self, _image: &RgbImage) -> Result<f32, InferenceError> {
        Err(InferenceError::Unavailable {
            message: "model not loaded".to_string(),
        })
    }
}

fn marked_page() -> RgbImage {
    let mut page = RgbImage::from_pixel(40, 60, Rgb([255, 255, 255]));
    for y in 0..3 {
        for x in 0..3 {
            page.put_pixel(x, y, Rgb([255, 0, 0]));
        }
    }
    page
}

#[test]
fn test_heuristic_converges_for_all_rotations() {
    let form = synthetic_form(400, 560);
    let oracle = OrientationOracle::heuristic_only();

    for degrees in [0, 90, 180, 270] {
        let input = rotated(&form, degrees);
        let candidate = oracle.choose(&input);

        assert_eq!(candidate.orientation.degrees(), degrees, "input rotated {degrees}");
        assert_eq!(candidate.source, OrientationSource::ProjectionHeuristic);
        assert_eq!(rotate_image(&input, candidate.orientation), form);
    }
}

#[test]
fn test_heuristic_inconclusive_on_blank_page() {
    let blank = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
    let candidate = ProjectionHeuristic::default().estimate(&blank);

    assert_eq!(candidate.orientation, Orientation::Oriented0);
    assert_eq!(candidate.confidence, 0.0);
}

#[test]
fn test_decisive_detector_is_trusted() {
    let detector = Arc::new(ScriptedDetector::new([0.05, 0.85, 0.05, 0.05]));
    let oracle = OrientationOracle::new(Some(detector.clone()), 0.3);

    let candidate = oracle.choose(&marked_page());

    assert_eq!(candidate.orientation, Orientation::Oriented90);
    assert_eq!(candidate.source, OrientationSource::Detector);
    assert_eq!(detector.confidence_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_indecisive_flip_is_rechecked_and_rejected() {
    // 180 barely beats 0, but the page as given reads better.
    let detector = Arc::new(ScriptedDetector::new([0.4, 0.05, 0.5, 0.05]));
    let oracle = OrientationOracle::new(Some(detector.clone()), 0.3);

    let candidate = oracle.choose(&marked_page());

    assert_eq!(candidate.orientation, Orientation::Oriented0);
    assert_eq!(candidate.source, OrientationSource::TextConfidenceRecheck);
    assert_eq!(detector.confidence_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_indecisive_flip_is_rechecked_and_confirmed() {
    let detector = Arc::new(ScriptedDetector::new([0.4, 0.05, 0.5, 0.05]));
    let oracle = OrientationOracle::new(Some(detector), 0.3);

    let upside_down = imageops::rotate180(&marked_page());
    let candidate = oracle.choose(&upside_down);

    assert_eq!(candidate.orientation, Orientation::Oriented180);
    assert_eq!(candidate.source, OrientationSource::TextConfidenceRecheck);
}

#[test]
fn test_decisive_flip_skips_recheck() {
    let detector = Arc::new(ScriptedDetector::new([0.05, 0.05, 0.85, 0.05]));
    let oracle = OrientationOracle::new(Some(detector.clone()), 0.3);

    let candidate = oracle.choose(&marked_page());

    assert_eq!(candidate.orientation, Orientation::Oriented180);
    assert_eq!(candidate.source, OrientationSource::Detector);
    assert_eq!(detector.confidence_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_raw_logits_are_normalized() {
    let detector = Arc::new(ScriptedDetector::new([-2.0, 1.0, 5.0, 0.0]));
    let oracle = OrientationOracle::new(Some(detector), 0.3);

    let candidate = oracle.choose(&marked_page());

    assert_eq!(candidate.orientation, Orientation::Oriented180);
    assert!(candidate.confidence > 0.9 && candidate.confidence <= 1.0);
}

#[test]
fn test_failing_detector_falls_back_to_heuristic() {
    let form = synthetic_form(400, 560);
    let oracle = OrientationOracle::new(Some(Arc::new(BrokenDetector)), 0.3);

    let candidate = oracle.choose(&imageops::rotate270(&form));

    assert_eq!(candidate.orientation, Orientation::Oriented270);
    assert_eq!(candidate.source, OrientationSource::ProjectionHeuristic);
}

#[test]
fn test_empty_strategy_chain_defaults_upright() {
    let oracle = OrientationOracle::with_strategies(Vec::new());
    let candidate = oracle.choose(&marked_page());

    assert_eq!(candidate.orientation, Orientation::Oriented0);
    assert_eq!(candidate.source, OrientationSource::Default);
}
