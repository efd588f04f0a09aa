//! Skew estimation from ink segments.
//!
//! Ink is binarized and lightly dilated so characters merge into line
//! blobs. Each blob's principal axis comes from the second moments of its
//! outer contour. Axis angles are folded modulo 90 degrees, so text lines
//! of a sideways page vote the same way as those of an upright one; long,
//! thin blobs within the skew limit vote and the median wins.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::config::GeometryConfig;
use crate::utils::image_utils::{ink_mask, median, to_gray, WHITE};

/// Minimum ratio of major to minor axis for a blob to count as a segment.
const MIN_ELONGATION: f64 = 5.0;
/// Minimum segment length as a fraction of the image width.
const MIN_LENGTH_FRACTION: f64 = 0.05;
const MIN_LENGTH_PX: f64 = 20.0;
/// Upper bound on estimate-and-rotate rounds in [`deskew`].
const MAX_PASSES: usize = 3;

/// Median angle of the qualifying segments, in degrees. Positive angles
/// descend to the right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkewEstimate {
    pub angle: f32,
    pub segments: usize,
}

/// Angle and length of a contour's principal axis, when it is elongated.
fn principal_axis(contour: &Contour<i32>) -> Option<(f64, f64)> {
    let n = contour.points.len() as f64;
    if contour.points.len() < 8 {
        return None;
    }

    let cx = contour.points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = contour.points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let (mut mu20, mut mu02, mut mu11) = (0.0, 0.0, 0.0);
    for p in &contour.points {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mu20 += dx * dx;
        mu02 += dy * dy;
        mu11 += dx * dy;
    }
    mu20 /= n;
    mu02 /= n;
    mu11 /= n;

    let spread = ((mu20 - mu02).powi(2) + 4.0 * mu11 * mu11).sqrt();
    let major = (mu20 + mu02 + spread) / 2.0;
    let minor = ((mu20 + mu02 - spread) / 2.0).max(1e-9);

    if (major / minor).sqrt() < MIN_ELONGATION {
        return None;
    }

    let angle = 0.5 * (2.0 * mu11).atan2(mu20 - mu02);
    let length = (12.0 * major).sqrt();
    Some((angle.to_degrees(), length))
}

/// Maps an axis angle into [-45, 45) so horizontal and vertical segments
/// agree.
fn fold_quarter_turn(angle: f64) -> f64 {
    (angle + 45.0).rem_euclid(90.0) - 45.0
}

/// Estimates page skew, or `None` when too few segments qualify.
pub fn estimate_skew(gray: &GrayImage, config: &GeometryConfig) -> Option<SkewEstimate> {
    if gray.width() < 8 || gray.height() < 8 {
        return None;
    }

    let (mask, _) = ink_mask(gray);
    let merged = dilate(&mask, Norm::LInf, 2);
    let min_length = (gray.width() as f64 * MIN_LENGTH_FRACTION).max(MIN_LENGTH_PX);

    let angles: Vec<f32> = find_contours::<i32>(&merged)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(principal_axis)
        .map(|(angle, length)| (fold_quarter_turn(angle), length))
        .filter(|(angle, length)| {
            *length >= min_length && angle.abs() <= config.max_skew_degrees as f64
        })
        .map(|(angle, _)| angle as f32)
        .collect();

    if angles.len() < config.min_skew_segments.max(1) {
        debug!(segments = angles.len(), "Too few segments to estimate skew");
        return None;
    }

    median(&angles).map(|angle| SkewEstimate {
        angle,
        segments: angles.len(),
    })
}

/// Levels the page, returning it with the total rotation applied in degrees
/// (0 when nothing was done) and the number of segments that voted.
/// Dimensions are preserved.
///
/// The result is re-measured after each rotation and the residual folded
/// into the correction, always resampling the input once, so a second call
/// on the output finds nothing left to level.
pub fn deskew(image: RgbImage, config: &GeometryConfig) -> (RgbImage, f32, usize) {
    let Some(estimate) = estimate_skew(&to_gray(&image), config) else {
        return (image, 0.0, 0);
    };

    if estimate.angle.abs() < config.min_skew_degrees {
        debug!(angle = estimate.angle, "Skew below correction threshold");
        return (image, 0.0, estimate.segments);
    }

    let level = |correction: f32| {
        rotate_about_center(
            &image,
            correction.to_radians(),
            Interpolation::Bilinear,
            WHITE,
        )
    };

    let mut correction = -estimate.angle;
    let mut leveled = level(correction);
    for pass in 1..MAX_PASSES {
        match estimate_skew(&to_gray(&leveled), config) {
            Some(residual) if residual.angle.abs() >= config.min_skew_degrees => {
                debug!(pass, residual = residual.angle, "Refining skew correction");
                correction -= residual.angle;
                leveled = level(correction);
            }
            _ => break,
        }
    }
    (leveled, correction, estimate.segments)
}
