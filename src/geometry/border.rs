//! Page border detection.

use geo::{Area, LineString, Polygon};
use image::{imageops, GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use tracing::debug;

use super::quad::Quadrilateral;
use crate::utils::config::GeometryConfig;
use crate::utils::image_utils::{paper_mask, to_gray};

/// Polygon tolerances tried in order, as fractions of the contour perimeter.
const APPROX_EPSILONS: [f64; 5] = [0.01, 0.02, 0.03, 0.04, 0.05];

/// Area enclosed by a contour traced as a closed ring.
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    Polygon::new(LineString::from(ring), vec![]).unsigned_area()
}

/// Reduces a contour to a convex quadrilateral, loosening the tolerance
/// until exactly four vertices remain.
fn approximate_quad(contour: &Contour<i32>) -> Option<Quadrilateral> {
    let perimeter = arc_length(&contour.points, true);

    for fraction in APPROX_EPSILONS {
        let approx = approximate_polygon_dp(&contour.points, fraction * perimeter, true);
        if approx.len() != 4 {
            continue;
        }
        let points = [0, 1, 2, 3].map(|i| (approx[i].x as f32, approx[i].y as f32));
        if let Some(quad) = Quadrilateral::from_unordered(points) {
            if quad.is_convex() {
                return Some(quad);
            }
        }
    }
    None
}

fn working_copy(gray: &GrayImage, target: u32) -> (GrayImage, f32) {
    let longest = gray.width().max(gray.height());
    if target == 0 || longest <= target {
        return (gray.clone(), 1.0);
    }
    let factor = target as f32 / longest as f32;
    let width = ((gray.width() as f32 * factor).round() as u32).max(1);
    let height = ((gray.height() as f32 * factor).round() as u32).max(1);
    (
        imageops::resize(gray, width, height, imageops::FilterType::Triangle),
        factor,
    )
}

/// Finds the page outline in a photographed document.
///
/// Returns `None` when no outer contour large enough reduces to a convex
/// quadrilateral, or when the best one is simply the image frame.
pub fn detect_border(image: &RgbImage, config: &GeometryConfig) -> Option<Quadrilateral> {
    if image.width() < 8 || image.height() < 8 {
        return None;
    }

    let (gray, factor) = working_copy(&to_gray(image), config.detection_dimension);
    let smoothed = gaussian_blur_f32(&gray, 1.0);
    let mask = paper_mask(&smoothed);

    let frame_area = gray.width() as f64 * gray.height() as f64;
    let min_area = frame_area * config.min_border_area_fraction as f64;

    let mut candidates: Vec<(f64, Contour<i32>)> = find_contours::<i32>(&mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| (contour_area(&c.points), c))
        .filter(|(area, _)| *area >= min_area)
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    debug!(candidates = candidates.len(), "Border candidates above minimum area");

    let quad = candidates
        .iter()
        .filter_map(|(_, contour)| approximate_quad(contour))
        .find(|quad| quad.area() >= min_area)?;

    let tolerance =
        gray.width().min(gray.height()) as f32 * config.frame_tolerance_fraction + 1.0;
    if quad.hugs_frame(gray.width(), gray.height(), tolerance) {
        debug!("Largest border is the image frame");
        return None;
    }

    Some(quad.scaled(1.0 / factor))
}
