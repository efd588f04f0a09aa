//! Gradient and ink-projection fallback for orientation.
//!
//! The text axis comes from gradient-energy anisotropy: the long edges of
//! upright text lines put more Sobel energy into the vertical gradient than
//! the horizontal one, and a quarter turn swaps the two. When the energies
//! are too close to call, ink projection profiles break the tie, since the
//! profile across lines alternates between lines and gaps while the profile
//! along them stays flat. Anisotropy cannot tell a page from its 180-degree
//! flip, so the direction along the axis comes from ascenders outweighing
//! descenders within each line.

use image::{imageops, GrayImage, RgbImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::{Orientation, OrientationCandidate, OrientationSource, OrientationStrategy, StrategyOutcome};
use crate::utils::image_utils::{ink_mask, to_gray};

/// Decides orientation from gradient anisotropy and ink projection
/// profiles. Never declines.
#[derive(Debug, Clone)]
pub struct ProjectionHeuristic {
    /// One gradient energy (or, failing that, one profile's normalized
    /// variance) must exceed the other by this factor to settle the text
    /// axis.
    pub axis_ratio: f32,
    /// Minimum |ascender - descender| balance to flip away from the default.
    pub direction_threshold: f32,
}

impl Default for ProjectionHeuristic {
    fn default() -> Self {
        Self {
            axis_ratio: 1.5,
            direction_threshold: 0.15,
        }
    }
}

/// Total squared Sobel response along x and along y.
fn gradient_energy(gray: &GrayImage) -> (f64, f64) {
    let energy = |response: &image::ImageBuffer<image::Luma<i16>, Vec<i16>>| {
        response
            .pixels()
            .map(|p| {
                let v = p.0[0] as f64;
                v * v
            })
            .sum::<f64>()
    };
    (energy(&horizontal_sobel(gray)), energy(&vertical_sobel(gray)))
}

/// Squared coefficient of variation; scale-free spread of a profile.
fn normalized_variance(profile: &[u32]) -> f32 {
    if profile.is_empty() {
        return 0.0;
    }
    let n = profile.len() as f64;
    let mean = profile.iter().map(|&v| v as f64).sum::<f64>() / n;
    if mean <= f64::EPSILON {
        return 0.0;
    }
    let variance = profile
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (variance / (mean * mean)) as f32
}

fn row_profile(mask: &GrayImage) -> Vec<u32> {
    let mut rows = vec![0u32; mask.height() as usize];
    for (_, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            rows[y as usize] += 1;
        }
    }
    rows
}

fn column_profile(mask: &GrayImage) -> Vec<u32> {
    let mut columns = vec![0u32; mask.width() as usize];
    for (x, _, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            columns[x as usize] += 1;
        }
    }
    columns
}

/// Balance of ink above versus below the dense core of each text line, in
/// [-1, 1]. Positive means more ink above, as with upright Latin or Arabic.
pub(crate) fn ascender_balance(mask: &GrayImage) -> f32 {
    let profile = row_profile(mask);
    let floor = ((mask.width() as f32) * 0.005).max(1.0) as u32;

    let mut above = 0u64;
    let mut below = 0u64;
    let mut y = 0usize;

    while y < profile.len() {
        if profile[y] < floor {
            y += 1;
            continue;
        }
        let start = y;
        while y < profile.len() && profile[y] >= floor {
            y += 1;
        }
        let band = &profile[start..y];

        let peak = band.iter().copied().max().unwrap_or(0);
        let half = peak.div_ceil(2);
        let core_start = band.iter().position(|&v| v >= half).unwrap_or(0);
        let core_end = band.iter().rposition(|&v| v >= half).unwrap_or(band.len() - 1);

        above += band[..core_start].iter().map(|&v| v as u64).sum::<u64>();
        below += band[core_end + 1..].iter().map(|&v| v as u64).sum::<u64>();
    }

    let total = above + below;
    if total == 0 {
        return 0.0;
    }
    (above as f64 - below as f64) as f32 / total as f32
}

impl ProjectionHeuristic {
    /// Whether text lines run vertically, with the winning ratio. `None`
    /// when neither gradients nor profiles favour an axis.
    fn text_axis(&self, gray: &GrayImage, mask: &GrayImage) -> Option<(bool, f32)> {
        let ratio = self.axis_ratio as f64;
        let (across, along) = gradient_energy(gray);
        if along > across * ratio {
            return Some((false, (along / across.max(f64::EPSILON)) as f32));
        }
        if across > along * ratio {
            return Some((true, (across / along.max(f64::EPSILON)) as f32));
        }

        let row_spread = normalized_variance(&row_profile(mask));
        let column_spread = normalized_variance(&column_profile(mask));
        if row_spread > column_spread * self.axis_ratio {
            Some((false, row_spread / column_spread.max(f32::EPSILON)))
        } else if column_spread > row_spread * self.axis_ratio {
            Some((true, column_spread / row_spread.max(f32::EPSILON)))
        } else {
            None
        }
    }

    /// Runs the heuristic directly, returning the candidate.
    pub fn estimate(&self, image: &RgbImage) -> OrientationCandidate {
        let undecided =
            OrientationCandidate::new(Orientation::Oriented0, 0.0, OrientationSource::ProjectionHeuristic);

        if image.width() < 2 || image.height() < 2 {
            return undecided;
        }

        let gray = to_gray(image);
        let (mask, _) = ink_mask(&gray);
        let Some((vertical, axis_strength)) = self.text_axis(&gray, &mask) else {
            return undecided;
        };

        // Bring the lines horizontal under the clockwise-90 hypothesis.
        let balance = if vertical {
            ascender_balance(&imageops::rotate270(&mask))
        } else {
            ascender_balance(&mask)
        };

        let flipped = balance < -self.direction_threshold;
        let orientation = match (vertical, flipped) {
            (false, false) => Orientation::Oriented0,
            (false, true) => Orientation::Oriented180,
            (true, false) => Orientation::Oriented90,
            (true, true) => Orientation::Oriented270,
        };

        let confidence = 0.5 * (axis_strength / (2.0 * self.axis_ratio)).min(1.0) + 0.5 * balance.abs().min(1.0);
        OrientationCandidate::new(orientation, confidence, OrientationSource::ProjectionHeuristic)
    }
}

impl OrientationStrategy for ProjectionHeuristic {
    fn name(&self) -> &'static str {
        "projection_heuristic"
    }

    fn decide(&self, image: &RgbImage) -> StrategyOutcome {
        StrategyOutcome::Decided(self.estimate(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn line_with_ascenders(width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for y in 10..14 {
            for x in 2..width - 2 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 6..10 {
            for x in (4..width - 4).step_by(6) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    #[test]
    fn test_normalized_variance_flat_profile() {
        assert_eq!(normalized_variance(&[5, 5, 5, 5]), 0.0);
        assert_eq!(normalized_variance(&[]), 0.0);
        assert!(normalized_variance(&[0, 10, 0, 10]) > 0.9);
    }

    #[test]
    fn test_ascender_balance_sign_flips_with_page() {
        let mask = line_with_ascenders(60, 20);
        let upright = ascender_balance(&mask);
        let flipped = ascender_balance(&imageops::rotate180(&mask));
        assert!(upright > 0.5);
        assert!((upright + flipped).abs() < 1e-6);
    }

    fn stripes() -> GrayImage {
        GrayImage::from_fn(40, 40, |_, y| {
            if (8..12).contains(&y) || (24..28).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn test_gradient_energy_swaps_with_quarter_turn() {
        let lines = stripes();
        let (across, along) = gradient_energy(&lines);
        assert_eq!(across, 0.0);
        assert!(along > 0.0);

        let (turned_across, turned_along) = gradient_energy(&imageops::rotate90(&lines));
        assert!((turned_across - along).abs() < 1e-6);
        assert!((turned_along - across).abs() < 1e-6);
    }

    #[test]
    fn test_text_axis_from_gradients() {
        let heuristic = ProjectionHeuristic::default();
        let lines = stripes();
        let (axis, strength) = heuristic.text_axis(&lines, &lines).unwrap();
        assert!(!axis);
        assert!(strength > heuristic.axis_ratio);

        let turned = imageops::rotate270(&lines);
        let (axis, _) = heuristic.text_axis(&turned, &turned).unwrap();
        assert!(axis);

        let blank = GrayImage::from_pixel(40, 40, Luma([255]));
        assert!(heuristic.text_axis(&blank, &GrayImage::new(40, 40)).is_none());
    }

    #[test]
    fn test_ascender_balance_symmetric_lines() {
        let mut mask = GrayImage::new(40, 20);
        for y in 8..12 {
            for x in 0..40 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        assert_eq!(ascender_balance(&mask), 0.0);
    }
}
