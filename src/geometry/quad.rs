//! Ordered four-corner page borders.

use geo::{Area, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Four corners ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    corners: [(f32, f32); 4],
}

impl Quadrilateral {
    /// Orders arbitrary corners by coordinate sum and difference.
    ///
    /// The smallest `x + y` is top-left and the largest bottom-right; the
    /// smallest `y - x` is top-right and the largest bottom-left. Returns
    /// `None` when two roles land on the same point, which happens for
    /// shapes rotated close to 45 degrees.
    #[must_use]
    pub fn from_unordered(points: [(f32, f32); 4]) -> Option<Self> {
        let by = |key: fn(&(f32, f32)) -> f32, max: bool| -> usize {
            let mut best = 0;
            for (i, p) in points.iter().enumerate() {
                let better = if max {
                    key(p) > key(&points[best])
                } else {
                    key(p) < key(&points[best])
                };
                if better {
                    best = i;
                }
            }
            best
        };

        let tl = by(|p| p.0 + p.1, false);
        let br = by(|p| p.0 + p.1, true);
        let tr = by(|p| p.1 - p.0, false);
        let bl = by(|p| p.1 - p.0, true);

        let mut seen = [false; 4];
        for i in [tl, tr, br, bl] {
            if seen[i] {
                return None;
            }
            seen[i] = true;
        }

        Some(Self {
            corners: [points[tl], points[tr], points[br], points[bl]],
        })
    }

    #[must_use]
    pub fn corners(&self) -> [(f32, f32); 4] {
        self.corners
    }

    fn polygon(&self) -> Polygon<f64> {
        let ring: Vec<(f64, f64)> = self
            .corners
            .iter()
            .map(|&(x, y)| (x as f64, y as f64))
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Enclosed area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygon().unsigned_area()
    }

    /// True when every turn along the corners has the same handedness.
    #[must_use]
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0f32;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let c = self.corners[(i + 2) % 4];
            let cross = (b.0 - a.0) * (c.1 - b.1) - (b.1 - a.1) * (c.0 - b.0);
            if cross.abs() < f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Upright output size: the longer of each pair of opposing edges.
    #[must_use]
    pub fn output_size(&self) -> (u32, u32) {
        let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        let [tl, tr, br, bl] = self.corners;
        let width = dist(tl, tr).max(dist(bl, br));
        let height = dist(tl, bl).max(dist(tr, br));
        (width.round().max(1.0) as u32, height.round().max(1.0) as u32)
    }

    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            corners: self.corners.map(|(x, y)| (x * factor, y * factor)),
        }
    }

    /// Moves every corner `amount` pixels toward the centroid.
    #[must_use]
    pub fn inset(&self, amount: f32) -> Self {
        let cx = self.corners.iter().map(|c| c.0).sum::<f32>() / 4.0;
        let cy = self.corners.iter().map(|c| c.1).sum::<f32>() / 4.0;
        Self {
            corners: self.corners.map(|(x, y)| {
                let (dx, dy) = (cx - x, cy - y);
                let len = (dx * dx + dy * dy).sqrt();
                if len <= amount {
                    (x, y)
                } else {
                    (x + dx / len * amount, y + dy / len * amount)
                }
            }),
        }
    }

    /// True when each corner lies within `tolerance` pixels of the
    /// matching corner of a `width` x `height` frame.
    #[must_use]
    pub fn hugs_frame(&self, width: u32, height: u32, tolerance: f32) -> bool {
        let right = width.saturating_sub(1) as f32;
        let bottom = height.saturating_sub(1) as f32;
        let frame = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
        self.corners
            .iter()
            .zip(frame.iter())
            .all(|(c, f)| (c.0 - f.0).abs() <= tolerance && (c.1 - f.1).abs() <= tolerance)
    }
}
