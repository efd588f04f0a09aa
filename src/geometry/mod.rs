//! Geometric normalization of photographed and scanned documents.
//!
//! [`GeometryCorrector::correct`] runs, in order:
//!
//! 1. border detection and perspective correction ([`border`], [`quad`])
//! 2. deskew ([`deskew`])
//! 3. orientation ([`crate::orientation`])
//! 4. scale normalization ([`scale`])
//!
//! Each step hands back its (possibly unchanged) image together with what it
//! decided, so "nothing to do" is an ordinary outcome. Only undecodable
//! input is an error.

pub mod border;
pub mod deskew;
pub mod quad;
pub mod scale;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::orientation::{Orientation, OrientationCandidate, OrientationOracle, OrientationSource};
use crate::utils::config::GeometryConfig;
use crate::utils::image_utils::{rotate_image, warp_quad};

pub use deskew::{estimate_skew, SkewEstimate};
pub use quad::Quadrilateral;

/// Pixels trimmed from each detected corner to drop the background rim.
const BORDER_INSET: f32 = 2.0;

#[derive(Error, Debug)]
pub enum CorrectionError {
    #[error("Unreadable image: {message}")]
    ImageDecode { message: String },
}

impl From<image::ImageError> for CorrectionError {
    fn from(e: image::ImageError) -> Self {
        CorrectionError::ImageDecode {
            message: e.to_string(),
        }
    }
}

/// What each step of a correction decided. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionDiagnostics {
    pub input_size: (u32, u32),
    pub border_found: bool,
    pub border: Option<Quadrilateral>,
    /// Rotation applied by deskew in degrees; 0 when skipped.
    pub deskew_angle: f32,
    pub skew_segments: usize,
    pub orientation: OrientationCandidate,
    pub scale_factor: f32,
    pub output_size: (u32, u32),
}

/// Turns a raw page photo into an upright, bounded-size rectangle.
pub struct GeometryCorrector {
    config: GeometryConfig,
    oracle: OrientationOracle,
}

impl GeometryCorrector {
    pub fn new(config: GeometryConfig, oracle: OrientationOracle) -> Self {
        Self { config, oracle }
    }

    /// Corrector using only the projection heuristic for orientation.
    pub fn with_config(config: GeometryConfig) -> Self {
        Self::new(config, OrientationOracle::heuristic_only())
    }

    #[must_use]
    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Decodes `bytes` and corrects the result.
    pub fn correct_bytes(
        &self,
        bytes: &[u8],
    ) -> Result<(RgbImage, CorrectionDiagnostics), CorrectionError> {
        let decoded = image::load_from_memory(bytes)?;
        self.correct(&decoded)
    }

    /// Runs the full pipeline on a decoded image.
    #[instrument(skip_all, fields(width = raw.width(), height = raw.height()))]
    pub fn correct(
        &self,
        raw: &DynamicImage,
    ) -> Result<(RgbImage, CorrectionDiagnostics), CorrectionError> {
        if raw.width() == 0 || raw.height() == 0 {
            return Err(CorrectionError::ImageDecode {
                message: "image has no pixels".to_string(),
            });
        }

        let source = raw.to_rgb8();
        let input_size = source.dimensions();
        let source_limit = input_size.0.max(input_size.1);

        let (image, border) = self.correct_perspective(source);
        let (image, deskew_angle, skew_segments) = deskew::deskew(image, &self.config);
        let (image, orientation) = self.correct_orientation(image);
        let (image, scale_factor) =
            scale::normalize_scale(image, self.config.max_dimension.min(source_limit));

        let diagnostics = CorrectionDiagnostics {
            input_size,
            border_found: border.is_some(),
            border,
            deskew_angle,
            skew_segments,
            orientation,
            scale_factor,
            output_size: image.dimensions(),
        };

        info!(
            border_found = diagnostics.border_found,
            deskew_angle,
            orientation = orientation.orientation.degrees(),
            scale_factor,
            "Corrected document geometry"
        );

        Ok((image, diagnostics))
    }

    /// Perspective step: warps onto the detected border, or passes through.
    pub fn correct_perspective(&self, image: RgbImage) -> (RgbImage, Option<Quadrilateral>) {
        let Some(quad) = border::detect_border(&image, &self.config) else {
            debug!("No page border found, keeping full frame");
            return (image, None);
        };

        let trimmed = quad.inset(BORDER_INSET);
        let (width, height) = trimmed.output_size();
        match warp_quad(&image, &trimmed.corners(), width, height) {
            Ok(warped) => {
                debug!(width, height, "Warped page onto detected border");
                (warped, Some(quad))
            }
            Err(e) => {
                warn!(error = %e, "Perspective warp failed, keeping full frame");
                (image, None)
            }
        }
    }

    /// Orientation step: asks the oracle and undoes the chosen rotation.
    pub fn correct_orientation(&self, image: RgbImage) -> (RgbImage, OrientationCandidate) {
        let candidate = self.oracle.choose(&image);
        if candidate.orientation == Orientation::Oriented0 {
            return (image, candidate);
        }
        (rotate_image(&image, candidate.orientation), candidate)
    }

    /// Scale step on its own, for pages that need no other correction.
    pub fn normalize_scale(&self, image: RgbImage) -> (RgbImage, f32) {
        let limit = self.config.max_dimension;
        scale::normalize_scale(image, limit)
    }

    /// Diagnostics for an image that only went through [`Self::normalize_scale`].
    #[must_use]
    pub fn passthrough_diagnostics(input_size: (u32, u32), scaled: &RgbImage, factor: f32) -> CorrectionDiagnostics {
        CorrectionDiagnostics {
            input_size,
            border_found: false,
            border: None,
            deskew_angle: 0.0,
            skew_segments: 0,
            orientation: OrientationCandidate::new(Orientation::Oriented0, 0.0, OrientationSource::Default),
            scale_factor: factor,
            output_size: scaled.dimensions(),
        }
    }
}

impl Default for GeometryCorrector {
    fn default() -> Self {
        Self::with_config(GeometryConfig::default())
    }
}
