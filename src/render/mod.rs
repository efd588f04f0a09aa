//! Compositing of field values onto corrected pages.

pub mod checkbox;
pub mod shaping;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{imageops, Rgb, RgbImage, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::fields::Detection;
use crate::session::{FieldBox, FieldKind, UIField};
use crate::utils::lang_utils::LanguageDirection;

pub use checkbox::{draw_check_mark, MarkStyle};
pub use shaping::visual_order;

const TEXT_PADDING: u32 = 4;
const MIN_FONT_PX: f32 = 8.0;
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const ANNOTATION: Rgb<u8> = Rgb([0, 90, 255]);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to read font file: {path}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font file: {path}")]
    InvalidFont { path: PathBuf },
}

/// Value entered for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Checked(bool),
    Text(String),
}

impl FieldValue {
    /// Whether a checkbox should be ticked.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Checked(checked) => *checked,
            FieldValue::Text(text) => matches!(
                text.trim().to_lowercase().as_str(),
                "true" | "yes" | "y" | "1" | "x" | "checked" | "\u{2713}" | "نعم"
            ),
        }
    }
}

/// Signature image destined for one field.
#[derive(Debug, Clone)]
pub struct Signature {
    pub box_id: String,
    pub image: RgbaImage,
}

fn load_font(path: &Path) -> Result<FontArc, RenderError> {
    let bytes = std::fs::read(path).map_err(|source| RenderError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|_| RenderError::InvalidFont {
        path: path.to_path_buf(),
    })
}

/// Draws field values onto page images.
#[derive(Clone, Default)]
pub struct Renderer {
    text_font: Option<FontArc>,
    symbol_font: Option<FontArc>,
}

impl Renderer {
    pub fn new(text_font: Option<FontArc>, symbol_font: Option<FontArc>) -> Self {
        Self {
            text_font,
            symbol_font,
        }
    }

    pub fn from_font_files(text: Option<&Path>, symbol: Option<&Path>) -> Result<Self, RenderError> {
        Ok(Self::new(
            text.map(load_font).transpose()?,
            symbol.map(load_font).transpose()?,
        ))
    }

    /// Starting font size: half the average textbox height.
    fn base_font_size(fields: &[UIField]) -> f32 {
        let heights: Vec<f32> = fields
            .iter()
            .filter(|f| f.kind == FieldKind::Textbox)
            .map(|f| f.bounds.height as f32)
            .collect();
        if heights.is_empty() {
            return 20.0;
        }
        (heights.iter().sum::<f32>() / heights.len() as f32 * 0.5).max(MIN_FONT_PX)
    }

    /// Largest size not above `start` at which `text` fits `max_width`.
    fn fit_font_size(font: &FontArc, text: &str, start: f32, max_width: u32) -> f32 {
        let mut size = start;
        while size > MIN_FONT_PX {
            let (w, _) = text_size(PxScale::from(size), font, text);
            if w <= max_width {
                return size;
            }
            size *= 0.9;
        }
        MIN_FONT_PX
    }

    fn draw_text(
        &self,
        canvas: &mut RgbImage,
        bounds: FieldBox,
        text: &str,
        size: f32,
        direction: LanguageDirection,
    ) {
        let Some(font) = self.text_font.as_ref() else {
            warn!("No text font configured, skipping text value");
            return;
        };
        if text.trim().is_empty() {
            return;
        }

        let visual = visual_order(text, direction);
        let max_width = bounds.width.saturating_sub(2 * TEXT_PADDING).max(1);
        let size = Self::fit_font_size(font, &visual, size.min(bounds.height as f32), max_width);
        let scale = PxScale::from(size);
        let (w, h) = text_size(scale, font, &visual);

        let x = if direction.is_rtl() {
            bounds.right() as i32 - TEXT_PADDING as i32 - w as i32
        } else {
            (bounds.x + TEXT_PADDING) as i32
        };
        let y = bounds.y as i32 + (bounds.height as i32 - h as i32) / 2;
        draw_text_mut(canvas, INK, x, y, scale, font, &visual);
    }

    /// Fits `signature` into `bounds`, centered, and alpha-blends it.
    fn blend_signature(canvas: &mut RgbImage, bounds: FieldBox, signature: &RgbaImage) {
        if signature.width() == 0 || signature.height() == 0 {
            return;
        }
        let avail_w = bounds.width.saturating_sub(4).max(1) as f32;
        let avail_h = bounds.height.saturating_sub(4).max(1) as f32;
        let factor = (avail_w / signature.width() as f32).min(avail_h / signature.height() as f32);
        let w = ((signature.width() as f32 * factor).round() as u32).max(1);
        let h = ((signature.height() as f32 * factor).round() as u32).max(1);
        let resized = imageops::resize(signature, w, h, imageops::FilterType::Lanczos3);

        let ox = bounds.x + (bounds.width.saturating_sub(w)) / 2;
        let oy = bounds.y + (bounds.height.saturating_sub(h)) / 2;

        for (sx, sy, px) in resized.enumerate_pixels() {
            let (x, y) = (ox + sx, oy + sy);
            if x >= canvas.width() || y >= canvas.height() {
                continue;
            }
            let alpha = px.0[3] as f32 / 255.0;
            if alpha <= 0.0 {
                continue;
            }
            let dst = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                dst.0[c] = (px.0[c] as f32 * alpha + dst.0[c] as f32 * (1.0 - alpha)).round() as u8;
            }
        }
    }

    /// Draws `values` into their fields on a copy of `image`.
    ///
    /// Values whose key matches no field are ignored. The output always has
    /// the dimensions of `image`.
    pub fn render(
        &self,
        image: &RgbImage,
        fields: &[UIField],
        values: &HashMap<String, FieldValue>,
        direction: LanguageDirection,
        signature: Option<&Signature>,
    ) -> RgbImage {
        let mut canvas = image.clone();
        let base_size = Self::base_font_size(fields);

        for field in fields {
            let Some(bounds) = field.bounds.clamped(canvas.width(), canvas.height()) else {
                continue;
            };

            if let Some(sig) = signature.filter(|s| s.box_id == field.box_id) {
                Self::blend_signature(&mut canvas, bounds, &sig.image);
                continue;
            }

            let Some(value) = values.get(&field.box_id) else {
                continue;
            };

            match (field.kind, value) {
                (FieldKind::Checkbox, value) => {
                    if value.is_truthy() {
                        let style =
                            draw_check_mark(&mut canvas, bounds, self.symbol_font.as_ref(), INK);
                        debug!(box_id = %field.box_id, ?style, "Checked box");
                    }
                }
                (FieldKind::Textbox, FieldValue::Text(text)) => {
                    self.draw_text(&mut canvas, bounds, text, base_size, direction);
                }
                (FieldKind::Textbox, FieldValue::Checked(_)) => {
                    debug!(box_id = %field.box_id, "Ignoring boolean value for text field");
                }
            }
        }

        canvas
    }

    /// Outlines and numbers detections for the labeler. Numbers start at 1
    /// and follow the slice order.
    pub fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();

        for (i, detection) in detections.iter().enumerate() {
            let Some(bounds) = detection.bounds.clamped(canvas.width(), canvas.height()) else {
                continue;
            };

            for y in bounds.y..bounds.bottom() {
                for x in bounds.x..bounds.right() {
                    let px = canvas.get_pixel_mut(x, y);
                    for c in 0..3 {
                        px.0[c] = ((px.0[c] as u32 * 7 + ANNOTATION.0[c] as u32 * 3) / 10) as u8;
                    }
                }
            }
            let rect = Rect::at(bounds.x as i32, bounds.y as i32).of_size(bounds.width, bounds.height);
            draw_hollow_rect_mut(&mut canvas, rect, ANNOTATION);

            if let Some(font) = self.text_font.as_ref() {
                let size = (bounds.height as f32 * 0.8).clamp(MIN_FONT_PX, 32.0);
                draw_text_mut(
                    &mut canvas,
                    ANNOTATION,
                    bounds.x as i32 + 2,
                    bounds.y as i32 + 1,
                    PxScale::from(size),
                    font,
                    &(i + 1).to_string(),
                );
            }
        }

        canvas
    }
}
