//! Check mark drawing with a glyph-then-strokes fallback.

use ab_glyph::{Font, FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut, text_size};

use crate::session::FieldBox;

const CHECK_MARK: char = '\u{2713}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkStyle {
    Glyph,
    Strokes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Drawn(MarkStyle),
    Unavailable(&'static str),
}

pub trait CheckMarkStrategy {
    fn draw(&self, canvas: &mut RgbImage, bounds: FieldBox, color: Rgb<u8>) -> MarkOutcome;
}

/// The check mark glyph of a symbol font, when the font has one.
pub struct GlyphCheckMark<'a> {
    pub font: Option<&'a FontArc>,
}

impl CheckMarkStrategy for GlyphCheckMark<'_> {
    fn draw(&self, canvas: &mut RgbImage, bounds: FieldBox, color: Rgb<u8>) -> MarkOutcome {
        let Some(font) = self.font else {
            return MarkOutcome::Unavailable("no symbol font");
        };
        if font.glyph_id(CHECK_MARK).0 == 0 {
            return MarkOutcome::Unavailable("font has no check mark glyph");
        }

        let size = (bounds.width.min(bounds.height) as f32 * 0.9).max(1.0);
        let scale = PxScale::from(size);
        let text = CHECK_MARK.to_string();
        let (w, h) = text_size(scale, font, &text);
        let x = bounds.x as i32 + (bounds.width as i32 - w as i32) / 2;
        let y = bounds.y as i32 + (bounds.height as i32 - h as i32) / 2;
        draw_text_mut(canvas, color, x, y, scale, font, &text);
        MarkOutcome::Drawn(MarkStyle::Glyph)
    }
}

/// Two thick segments forming a check. Always draws.
pub struct StrokeCheckMark;

impl CheckMarkStrategy for StrokeCheckMark {
    fn draw(&self, canvas: &mut RgbImage, bounds: FieldBox, color: Rgb<u8>) -> MarkOutcome {
        let (x, y) = (bounds.x as f32, bounds.y as f32);
        let (w, h) = (bounds.width as f32, bounds.height as f32);

        let start = (x + 0.2 * w, y + 0.55 * h);
        let corner = (x + 0.42 * w, y + 0.78 * h);
        let end = (x + 0.82 * w, y + 0.22 * h);

        let thickness = (w.min(h) / 8.0).round().max(2.0) as i32;
        for offset in -(thickness / 2)..=(thickness / 2) {
            for (dx, dy) in [(offset as f32, 0.0), (0.0, offset as f32)] {
                let shift = |p: (f32, f32)| (p.0 + dx, p.1 + dy);
                draw_line_segment_mut(canvas, shift(start), shift(corner), color);
                draw_line_segment_mut(canvas, shift(corner), shift(end), color);
            }
        }
        MarkOutcome::Drawn(MarkStyle::Strokes)
    }
}

/// Draws a check mark inside `bounds` using the first strategy that can.
pub fn draw_check_mark(
    canvas: &mut RgbImage,
    bounds: FieldBox,
    symbol_font: Option<&FontArc>,
    color: Rgb<u8>,
) -> MarkStyle {
    let strategies: [&dyn CheckMarkStrategy; 2] =
        [&GlyphCheckMark { font: symbol_font }, &StrokeCheckMark];

    for strategy in strategies {
        match strategy.draw(canvas, bounds, color) {
            MarkOutcome::Drawn(style) => return style,
            MarkOutcome::Unavailable(reason) => {
                tracing::debug!(reason, "Check mark strategy unavailable");
            }
        }
    }
    MarkStyle::Strokes
}
