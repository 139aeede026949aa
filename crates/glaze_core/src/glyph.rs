//! Glyph provider interface consumed by text rendering

use crate::geometry::Point;
use crate::path::Path;

/// A rasterized glyph at some device scale
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    /// Row-major coverage, one byte per pixel, top-down
    pub coverage: Vec<u8>,
    /// Offset from the pen position to the bitmap's top-left corner, device pixels
    pub bearing_x: f32,
    pub bearing_y: f32,
    /// Pen advance, device pixels
    pub advance_x: f32,
    pub advance_y: f32,
}

/// A glyph placed relative to the run origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionedGlyph {
    pub ch: char,
    pub offset: Point,
}

/// Source of glyph images and outlines for one font at one size
pub trait GlyphProvider {
    /// Identity of the font face and size
    fn font_id(&self) -> u64;

    /// Rasterize `ch` at `scale` device pixels per user unit
    ///
    /// `None` for characters without an image (spaces, missing glyphs).
    fn glyph_bitmap(&self, ch: char, scale: f32, antialias: bool) -> Option<GlyphBitmap>;

    /// Outline of `ch` in user space, pen at the origin, baseline at y = 0
    fn glyph_outline(&self, ch: char) -> Option<Path>;

    /// Pen advance in user space
    fn advance(&self, ch: char) -> f32;

    /// Lay out `text` on a single line
    fn layout(&self, text: &str) -> Vec<PositionedGlyph> {
        let mut pen = 0.0;
        text.chars()
            .map(|ch| {
                let glyph = PositionedGlyph {
                    ch,
                    offset: Point::new(pen, 0.0),
                };
                pen += self.advance(ch);
                glyph
            })
            .collect()
    }
}
