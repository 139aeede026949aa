//! The abstract 2D graphics context implemented by rendering backends

use crate::color::Color;
use crate::composite::Composite;
use crate::geometry::{Affine2D, IntRect, Point, Rect};
use crate::glyph::{GlyphProvider, PositionedGlyph};
use crate::paint::Paint;
use crate::path::Path;
use crate::region::ClipRegion;
use crate::stroke::Stroke;
use crate::surface::PixelSurface;
use std::sync::Arc;

/// Drawing surface with current paint, transform, clip, composite and stroke.
///
/// Coordinates are user space: they pass through the current transform before
/// reaching the device. Clip rectangles are given in user space too.
pub trait Graphics2D {
    /// Error raised when a draw cannot complete.
    type Error: std::error::Error;

    /// Current paint.
    fn paint(&self) -> Paint;

    /// Replace the paint used by fills, strokes and text.
    fn set_paint(&mut self, paint: Paint);

    /// Shorthand for a flat color paint.
    fn set_color(&mut self, color: Color) {
        self.set_paint(Paint::Solid(color));
    }

    /// Color used by `clear_rect` and image underpaint.
    fn set_background(&mut self, color: Color);

    fn transform(&self) -> Affine2D;

    fn set_transform(&mut self, transform: Affine2D);

    /// Post-concatenate `transform` to the current transform.
    fn apply_transform(&mut self, transform: &Affine2D) {
        let next = self.transform().then(transform);
        self.set_transform(next);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.apply_transform(&Affine2D::translation(dx, dy));
    }

    fn rotate(&mut self, angle: f32) {
        self.apply_transform(&Affine2D::rotation(angle));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.apply_transform(&Affine2D::scale(sx, sy));
    }

    fn shear(&mut self, shx: f32, shy: f32) {
        self.apply_transform(&Affine2D::shear(shx, shy));
    }

    /// Current clip in user space; `None` when unclipped.
    fn clip(&self) -> Option<ClipRegion>;

    /// Replace the clip; `None` removes it.
    fn set_clip(&mut self, clip: Option<Rect>);

    /// Intersect the clip with `rect`.
    fn clip_rect(&mut self, rect: Rect);

    fn composite(&self) -> Composite;

    fn set_composite(&mut self, composite: Composite);

    /// Combine source and destination with XOR against `color`.
    fn set_xor_mode(&mut self, color: Color);

    /// Leave XOR mode and return to the current composite.
    fn set_paint_mode(&mut self);

    fn stroke(&self) -> Stroke;

    fn set_stroke(&mut self, stroke: Stroke);

    /// Font used by `draw_string`.
    fn set_font(&mut self, font: Arc<dyn GlyphProvider>);

    fn fill_rect(&mut self, rect: Rect) -> Result<(), Self::Error>;

    /// Fill with the background color, ignoring paint and composite.
    fn clear_rect(&mut self, rect: Rect) -> Result<(), Self::Error>;

    fn draw_rect(&mut self, rect: Rect) -> Result<(), Self::Error> {
        self.draw(&Path::rect(rect))
    }

    fn draw_line(&mut self, from: Point, to: Point) -> Result<(), Self::Error>;

    fn draw_polyline(&mut self, points: &[Point]) -> Result<(), Self::Error>;

    fn draw_polygon(&mut self, points: &[Point]) -> Result<(), Self::Error>;

    fn fill_polygon(&mut self, points: &[Point]) -> Result<(), Self::Error> {
        self.fill(&Path::polygon(points))
    }

    /// Fill the interior of `path` (non-zero winding).
    fn fill(&mut self, path: &Path) -> Result<(), Self::Error>;

    /// Stroke the outline of `path`.
    fn draw(&mut self, path: &Path) -> Result<(), Self::Error>;

    /// Draw `text` with the baseline starting at (x, y).
    fn draw_string(&mut self, text: &str, x: f32, y: f32) -> Result<(), Self::Error>;

    /// Draw pre-positioned glyphs relative to (x, y).
    fn draw_glyphs(&mut self, glyphs: &[PositionedGlyph], x: f32, y: f32)
        -> Result<(), Self::Error>;

    /// Draw `image` with its top-left corner at `at`, underpainted with `background`.
    fn draw_image(
        &mut self,
        image: &PixelSurface,
        at: Point,
        background: Option<Color>,
    ) -> Result<(), Self::Error>;

    /// Draw the `src` region of `image` with its top-left corner at `at`.
    fn draw_image_rect(
        &mut self,
        image: &PixelSurface,
        src: IntRect,
        at: Point,
        background: Option<Color>,
    ) -> Result<(), Self::Error>;

    /// Draw `image` through `transform` and the current transform.
    fn draw_image_transformed(
        &mut self,
        image: &PixelSurface,
        transform: &Affine2D,
    ) -> Result<(), Self::Error>;

    /// Copy a device-space region of this surface by (dx, dy).
    fn copy_area(&mut self, area: IntRect, dx: i32, dy: i32) -> Result<(), Self::Error>;

    /// Release native resources; further draws fail.
    fn dispose(&mut self) -> Result<(), Self::Error>;
}
