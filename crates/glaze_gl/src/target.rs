//! Render-target façade
//!
//! A [`SurfaceRenderTarget`] is the [`Graphics2D`] implementation handed to
//! drawing code. Its state lives in the owning [`RenderThread`]; every draw
//! first activates the target through the runtime's validator, so only the
//! state pieces that differ from the previously active target are re-issued.
//!
//! [`RenderThread`]: crate::RenderThread

use crate::blit::{self, BlitSource, TargetBlit};
use crate::dispose::{DisposeHandle, DisposeRequest};
use crate::draw;
use crate::error::{RenderError, Result};
use crate::runtime::{Frame, SharedRenderThread};
use crate::state::{StatePiece, TargetKey, TargetState};
use glaze_core::{
    Affine2D, ClipRegion, Color, Composite, GlyphProvider, Graphics2D, IntRect, NativeWindow,
    Paint, Path, PixelFormat, PixelSurface, Point, PositionedGlyph, Rect, Stroke,
};
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct SurfaceRenderTarget {
    runtime: SharedRenderThread,
    key: TargetKey,
    disposed: bool,
    disposer: mpsc::UnboundedSender<DisposeRequest>,
}

impl std::fmt::Debug for SurfaceRenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRenderTarget")
            .field("key", &self.key)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl SurfaceRenderTarget {
    fn bind(runtime: &SharedRenderThread, key: TargetKey) -> Self {
        let disposer = runtime.borrow().disposal_sender();
        Self {
            runtime: Rc::clone(runtime),
            key,
            disposed: false,
            disposer,
        }
    }

    /// Target drawing into a native window
    pub fn for_window(runtime: &SharedRenderThread, window: &dyn NativeWindow) -> Result<Self> {
        let key = runtime.borrow_mut().create_window_target(window)?;
        Ok(Self::bind(runtime, key))
    }

    /// Target drawing into a pooled off-screen buffer, cleared to transparent
    pub fn offscreen(runtime: &SharedRenderThread, width: u32, height: u32) -> Result<Self> {
        let key = runtime.borrow_mut().create_offscreen_target(width, height)?;
        Ok(Self::bind(runtime, key))
    }

    /// Second target on the same drawable, starting from a copy of this one's state
    pub fn create(&self) -> Result<Self> {
        self.ensure_live()?;
        let key = self.runtime.borrow_mut().create_child(self.key)?;
        Ok(Self::bind(&self.runtime, key))
    }

    pub fn key(&self) -> TargetKey {
        self.key
    }

    pub fn runtime(&self) -> &SharedRenderThread {
        &self.runtime
    }

    /// Whether the target has been torn down, here or through a [`DisposeHandle`]
    pub fn is_disposed(&self) -> bool {
        self.disposed
            || self
                .runtime
                .try_borrow()
                .map_or(false, |rt| rt.state(self.key).is_err())
    }

    /// Width and height in device pixels
    pub fn size(&self) -> Result<(u32, u32)> {
        self.read(|s| (s.width, s.height))
    }

    /// Handle for disposing this target from another thread
    pub fn dispose_handle(&self) -> DisposeHandle {
        DisposeHandle::new(self.disposer.clone(), self.key)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&TargetState) -> R) -> Result<R> {
        self.ensure_live()?;
        let rt = self.runtime.borrow();
        rt.state(self.key).map(f)
    }

    fn with_frame<R>(&self, f: impl FnOnce(&mut Frame<'_>) -> Result<R>) -> Result<R> {
        self.ensure_live()?;
        self.runtime.borrow_mut().draw(self.key, f)
    }

    fn update(&mut self, pieces: &[StatePiece], f: impl FnOnce(&mut TargetState)) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.runtime.borrow_mut().update(self.key, pieces, f) {
            tracing::warn!(key = ?self.key, error = %e, "state change not applied");
        }
    }

    /// Replace the clip with a device-space region; `None` removes it
    pub fn set_clip_region(&mut self, region: Option<ClipRegion>) {
        self.update(&[StatePiece::Clip], |s| s.set_device_clip(region));
    }

    /// Top-down `IntArgbPre` copy of the target's pixels
    ///
    /// Cached until the next draw or [`update_scene`](Self::update_scene).
    pub fn snapshot(&self) -> Result<PixelSurface> {
        self.ensure_live()?;
        self.runtime.borrow_mut().snapshot(self.key)
    }

    /// Snapshot converted to `format`; palette formats need `palette`
    pub fn snapshot_as(&self, format: PixelFormat, palette: Option<Vec<u32>>) -> Result<PixelSurface> {
        let snapshot = self.snapshot()?;
        let (w, h) = (snapshot.width(), snapshot.height());
        let argb = snapshot.read_argb(IntRect::new(0, 0, w as i32, h as i32), false);
        Ok(PixelSurface::from_argb(w, h, format, palette, &argb)?)
    }

    /// Drop cached read-backs after the drawable changed outside this target
    pub fn update_scene(&self) -> Result<()> {
        self.ensure_live()?;
        self.runtime.borrow_mut().update_scene(self.key)
    }

    pub fn flush(&self) -> Result<()> {
        self.ensure_live()?;
        self.runtime.borrow_mut().flush(self.key)
    }

    pub fn swap_buffers(&self) -> Result<()> {
        self.ensure_live()?;
        self.runtime.borrow_mut().swap_buffers(self.key)
    }

    /// Draw another target's pixels with their top-left corner at `at`
    pub fn draw_target(&mut self, source: &SurfaceRenderTarget, at: Point) -> Result<()> {
        let (w, h) = source.size()?;
        self.draw_target_rect(source, IntRect::new(0, 0, w as i32, h as i32), at, None)
    }

    /// Draw the `src` region of another target
    pub fn draw_target_rect(
        &mut self,
        source: &SurfaceRenderTarget,
        src: IntRect,
        at: Point,
        background: Option<Color>,
    ) -> Result<()> {
        self.ensure_live()?;
        source.ensure_live()?;
        if !Rc::ptr_eq(&self.runtime, &source.runtime) {
            // another thread's runtime: go through the CPU
            let pixels = source.snapshot()?;
            return self.draw_image_rect(&pixels, src, at, background);
        }
        let request = TargetBlit {
            src,
            at,
            transform: None,
            background,
        };
        self.runtime
            .borrow_mut()
            .blit_target(self.key, source.key, request)
    }
}

impl Graphics2D for SurfaceRenderTarget {
    type Error = RenderError;

    fn paint(&self) -> Paint {
        self.read(|s| s.paint.clone()).unwrap_or_default()
    }

    fn set_paint(&mut self, paint: Paint) {
        self.update(
            &[StatePiece::Color, StatePiece::Composite, StatePiece::Paint],
            |s| s.paint = paint,
        );
    }

    fn set_background(&mut self, color: Color) {
        self.update(&[], |s| s.background = color);
    }

    fn transform(&self) -> Affine2D {
        self.read(|s| s.transform).unwrap_or_default()
    }

    fn set_transform(&mut self, transform: Affine2D) {
        self.update(
            &[StatePiece::Transform, StatePiece::Clip, StatePiece::Paint],
            |s| s.transform = transform,
        );
    }

    fn clip(&self) -> Option<ClipRegion> {
        self.read(|s| s.clip.clone()).ok().flatten()
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.update(&[StatePiece::Clip], |s| {
            let device = clip.map(|r| ClipRegion::from_rect(s.transform.transform_rect_bounds(&r).round_out()));
            s.set_device_clip(device);
        });
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.update(&[StatePiece::Clip], |s| {
            let device = s.transform.transform_rect_bounds(&rect).round_out();
            let next = match s.device_clip() {
                Some(current) => current.intersect_rect(&device),
                None => ClipRegion::from_rect(device),
            };
            s.set_device_clip(Some(next));
        });
    }

    fn composite(&self) -> Composite {
        self.read(|s| s.composite).unwrap_or_default()
    }

    fn set_composite(&mut self, composite: Composite) {
        self.update(&[StatePiece::Color, StatePiece::Composite], |s| {
            s.composite = composite
        });
    }

    fn set_xor_mode(&mut self, color: Color) {
        self.update(&[StatePiece::Color, StatePiece::Composite], |s| {
            s.xor_color = Some(color)
        });
    }

    fn set_paint_mode(&mut self) {
        self.update(&[StatePiece::Color, StatePiece::Composite], |s| {
            s.xor_color = None
        });
    }

    fn stroke(&self) -> Stroke {
        self.read(|s| s.stroke.clone()).unwrap_or_default()
    }

    fn set_stroke(&mut self, stroke: Stroke) {
        self.update(&[StatePiece::Stroke], |s| s.stroke = stroke);
    }

    fn set_font(&mut self, font: Arc<dyn GlyphProvider>) {
        self.update(&[], |s| s.font = Some(font));
    }

    fn fill_rect(&mut self, rect: Rect) -> Result<()> {
        self.with_frame(|frame| draw::fill_rect(frame, rect))
    }

    fn clear_rect(&mut self, rect: Rect) -> Result<()> {
        self.with_frame(|frame| draw::clear_rect(frame, rect))
    }

    fn draw_line(&mut self, from: Point, to: Point) -> Result<()> {
        self.draw(&Path::line(from, to))
    }

    fn draw_polyline(&mut self, points: &[Point]) -> Result<()> {
        self.draw(&Path::polyline(points))
    }

    fn draw_polygon(&mut self, points: &[Point]) -> Result<()> {
        self.draw(&Path::polygon(points))
    }

    fn fill(&mut self, path: &Path) -> Result<()> {
        self.with_frame(|frame| draw::fill_path(frame, path))
    }

    fn draw(&mut self, path: &Path) -> Result<()> {
        self.with_frame(|frame| draw::stroke_path(frame, path))
    }

    fn draw_string(&mut self, text: &str, x: f32, y: f32) -> Result<()> {
        self.with_frame(|frame| {
            let Some(font) = frame.state.font.clone() else {
                return Ok(());
            };
            let glyphs = font.layout(text);
            draw::draw_glyphs(frame, &glyphs, x, y)
        })
    }

    fn draw_glyphs(&mut self, glyphs: &[PositionedGlyph], x: f32, y: f32) -> Result<()> {
        self.with_frame(|frame| draw::draw_glyphs(frame, glyphs, x, y))
    }

    fn draw_image(
        &mut self,
        image: &PixelSurface,
        at: Point,
        background: Option<Color>,
    ) -> Result<()> {
        let full = IntRect::new(0, 0, image.width() as i32, image.height() as i32);
        self.draw_image_rect(image, full, at, background)
    }

    fn draw_image_rect(
        &mut self,
        image: &PixelSurface,
        src: IntRect,
        at: Point,
        background: Option<Color>,
    ) -> Result<()> {
        self.with_frame(|frame| {
            let source = BlitSource {
                surface: image,
                rect: src,
                bottom_up: false,
            };
            blit::blit(frame, source, at, None, background)
        })
    }

    fn draw_image_transformed(&mut self, image: &PixelSurface, transform: &Affine2D) -> Result<()> {
        self.with_frame(|frame| {
            let source = BlitSource {
                surface: image,
                rect: IntRect::new(0, 0, image.width() as i32, image.height() as i32),
                bottom_up: false,
            };
            blit::blit(frame, source, Point::ZERO, Some(transform), None)
        })
    }

    fn copy_area(&mut self, area: IntRect, dx: i32, dy: i32) -> Result<()> {
        self.with_frame(|frame| blit::copy_area(frame, area, dx, dy))
    }

    /// Tear the target down now; disposing twice is a no-op
    fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.runtime.borrow_mut().teardown(self.key)
    }
}

impl Drop for SurfaceRenderTarget {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        // the runtime may be borrowed by the caller; defer to its queue
        let request = DisposeRequest {
            key: self.key,
            reply: None,
        };
        if self.disposer.send(request).is_err() {
            tracing::trace!(key = ?self.key, "runtime gone before target drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContextManager;
    use crate::RenderThread;

    fn window_target(width: u32, height: u32) -> (SharedRenderThread, SurfaceRenderTarget) {
        let mut manager = HeadlessContextManager::new();
        let window = manager.create_window(width, height);
        let rt = RenderThread::with_defaults(manager);
        let target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();
        (rt, target)
    }

    #[test]
    fn test_draw_after_dispose_fails() {
        let (_rt, mut target) = window_target(8, 8);
        target.dispose().unwrap();
        target.dispose().unwrap();
        assert!(target.is_disposed());
        let err = target.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap_err();
        assert!(matches!(err, RenderError::Disposed));
    }

    #[test]
    fn test_drop_defers_teardown_to_queue() {
        let (rt, target) = window_target(8, 8);
        drop(target);
        assert_eq!(rt.borrow().live_targets(), 1);
        assert_eq!(rt.borrow_mut().run_pending(), 1);
        assert_eq!(rt.borrow().live_targets(), 0);
    }

    #[test]
    fn test_clip_rect_intersects_in_device_space() {
        let (_rt, mut target) = window_target(100, 100);
        target.translate(5.0, 5.0);
        target.clip_rect(Rect::new(0.0, 0.0, 20.0, 20.0));
        target.clip_rect(Rect::new(10.0, 10.0, 40.0, 40.0));
        let clip = target.clip().unwrap();
        // stored relative to the translation
        assert_eq!(clip.rects(), &[IntRect::new(10, 10, 10, 10)]);
    }

    #[test]
    fn test_getters_survive_disposal() {
        let (_rt, mut target) = window_target(8, 8);
        target.set_color(Color::RED);
        assert_eq!(target.paint(), Paint::Solid(Color::RED));
        target.dispose().unwrap();
        assert_eq!(target.paint(), Paint::default());
        assert_eq!(target.size().unwrap_err().to_string(), "Render target disposed");
    }
}
