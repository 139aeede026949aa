//! Integration tests for what lands in the framebuffer
//!
//! These tests verify that:
//! - Images written to a target read back unchanged in their own format
//! - Gradient, pattern and custom paints shade the expected pixels
//! - Text, strokes, clears and area copies place pixels where expected
//! - Target-to-target draws work with and without a shared context

use glaze_core::{
    Color, CustomPaint, DeviceContextId, Graphics2D, IntRect, Paint, PixelFormat, PixelSurface,
    Point, Rect, Stroke,
};
use glaze_gl::headless::GlCall;
use glaze_gl::{HeadlessContextManager, RenderThread, SharedRenderThread, SurfaceRenderTarget};
use std::sync::Arc;

const RED: u32 = 0xFFFF0000;
const GREEN: u32 = 0xFF00FF00;
const BLUE: u32 = 0xFF0000FF;

fn window(width: u32, height: u32) -> (SharedRenderThread, SurfaceRenderTarget) {
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(width, height);
    let rt = RenderThread::with_defaults(manager);
    let target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();
    (rt, target)
}

fn pixel(target: &SurfaceRenderTarget, x: u32, y: u32) -> u32 {
    target.snapshot().unwrap().argb_at(x, y).unwrap()
}

fn channels(argb: u32) -> [u32; 4] {
    [argb >> 24, (argb >> 16) & 0xFF, (argb >> 8) & 0xFF, argb & 0xFF]
}

fn gl_log(rt: &SharedRenderThread) -> Vec<GlCall> {
    let mut rt = rt.borrow_mut();
    let manager = rt.manager_as::<HeadlessContextManager>().unwrap();
    manager.headless().log().to_vec()
}

fn assert_round_trip(format: PixelFormat, palette: Option<Vec<u32>>, argb: &[u32]) {
    let rt = RenderThread::with_defaults(HeadlessContextManager::new());
    let mut target = SurfaceRenderTarget::offscreen(&rt, 4, 3).unwrap();
    let image = PixelSurface::from_argb(4, 3, format, palette.clone(), argb).unwrap();

    target.draw_image(&image, Point::ZERO, None).unwrap();
    let back = target.snapshot_as(format, palette).unwrap();

    assert_eq!(back.format(), format);
    let expected = image.read(|d| d.to_vec());
    let actual = back.read(|d| d.to_vec());
    assert_eq!(actual, expected, "{format:?} round trip");
}

/// Packed-int pixels survive a write and top-down read-back
#[test]
fn test_packed_int_round_trip() {
    let argb: Vec<u32> = (0..12u32)
        .map(|i| 0xFF000000 | (i * 20) << 16 | (255 - i * 20) << 8 | (i * 7))
        .collect();
    assert_round_trip(PixelFormat::IntArgb, None, &argb);
    assert_round_trip(PixelFormat::IntRgb, None, &argb);
}

/// Gray pixels survive a write and read-back
#[test]
fn test_byte_gray_round_trip() {
    let argb: Vec<u32> = (0..12u32)
        .map(|i| {
            let g = i * 21;
            0xFF000000 | g << 16 | g << 8 | g
        })
        .collect();
    assert_round_trip(PixelFormat::ByteGray, None, &argb);
}

/// Indexed pixels map back to the same palette entries
#[test]
fn test_indexed_round_trip() {
    let palette = vec![0xFF000000, 0xFFFFFFFF, 0xFFFF0000, 0xFF00FF00, 0xFF0000FF];
    let argb: Vec<u32> = (0..12).map(|i| palette[i % palette.len()]).collect();
    assert_round_trip(PixelFormat::ByteIndexed, Some(palette), &argb);
}

/// Images placed at an offset land at that offset, top row first
#[test]
fn test_image_lands_at_offset() {
    let (_rt, mut target) = window(16, 16);
    let image = PixelSurface::from_argb(2, 2, PixelFormat::IntRgb, None, &[RED, GREEN, BLUE, RED])
        .unwrap();
    target.draw_image(&image, Point::new(5.0, 7.0), None).unwrap();
    assert_eq!(pixel(&target, 5, 7), RED);
    assert_eq!(pixel(&target, 6, 7), GREEN);
    assert_eq!(pixel(&target, 5, 8), BLUE);
    assert_eq!(pixel(&target, 4, 7), 0);
}

/// A scaled image goes through a texture and keeps its orientation
#[test]
fn test_scaled_image_is_textured() {
    let (rt, mut target) = window(16, 16);
    let image = PixelSurface::from_argb(2, 2, PixelFormat::IntRgb, None, &[RED, GREEN, BLUE, RED])
        .unwrap();
    target.scale(4.0, 4.0);
    target.draw_image(&image, Point::ZERO, None).unwrap();
    assert_eq!(pixel(&target, 1, 1), RED);
    assert_eq!(pixel(&target, 6, 1), GREEN);
    assert_eq!(pixel(&target, 1, 6), BLUE);
    assert_eq!(pixel(&target, 6, 6), RED);
    assert_eq!(rt.borrow().texture_cache().len(), 1);
}

/// Transparent image pixels show the background color
#[test]
fn test_background_underpaints_transparent_pixels() {
    let (_rt, mut target) = window(8, 8);
    let image =
        PixelSurface::from_argb(2, 1, PixelFormat::IntArgb, None, &[0x00000000, RED]).unwrap();
    target
        .draw_image(&image, Point::new(1.0, 1.0), Some(Color::BLUE))
        .unwrap();
    assert_eq!(pixel(&target, 1, 1), BLUE);
    assert_eq!(pixel(&target, 2, 1), RED);
}

/// Gradient endpoints sit at the first and last texel centers
#[test]
fn test_gradient_endpoints() {
    let rt = RenderThread::with_defaults(HeadlessContextManager::new());
    let mut target = SurfaceRenderTarget::offscreen(&rt, 100, 4).unwrap();
    target.set_paint(Paint::linear_gradient(
        Point::new(0.0, 0.0),
        Point::new(100.0, 0.0),
        Color::RED,
        Color::BLUE,
    ));

    {
        let mut rt = rt.borrow_mut();
        let manager = rt.manager_as::<HeadlessContextManager>().unwrap();
        let plane = manager.headless().current_state().tex_gen_s;
        let s = |x: f32| plane[0] * x + plane[3];
        assert!((s(0.0) - 0.25).abs() < 1e-5);
        assert!((s(100.0) - 0.75).abs() < 1e-5);
    }

    target.fill_rect(Rect::new(0.0, 0.0, 100.0, 4.0)).unwrap();
    let [_, r0, _, b0] = channels(pixel(&target, 0, 1));
    assert!(r0 >= 250 && b0 <= 5, "start ({r0}, {b0})");
    let [_, r1, _, b1] = channels(pixel(&target, 99, 1));
    assert!(b1 >= 250 && r1 <= 5, "end ({r1}, {b1})");
    let [_, rm, _, bm] = channels(pixel(&target, 50, 1));
    assert!((110..=145).contains(&rm) && (110..=145).contains(&bm));
}

/// Pattern paints tile their image from the anchor
#[test]
fn test_pattern_paint_tiles() {
    let (_rt, mut target) = window(8, 8);
    let tile = PixelSurface::from_argb(2, 2, PixelFormat::IntRgb, None, &[RED, GREEN, GREEN, RED])
        .unwrap();
    target.set_paint(Paint::pattern(tile, Rect::new(0.0, 0.0, 2.0, 2.0)));
    target.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0)).unwrap();
    assert_eq!(pixel(&target, 0, 0), RED);
    assert_eq!(pixel(&target, 1, 0), GREEN);
    assert_eq!(pixel(&target, 2, 0), RED);
    assert_eq!(pixel(&target, 5, 6), GREEN);
}

/// Custom paints are sampled per vertex
#[test]
fn test_custom_paint_is_sampled() {
    let (_rt, mut target) = window(8, 8);
    let paint = CustomPaint::new(7, true, |_| Color::GREEN);
    target.set_paint(Paint::Custom(paint));
    target.fill_rect(Rect::new(2.0, 2.0, 4.0, 4.0)).unwrap();
    assert_eq!(pixel(&target, 3, 3), GREEN);
    assert_eq!(pixel(&target, 0, 0), 0);
}

/// Thin strokes use native lines, dashes become a stipple
#[test]
fn test_thin_and_dashed_lines() {
    let (_rt, mut target) = window(20, 20);
    target.set_color(Color::RED);
    target
        .draw_line(Point::new(2.0, 5.0), Point::new(12.0, 5.0))
        .unwrap();
    assert_eq!(pixel(&target, 5, 5), RED);
    assert_eq!(pixel(&target, 5, 6), 0);

    target.set_stroke(Stroke::new(1.0).with_dash(&[2.0, 2.0], 0.0));
    target
        .draw_line(Point::new(2.0, 10.0), Point::new(12.0, 10.0))
        .unwrap();
    assert_eq!(pixel(&target, 2, 10), RED);
    assert_eq!(pixel(&target, 3, 10), RED);
    assert_eq!(pixel(&target, 4, 10), 0);
    assert_eq!(pixel(&target, 6, 10), RED);
}

/// Wide strokes are tessellated
#[test]
fn test_wide_stroke_covers_its_width() {
    let (_rt, mut target) = window(20, 20);
    target.set_color(Color::BLUE);
    target.set_stroke(Stroke::new(4.0));
    target
        .draw_line(Point::new(0.0, 10.0), Point::new(20.0, 10.0))
        .unwrap();
    assert_eq!(pixel(&target, 10, 8), BLUE);
    assert_eq!(pixel(&target, 10, 11), BLUE);
    assert_eq!(pixel(&target, 10, 13), 0);
}

/// Text goes through cached glyph lists for flat paints
#[test]
fn test_string_draws_glyph_blocks() {
    let (rt, mut target) = window(40, 40);
    target.set_font(Arc::new(glaze_gl::BlockFont::new(1, 10.0)));
    target.set_color(Color::RED);
    target.draw_string("A B", 10.0, 30.0).unwrap();

    // 5x7 blocks on a 6 unit advance, sitting on the baseline
    assert_eq!(pixel(&target, 12, 26), RED);
    assert_eq!(pixel(&target, 12, 31), 0);
    assert_eq!(pixel(&target, 16, 26), 0);
    assert_eq!(pixel(&target, 23, 26), RED);
    {
        let rt = rt.borrow();
        assert_eq!(rt.glyph_cache().len(), 1);
        assert_eq!(rt.glyph_cache().glyph_count(), 2);
    }

    target.draw_string("BA", 0.0, 10.0).unwrap();
    assert_eq!(rt.borrow().glyph_cache().glyph_count(), 2);
}

/// Gradient text falls back to filled outlines
#[test]
fn test_gradient_text_fills_outlines() {
    let (rt, mut target) = window(40, 40);
    target.set_font(Arc::new(glaze_gl::BlockFont::new(1, 10.0)));
    target.set_paint(Paint::linear_gradient(
        Point::new(0.0, 0.0),
        Point::new(40.0, 0.0),
        Color::GREEN,
        Color::GREEN,
    ));
    target.draw_string("A", 10.0, 30.0).unwrap();
    assert_eq!(pixel(&target, 12, 26), GREEN);
    assert!(rt.borrow().glyph_cache().is_empty());
}

/// Clears use the background color regardless of paint and XOR mode
#[test]
fn test_clear_rect_uses_background() {
    let (_rt, mut target) = window(16, 16);
    target.set_background(Color::GREEN);
    target.set_color(Color::RED);
    target.fill_rect(Rect::new(0.0, 0.0, 16.0, 16.0)).unwrap();

    target.set_xor_mode(Color::WHITE);
    target.clear_rect(Rect::new(4.0, 4.0, 4.0, 4.0)).unwrap();
    assert_eq!(pixel(&target, 5, 5), GREEN);
    assert_eq!(pixel(&target, 2, 2), RED);

    target.set_paint_mode();
    target.fill_rect(Rect::new(4.0, 4.0, 2.0, 2.0)).unwrap();
    assert_eq!(pixel(&target, 5, 5), RED);
    assert_eq!(pixel(&target, 7, 7), GREEN);
}

/// Area copies move device pixels by the offset
#[test]
fn test_copy_area() {
    let (_rt, mut target) = window(20, 20);
    target.set_color(Color::RED);
    target.fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0)).unwrap();
    target.copy_area(IntRect::new(0, 0, 5, 5), 10, 10).unwrap();
    assert_eq!(pixel(&target, 12, 12), RED);
    assert_eq!(pixel(&target, 2, 2), RED);
    assert_eq!(pixel(&target, 7, 7), 0);
}

/// Targets reachable from one context are copied on the device
#[test]
fn test_draw_target_copies_natively() {
    let (rt, mut dst) = window(20, 20);
    let mut src = SurfaceRenderTarget::offscreen(&rt, 4, 4).unwrap();
    src.set_color(Color::RED);
    src.fill_rect(Rect::new(0.0, 0.0, 4.0, 2.0)).unwrap();

    dst.draw_target(&src, Point::new(8.0, 8.0)).unwrap();
    assert!(gl_log(&rt)
        .iter()
        .any(|c| matches!(c, GlCall::CopyPixels { .. })));
    assert_eq!(pixel(&dst, 9, 8), RED);
    assert_eq!(pixel(&dst, 9, 11), 0);
    assert_eq!(pixel(&dst, 13, 9), 0);
}

/// Targets on another device are drawn through a texture
#[test]
fn test_draw_target_across_devices() {
    let mut manager = HeadlessContextManager::new();
    let a = manager.create_window_on_device(4, 4, DeviceContextId(1));
    let b = manager.create_window_on_device(20, 20, DeviceContextId(2));
    let rt = RenderThread::with_defaults(manager);
    let mut src = SurfaceRenderTarget::for_window(&rt, &a).unwrap();
    let mut dst = SurfaceRenderTarget::for_window(&rt, &b).unwrap();
    src.set_color(Color::RED);
    src.fill_rect(Rect::new(0.0, 0.0, 4.0, 2.0)).unwrap();

    dst.draw_target(&src, Point::new(8.0, 8.0)).unwrap();
    assert!(!gl_log(&rt)
        .iter()
        .any(|c| matches!(c, GlCall::CopyPixels { .. })));
    assert_eq!(pixel(&dst, 9, 8), RED);
    assert_eq!(pixel(&dst, 9, 9), RED);
    assert_eq!(pixel(&dst, 9, 11), 0);
}

/// Targets of another runtime are drawn from a snapshot
#[test]
fn test_draw_target_across_runtimes() {
    let (_rt_a, mut src) = window(4, 4);
    let (_rt_b, mut dst) = window(12, 12);
    src.set_color(Color::BLUE);
    src.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap();
    dst.draw_target(&src, Point::new(2.0, 2.0)).unwrap();
    assert_eq!(pixel(&dst, 3, 3), BLUE);
    assert_eq!(pixel(&dst, 7, 7), 0);
}

/// Snapshots are cached until the next draw or an explicit scene update
#[test]
fn test_snapshot_cache_invalidation() {
    let (_rt, mut target) = window(4, 4);
    let first = target.snapshot().unwrap();
    assert!(first.ptr_eq(&target.snapshot().unwrap()));

    target.update_scene().unwrap();
    let second = target.snapshot().unwrap();
    assert!(!first.ptr_eq(&second));

    target.set_color(Color::RED);
    target.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
    let third = target.snapshot().unwrap();
    assert!(!second.ptr_eq(&third));
    assert_eq!(third.argb_at(0, 0), Some(RED));
}

/// Child targets share the drawable and start from the parent's state
#[test]
fn test_child_target_shares_drawable() {
    let (rt, mut parent) = window(10, 10);
    parent.set_color(Color::GREEN);
    let mut child = parent.create().unwrap();
    assert_eq!(child.paint(), Paint::Solid(Color::GREEN));
    child.translate(5.0, 5.0);
    child.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
    assert_eq!(pixel(&parent, 6, 6), GREEN);
    assert_eq!(parent.transform(), glaze_core::Affine2D::IDENTITY);
    assert_eq!(rt.borrow().live_targets(), 2);
}

/// A child's draw is visible in the parent's next snapshot
#[test]
fn test_child_draw_refreshes_parent_snapshot() {
    let (_rt, parent) = window(4, 4);
    assert_eq!(pixel(&parent, 1, 1), 0);
    let mut child = parent.create().unwrap();
    child.set_color(Color::BLUE);
    child.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap();
    assert_eq!(pixel(&child, 1, 1), BLUE);
    assert_eq!(pixel(&parent, 1, 1), BLUE);
}

/// Flushing and presenting reach the driver
#[test]
fn test_flush_and_swap() {
    let (rt, target) = window(4, 4);
    target.flush().unwrap();
    target.swap_buffers().unwrap();
    let log = gl_log(&rt);
    assert!(log.contains(&GlCall::Flush));
    assert!(log.iter().any(|c| matches!(c, GlCall::SwapBuffers(_))));
}
