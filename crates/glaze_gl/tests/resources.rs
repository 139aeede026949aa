//! Integration tests for native resource lifetimes
//!
//! These tests verify that:
//! - Texture records are created and deleted exactly once per surface
//! - Texture sizing, composite translation and stipple conversion hold over
//!   their whole input ranges
//! - Targets, off-screen buffers, glyph strikes and contexts are released on
//!   disposal, eviction and shutdown, including disposal requested elsewhere

use glaze_core::{
    Affine2D, Color, Composite, CompositeRule, Dash, Graphics2D, Paint, PixelFormat, PixelSurface,
    Point, Rect,
};
use glaze_gl::gl::TextureTarget;
use glaze_gl::texture::padded_size;
use glaze_gl::{
    dash_to_stipple, translate, BlockFont, GlApi, HeadlessContextManager, HeadlessGl,
    RenderConfig, RenderError, RenderThread, SharedRenderThread, SurfaceRenderTarget,
    TextureCache, TextureRecord, TextureUsage,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn with_manager<R>(rt: &SharedRenderThread, f: impl FnOnce(&mut HeadlessContextManager) -> R) -> R {
    let mut rt = rt.borrow_mut();
    f(rt.manager_as::<HeadlessContextManager>().expect("headless manager"))
}

/// Deterministic xorshift sequence
struct Sequence(u64);

impl Sequence {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0 % bound
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Texture Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Arbitrary add/find/remove/cleanup sequences never leak or double-free
#[test]
fn test_texture_cache_sequences_balance() {
    for seed in [1u64, 7, 42, 1234, 0xDEAD_BEEF] {
        let mut seq = Sequence(seed);
        let mut gl = HeadlessGl::new();
        let mut cache = TextureCache::new();
        let mut slots: Vec<Option<PixelSurface>> = vec![None; 6];

        for _ in 0..400 {
            let slot = seq.next(slots.len() as u64) as usize;
            match seq.next(6) {
                0 => {
                    let surface = slots[slot].get_or_insert_with(|| {
                        PixelSurface::new(3, 5, PixelFormat::IntArgb).unwrap()
                    });
                    let record = cache
                        .obtain(&mut gl, surface, TextureUsage::Image, false, false)
                        .unwrap();
                    assert_eq!(cache.find(surface), Some(&record));
                }
                1 => {
                    let surface = slots[slot].get_or_insert_with(|| {
                        PixelSurface::new(2, 2, PixelFormat::ByteGray).unwrap()
                    });
                    let handle = gl.gen_texture().unwrap();
                    let record = TextureRecord {
                        handle,
                        target: TextureTarget::Texture2D,
                        padded_width: 2,
                        padded_height: 2,
                        used_width: 2,
                        used_height: 2,
                    };
                    cache.add(&mut gl, surface, record, TextureUsage::Coverage);
                    assert_eq!(cache.find(surface).map(|r| r.handle), Some(handle));
                }
                2 => {
                    if let Some(surface) = &slots[slot] {
                        cache.remove(&mut gl, surface.id());
                        assert!(cache.find(surface).is_none());
                    }
                }
                3 => slots[slot] = None,
                4 => {
                    cache.cleanup_textures(&mut gl);
                }
                _ => {
                    if let Some(surface) = &slots[slot] {
                        surface.write(|d| d[0] = d[0].wrapping_add(1));
                        if cache.find(surface).is_some() {
                            let before = gl.stats().textures_created;
                            cache
                                .obtain(&mut gl, surface, TextureUsage::Image, false, false)
                                .unwrap();
                            // refreshed in place
                            assert_eq!(gl.stats().textures_created, before);
                        }
                    }
                }
            }
            assert_eq!(gl.live_textures(), cache.len(), "seed {seed}");
            assert_eq!(gl.stats().invalid_deletes, 0, "seed {seed}");
        }

        cache.release_all(&mut gl);
        let stats = gl.stats();
        assert_eq!(stats.textures_created, stats.textures_deleted, "seed {seed}");
        assert_eq!(stats.invalid_deletes, 0);
        assert_eq!(gl.live_textures(), 0);
    }
}

/// Textures of images dropped by the caller are collected on demand
#[test]
fn test_dropped_image_texture_is_collected() {
    init_logging();
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(16, 16);
    let config = RenderConfig {
        cleanup_after_insert: false,
        ..Default::default()
    };
    let rt = RenderThread::new(manager, config);
    let mut target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();

    let image = PixelSurface::new(3, 3, PixelFormat::IntRgb).unwrap();
    target
        .draw_image_transformed(&image, &Affine2D::scale(2.0, 2.0))
        .unwrap();
    assert_eq!(rt.borrow().texture_cache().len(), 1);

    drop(image);
    assert_eq!(rt.borrow_mut().cleanup_textures(), 1);
    assert!(rt.borrow().texture_cache().is_empty());
    with_manager(&rt, |m| assert_eq!(m.headless().live_textures(), 0));
}

/// Padded sizes are the smallest covering powers of two
#[test]
fn test_power_of_two_sizing() {
    let sizes = (1..=300u32).chain([511, 512, 513, 1000, 4095, 4097]);
    for w in sizes {
        let h = (w * 7) % 301 + 1;
        let (pw, ph) = padded_size(w, h, false);
        for (used, padded) in [(w, pw), (h, ph)] {
            assert!(padded.is_power_of_two());
            assert!(padded >= used);
            assert!(padded == 1 || padded / 2 < used, "{used} -> {padded}");
            let fraction = used as f32 / padded as f32;
            assert!(fraction > 0.0 && fraction <= 1.0);
        }
        assert_eq!(padded_size(w, h, true), (w, h));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation Tables
// ─────────────────────────────────────────────────────────────────────────────

/// Every rule, premultiplication, alpha channel and extra alpha is translatable
#[test]
fn test_composite_translation_is_total() {
    for rule in CompositeRule::ALL {
        for premultiplied in [true, false] {
            for has_alpha in [true, false] {
                for alpha in [1.0, 0.5, 0.0] {
                    let setup = translate(Composite::new(rule, alpha), premultiplied, has_alpha);
                    let fast = alpha == 1.0
                        && !has_alpha
                        && matches!(rule, CompositeRule::Src | CompositeRule::SrcOver);
                    assert_eq!(setup.is_disabled(), fast, "{rule:?} {premultiplied} {has_alpha} {alpha}");
                    if setup.premultiply_source {
                        assert!(!premultiplied);
                    }
                    if alpha < 1.0 {
                        assert!(setup.channel_scale.is_some());
                    }
                }
            }
        }
    }
}

/// Expressible dash patterns expand back to their scaled segment lengths
#[test]
fn test_dash_stipple_round_trip() {
    let reduced: [&[u32]; 9] = [
        &[1, 0],
        &[1, 1],
        &[1, 3],
        &[3, 1],
        &[1, 1, 1, 1],
        &[5, 3],
        &[2, 2, 1, 3],
        &[7, 9],
        &[1, 15],
    ];
    for segments in reduced {
        for unit in [1u32, 2, 3, 5] {
            let array: Vec<f32> = segments.iter().map(|&s| (s * unit) as f32).collect();
            let stipple = dash_to_stipple(&Dash::new(&array, 0.0))
                .unwrap_or_else(|| panic!("{array:?} should be expressible"));
            assert_eq!(stipple.factor as u32, unit, "{array:?}");

            let expanded = stipple.expand();
            let mut expected = Vec::with_capacity(expanded.len());
            while expected.len() < expanded.len() {
                for (i, &len) in segments.iter().enumerate() {
                    expected.extend(std::iter::repeat(i % 2 == 0).take((len * unit) as usize));
                }
            }
            expected.truncate(expanded.len());
            assert_eq!(expanded, expected, "{array:?}");
        }
    }
}

/// Periods the 16-bit pattern cannot hold fall back to tessellation
#[test]
fn test_long_dash_periods_are_rejected() {
    for array in [&[16.0, 1.0][..], &[10.0, 7.0], &[31.0, 1.0], &[3.0, 3.0, 3.0, 4.0]] {
        assert!(dash_to_stipple(&Dash::new(array, 0.0)).is_none(), "{array:?}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Target Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Disposal requested from another thread runs on the owning thread
#[test]
fn test_dispose_handle_from_another_thread() {
    init_logging();
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(8, 8);
    let rt = RenderThread::with_defaults(manager);
    let mut target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();

    let handle = target.dispose_handle();
    let reply = std::thread::spawn(move || handle.dispose())
        .join()
        .expect("disposing thread");
    assert!(!target.is_disposed());

    assert_eq!(rt.borrow_mut().run_pending(), 1);
    assert!(target.is_disposed());
    assert!(matches!(reply.blocking_recv(), Ok(Ok(()))));

    let err = target.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap_err();
    assert!(matches!(err, RenderError::Disposed));
}

/// Dropped targets are torn down at the next activation
#[test]
fn test_dropped_target_is_torn_down_on_next_draw() {
    let mut manager = HeadlessContextManager::new();
    let a = manager.create_window(8, 8);
    let b = manager.create_window(8, 8);
    let rt = RenderThread::with_defaults(manager);
    let first = SurfaceRenderTarget::for_window(&rt, &a).unwrap();
    let mut second = SurfaceRenderTarget::for_window(&rt, &b).unwrap();
    assert_eq!(rt.borrow().live_targets(), 2);

    drop(first);
    assert_eq!(rt.borrow().live_targets(), 2);
    second.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0)).unwrap();
    assert_eq!(rt.borrow().live_targets(), 1);
}

/// Off-screen buffer exhaustion is an error until a buffer is released
#[test]
fn test_offscreen_exhaustion_recovers_through_pool() {
    let mut manager = HeadlessContextManager::new();
    manager.offscreen_limit = Some(1);
    let rt = RenderThread::with_defaults(manager);

    let mut first = SurfaceRenderTarget::offscreen(&rt, 8, 8).unwrap();
    let err = SurfaceRenderTarget::offscreen(&rt, 8, 8).unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted { .. }));
    assert_eq!(rt.borrow().live_targets(), 1);

    first.dispose().unwrap();
    assert_eq!(rt.borrow().offscreen_pool().len(), 1);
    let second = SurfaceRenderTarget::offscreen(&rt, 6, 6).unwrap();
    assert_eq!(second.size().unwrap(), (6, 6));
    with_manager(&rt, |m| assert_eq!(m.live_offscreen(), 1));
}

/// A full pool keeps the larger of two released buffers
#[test]
fn test_full_pool_evicts_smaller_buffer() {
    let config = RenderConfig {
        offscreen_pool_capacity: 1,
        ..Default::default()
    };
    let rt = RenderThread::new(HeadlessContextManager::new(), config);
    let mut small = SurfaceRenderTarget::offscreen(&rt, 4, 4).unwrap();
    let mut large = SurfaceRenderTarget::offscreen(&rt, 16, 16).unwrap();
    small.dispose().unwrap();
    large.dispose().unwrap();

    let pooled: Vec<u32> = rt
        .borrow()
        .offscreen_pool()
        .pooled()
        .iter()
        .map(|b| b.width)
        .collect();
    assert_eq!(pooled, vec![16]);
    with_manager(&rt, |m| assert_eq!(m.live_offscreen(), 1));
}

/// Reused buffers start cleared
#[test]
fn test_reused_offscreen_starts_transparent() {
    let rt = RenderThread::with_defaults(HeadlessContextManager::new());
    let mut first = SurfaceRenderTarget::offscreen(&rt, 4, 4).unwrap();
    first.set_color(Color::RED);
    first.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap();
    first.dispose().unwrap();

    let second = SurfaceRenderTarget::offscreen(&rt, 4, 4).unwrap();
    assert_eq!(second.snapshot().unwrap().argb_at(1, 1), Some(0));
}

/// Context creation failures surface from construction
#[test]
fn test_context_creation_failure() {
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(8, 8);
    manager.fail_context_creation = true;
    let rt = RenderThread::with_defaults(manager);
    let err = SurfaceRenderTarget::for_window(&rt, &window).unwrap_err();
    assert!(matches!(err, RenderError::ContextCreation(_)));
    assert_eq!(rt.borrow().live_targets(), 0);
}

/// Texture allocation failures fail the draw, not the target
#[test]
fn test_texture_exhaustion_fails_draw_only() {
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(8, 8);
    let rt = RenderThread::with_defaults(manager);
    let mut target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();
    let image = PixelSurface::new(2, 2, PixelFormat::IntRgb).unwrap();

    with_manager(&rt, |m| m.headless_mut().fail_allocations = true);
    let err = target
        .draw_image_transformed(&image, &Affine2D::scale(2.0, 2.0))
        .unwrap_err();
    assert!(matches!(err, RenderError::ResourceExhausted { .. }));
    target.set_font(Arc::new(BlockFont::new(1, 8.0)));
    assert!(target.draw_string("x", 0.0, 8.0).is_err());

    with_manager(&rt, |m| m.headless_mut().fail_allocations = false);
    target
        .draw_image_transformed(&image, &Affine2D::scale(2.0, 2.0))
        .unwrap();
    target.draw_string("x", 0.0, 8.0).unwrap();
}

/// The glyph cache keeps only its configured number of strikes
#[test]
fn test_glyph_strikes_are_evicted() {
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(64, 16);
    let config = RenderConfig::from_toml_str("glyph_cache_capacity = 2").unwrap();
    let rt = RenderThread::new(manager, config);
    let mut target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();

    for id in 1..=3 {
        target.set_font(Arc::new(BlockFont::new(id, 10.0)));
        target.draw_string("AB", 0.0, 12.0).unwrap();
    }
    assert_eq!(rt.borrow().glyph_cache().len(), 2);
    assert_eq!(rt.borrow().glyph_cache().glyph_count(), 4);
    with_manager(&rt, |m| {
        assert_eq!(m.headless().live_lists(), 4);
        assert_eq!(m.headless().stats().invalid_deletes, 0);
    });
}

/// Shutdown releases every native object the runtime created
#[test]
fn test_shutdown_releases_everything() {
    init_logging();
    let mut manager = HeadlessContextManager::new();
    let window = manager.create_window(32, 32);
    let rt = RenderThread::with_defaults(manager);
    let mut target = SurfaceRenderTarget::for_window(&rt, &window).unwrap();
    let mut offscreen = SurfaceRenderTarget::offscreen(&rt, 8, 8).unwrap();

    target.set_font(Arc::new(BlockFont::new(1, 10.0)));
    target.draw_string("hello", 0.0, 12.0).unwrap();
    target.set_paint(Paint::linear_gradient(
        Point::ZERO,
        Point::new(32.0, 0.0),
        Color::RED,
        Color::BLUE,
    ));
    target.fill_rect(Rect::new(0.0, 16.0, 32.0, 8.0)).unwrap();
    let image = PixelSurface::new(4, 4, PixelFormat::IntArgb).unwrap();
    offscreen
        .draw_image_transformed(&image, &Affine2D::rotation(0.3))
        .unwrap();
    target.draw_target(&offscreen, Point::new(1.0, 1.0)).unwrap();

    rt.borrow_mut().shutdown();

    assert!(target.is_disposed());
    assert!(offscreen.is_disposed());
    assert_eq!(rt.borrow().live_targets(), 0);
    with_manager(&rt, |m| {
        let gl = m.headless();
        assert_eq!(gl.live_textures(), 0);
        assert_eq!(gl.live_lists(), 0);
        assert_eq!(gl.stats().invalid_deletes, 0);
        assert_eq!(gl.stats().unbound_deletes, 0);
        assert_eq!(m.live_contexts(), 0);
        assert_eq!(m.live_offscreen(), 0);
    });
}

/// Shutdown binds a scratch buffer to delete textures outliving every target
#[test]
fn test_shutdown_without_targets_binds_for_deletes() {
    init_logging();
    let manager = HeadlessContextManager::new();
    let config = RenderConfig::from_toml_str("offscreen_pool_capacity = 0").unwrap();
    let rt = RenderThread::new(manager, config);
    let mut target = SurfaceRenderTarget::offscreen(&rt, 8, 8).unwrap();
    let image = PixelSurface::new(4, 4, PixelFormat::IntArgb).unwrap();
    target
        .draw_image_transformed(&image, &Affine2D::scale(2.0, 2.0))
        .unwrap();
    drop(target);
    assert_eq!(rt.borrow_mut().run_pending(), 1);
    assert_eq!(rt.borrow().live_targets(), 0);
    assert_eq!(rt.borrow().texture_cache().len(), 1);

    rt.borrow_mut().shutdown();

    with_manager(&rt, |m| {
        let gl = m.headless();
        assert_eq!(gl.live_textures(), 0);
        assert_eq!(gl.stats().unbound_deletes, 0);
        assert_eq!(m.live_contexts(), 0);
        assert_eq!(m.live_offscreen(), 0);
    });
}
