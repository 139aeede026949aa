//! Image transfer onto render targets
//!
//! Two paths: pixels are streamed straight to the raster position when the
//! placement is a pure translation, and drawn as a textured quad otherwise.
//! Target-to-target copies stay on the device when both drawables are reachable
//! from one context.

use crate::composite::translate;
use crate::error::Result;
use crate::format::{prepare_pixels, PixelLayout};
use crate::gl::{
    Capability, Filter, PixelStore, PrimitiveMode, StateCall, TexParam, TextureTarget, Wrap,
};
use crate::runtime::Frame;
use crate::state::{apply_blend, StatePiece, TargetState};
use crate::texture::{with_unpack_state, TextureUsage};
use glaze_core::{Affine2D, Color, IntRect, PixelFormat, PixelSurface, Point};

/// Pieces an image draw may disturb
const IMAGE_PIECES: [StatePiece; 4] = [
    StatePiece::Color,
    StatePiece::Transform,
    StatePiece::Composite,
    StatePiece::Paint,
];

/// A rectangle of CPU pixels to draw
pub(crate) struct BlitSource<'a> {
    pub surface: &'a PixelSurface,
    pub rect: IntRect,
    /// Rows are stored bottom row first (read back from a drawable)
    pub bottom_up: bool,
}

/// Placement of the whole source in user space
fn placement(state: &TargetState, at: Point, extra: Option<&Affine2D>) -> Affine2D {
    let m = state.transform.then(&Affine2D::translation(at.x, at.y));
    match extra {
        Some(extra) => m.then(extra),
        None => m,
    }
}

fn quad(width: f32, height: f32) -> [[f32; 2]; 4] {
    [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
}

fn disable_textures(frame: &mut Frame<'_>) {
    let gl = frame.manager.gl();
    for cap in [
        Capability::TexGenS,
        Capability::TexGenT,
        Capability::Texture1D,
        Capability::Texture2D,
    ] {
        gl.apply(StateCall::Disable(cap));
    }
}

/// Fill the destination rectangle with `background` under `m`
fn underpaint(frame: &mut Frame<'_>, m: &Affine2D, width: f32, height: f32, background: Color) {
    let composite = frame.state.composite;
    disable_textures(frame);
    let gl = frame.manager.gl();
    let color = background.with_alpha(background.a * composite.alpha);
    apply_blend(gl, translate(composite, true, !background.is_opaque()).blend);
    gl.apply(StateCall::Color(color.premultiplied()));
    gl.apply(StateCall::LoadModelview(m.to_matrix4()));
    gl.draw(PrimitiveMode::Quads, &quad(width, height), None, None);
}

/// Draw `source.rect` with its top-left corner at `at` in user space
pub(crate) fn blit(
    frame: &mut Frame<'_>,
    source: BlitSource<'_>,
    at: Point,
    extra: Option<&Affine2D>,
    background: Option<Color>,
) -> Result<()> {
    let bounds = IntRect::new(
        0,
        0,
        source.surface.width() as i32,
        source.surface.height() as i32,
    );
    let Some(rect) = source.rect.intersect(&bounds) else {
        return Ok(());
    };
    frame.invalidate_readback();

    let m = placement(frame.state, at, extra);
    let (w, h) = (rect.width as f32, rect.height as f32);
    let has_alpha = source.surface.has_alpha();
    let xor = frame.state.xor_color.is_some();
    if let Some(bg) = background.filter(|_| has_alpha && !xor) {
        underpaint(frame, &m, w, h, bg);
    }

    if m.is_translation() && !source.bottom_up {
        draw_pixels(frame, source.surface, rect, &m)?;
    } else {
        draw_textured(frame, &source, rect, &m)?;
    }
    frame.restore(&IMAGE_PIECES)
}

/// Stream pixels to the raster position; `m` is a pure translation
fn draw_pixels(
    frame: &mut Frame<'_>,
    surface: &PixelSurface,
    rect: IntRect,
    m: &Affine2D,
) -> Result<()> {
    let (tx, ty) = m.translation_components();
    let window_y = frame.state.flip_y(0, 0) as f32 - ty.round();
    let setup = translate(
        frame.state.composite,
        surface.is_alpha_premultiplied(),
        surface.has_alpha(),
    );
    let xor = frame.state.xor_color.is_some();
    disable_textures(frame);
    let gl = frame.manager.gl();
    if !xor {
        apply_blend(gl, setup.blend);
    }
    gl.apply(StateCall::WindowPos {
        x: tx.round(),
        y: window_y,
    });
    gl.apply(StateCall::PixelZoom { x: 1.0, y: -1.0 });
    surface.read(|raw| {
        let mut prepared = prepare_pixels(surface, rect, setup.premultiply_source, raw);
        if let Some(scale) = setup.channel_scale {
            for (i, s) in scale.into_iter().enumerate() {
                prepared.transfer.scale[i] *= s;
                prepared.transfer.bias[i] *= s;
            }
        }
        with_unpack_state(gl, &prepared, |gl| {
            gl.draw_pixels(
                rect.width as u32,
                rect.height as u32,
                prepared.layout,
                &prepared.data,
            );
        });
    });
    gl.apply(StateCall::PixelZoom { x: 1.0, y: 1.0 });
    Ok(())
}

/// Draw through a cached texture on a quad transformed by `m`
fn draw_textured(
    frame: &mut Frame<'_>,
    source: &BlitSource<'_>,
    rect: IntRect,
    m: &Affine2D,
) -> Result<()> {
    let record = frame.textures.obtain(
        frame.manager.gl(),
        source.surface,
        TextureUsage::Image,
        frame.config.npot_textures,
        frame.config.cleanup_after_insert,
    )?;
    let composite = frame.state.composite;
    let xor = frame.state.xor_color.is_some();
    disable_textures(frame);
    let gl = frame.manager.gl();
    if !xor {
        apply_blend(gl, translate(composite, true, source.surface.has_alpha()).blend);
    }
    gl.apply(StateCall::Color([composite.alpha; 4]));
    gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(record.handle)));
    for param in [
        TexParam::MinFilter(Filter::Nearest),
        TexParam::MagFilter(Filter::Nearest),
        TexParam::WrapS(Wrap::Clamp),
        TexParam::WrapT(Wrap::Clamp),
    ] {
        gl.apply(StateCall::TexParameter(TextureTarget::Texture2D, param));
    }
    gl.apply(StateCall::Enable(Capability::Texture2D));
    gl.apply(StateCall::LoadModelview(m.to_matrix4()));

    let (pw, ph) = (record.padded_width as f32, record.padded_height as f32);
    let (s0, s1) = (rect.x as f32 / pw, rect.max_x() as f32 / pw);
    let (t0, t1) = if source.bottom_up {
        let full = source.surface.height() as f32;
        ((full - rect.y as f32) / ph, (full - rect.max_y() as f32) / ph)
    } else {
        (rect.y as f32 / ph, rect.max_y() as f32 / ph)
    };
    let tex_coords = [[s0, t0], [s1, t0], [s1, t1], [s0, t1]];
    gl.draw(
        PrimitiveMode::Quads,
        &quad(rect.width as f32, rect.height as f32),
        Some(&tex_coords),
        None,
    );
    Ok(())
}

/// Read the target's pixels into an `IntArgbPre` surface
///
/// `top_down` selects the row order; otherwise the bottom row comes first, as
/// the driver returns it.
pub(crate) fn read_back(
    gl: &mut dyn crate::gl::GlApi,
    state: &TargetState,
    top_down: bool,
) -> Result<PixelSurface> {
    let (w, h) = (state.width, state.height);
    let stride = PixelLayout::ARGB.row_stride(w);
    let mut data = vec![0u8; stride * h as usize];
    gl.apply(StateCall::PixelStore(PixelStore::PackAlignment(4)));
    if top_down {
        for (i, row) in data.chunks_exact_mut(stride).enumerate() {
            gl.read_pixels(0, state.flip_y(i as i32, 1), w, 1, PixelLayout::ARGB, row);
        }
    } else {
        gl.read_pixels(
            0,
            state.flip_y(0, h as i32),
            w,
            h,
            PixelLayout::ARGB,
            &mut data,
        );
    }
    Ok(PixelSurface::from_data(w, h, PixelFormat::IntArgbPre, data)?)
}

/// Copy a device-space area of the target by (dx, dy)
pub(crate) fn copy_area(frame: &mut Frame<'_>, area: IntRect, dx: i32, dy: i32) -> Result<()> {
    let Some(src) = area.intersect(&frame.state.device_rect()) else {
        return Ok(());
    };
    frame.invalidate_readback();
    disable_textures(frame);
    let state = &*frame.state;
    let gl = frame.manager.gl();
    gl.apply(StateCall::Disable(Capability::Blend));
    gl.apply(StateCall::Disable(Capability::ColorLogicOp));
    gl.apply(StateCall::WindowPos {
        x: (src.x + dx) as f32,
        y: state.flip_y(src.y + dy, src.height) as f32,
    });
    gl.copy_pixels(
        src.x,
        state.flip_y(src.y, src.height),
        src.width as u32,
        src.height as u32,
    );
    frame.restore(&[StatePiece::Composite, StatePiece::Paint])
}

// ─────────────────────────────────────────────────────────────────────────────
// Target Sources
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters of drawing one target onto another
#[derive(Clone, Debug)]
pub(crate) struct TargetBlit {
    pub src: IntRect,
    pub at: Point,
    pub transform: Option<Affine2D>,
    pub background: Option<Color>,
}

/// Native identity of a source target
pub(crate) struct TargetSource {
    drawable: glaze_core::DrawableId,
    width: u32,
    height: u32,
    buffer_height: u32,
}

impl TargetSource {
    pub fn of(state: &TargetState) -> Self {
        Self {
            drawable: state.drawable,
            width: state.width,
            height: state.height,
            buffer_height: state.buffer_height,
        }
    }
}

pub(crate) enum CopyOutcome {
    Copied,
    /// The source is unreachable from the destination's context
    NeedsTexture,
}

/// Copy between drawables on the device, if the placement and contexts allow it
pub(crate) fn copy_from_target(
    frame: &mut Frame<'_>,
    source: &TargetSource,
    request: &TargetBlit,
) -> Result<CopyOutcome> {
    let m = placement(frame.state, request.at, request.transform.as_ref());
    if !m.is_translation() {
        return Ok(CopyOutcome::NeedsTexture);
    }
    let bounds = IntRect::new(0, 0, source.width as i32, source.height as i32);
    let Some(src) = request.src.intersect(&bounds) else {
        return Ok(CopyOutcome::Copied);
    };
    let (context, drawable, device) = (
        frame.state.context,
        frame.state.drawable,
        frame.state.device,
    );
    if !frame
        .manager
        .make_current_for_read(context, drawable, source.drawable)
    {
        return Ok(CopyOutcome::NeedsTexture);
    }

    frame.invalidate_readback();
    let (w, h) = (src.width as f32, src.height as f32);
    if let Some(bg) = request.background.filter(|_| frame.state.xor_color.is_none()) {
        underpaint(frame, &m, w, h, bg);
    }
    let (tx, ty) = m.translation_components();
    let composite = frame.state.composite;
    let xor = frame.state.xor_color.is_some();
    let dest_y = frame.state.flip_y(ty.round() as i32, src.height);
    disable_textures(frame);
    let gl = frame.manager.gl();
    if !xor {
        apply_blend(gl, translate(composite, true, true).blend);
    }
    gl.apply(StateCall::WindowPos {
        x: tx.round(),
        y: dest_y as f32,
    });
    gl.copy_pixels(
        src.x,
        source.buffer_height as i32 - (src.y + src.height),
        src.width as u32,
        src.height as u32,
    );
    frame.manager.make_current(context, drawable, device);
    frame.restore(&IMAGE_PIECES)?;
    Ok(CopyOutcome::Copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextId;
    use glaze_core::{DeviceContextId, DrawableId};

    fn state() -> TargetState {
        TargetState::new(ContextId(1), DrawableId(1), DeviceContextId::NONE, 40, 30, 30)
    }

    #[test]
    fn test_placement_composes_in_user_order() {
        let mut s = state();
        s.transform = Affine2D::scale(2.0, 2.0);
        let m = placement(&s, Point::new(5.0, 1.0), None);
        assert_eq!(m.transform_point(Point::ZERO), Point::new(10.0, 2.0));
        assert_eq!(m.transform_point(Point::new(1.0, 1.0)), Point::new(12.0, 4.0));
    }

    #[test]
    fn test_placement_applies_extra_transform_first() {
        let s = state();
        let extra = Affine2D::scale(3.0, 3.0);
        let m = placement(&s, Point::new(1.0, 0.0), Some(&extra));
        assert_eq!(m.transform_point(Point::new(1.0, 1.0)), Point::new(4.0, 3.0));
        assert!(!m.is_translation());
    }
}
