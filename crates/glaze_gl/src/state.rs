//! Render-target state and its translation into native pipeline state
//!
//! A target's logical state is split into pieces that are applied in a fixed
//! order: viewport, color, transform, clip, composite, stroke, paint. Later
//! pieces read what earlier ones established (the paint planes are defined
//! against the loaded transform, the draw color depends on the composite).

use crate::composite::translate;
use crate::config::RenderConfig;
use crate::context::{ContextId, OffscreenBuffer};
use crate::error::{RenderError, Result};
use crate::format::PixelLayout;
use crate::gl::{
    Capability, Filter, GlApi, PrimitiveMode, StateCall, StencilFunc, StencilOp, TexCoord,
    TexParam, TextureId, TextureTarget, Wrap,
};
use crate::stipple::dash_to_stipple;
use crate::texture::{TextureCache, TextureUsage};
use glaze_core::{
    Affine2D, ClipRegion, Color, Composite, DeviceContextId, DrawableId, GlyphProvider, IntRect,
    Paint, PixelSurface, Point, Stroke,
};
use slotmap::new_key_type;
use std::sync::Arc;

new_key_type! {
    /// Key of a render target inside its runtime
    pub struct TargetKey;
}

/// One independently applied piece of pipeline state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatePiece {
    Viewport,
    Color,
    Transform,
    Clip,
    Composite,
    Stroke,
    Paint,
}

impl StatePiece {
    /// Every piece, in application order
    pub const ALL: [StatePiece; 7] = [
        StatePiece::Viewport,
        StatePiece::Color,
        StatePiece::Transform,
        StatePiece::Clip,
        StatePiece::Composite,
        StatePiece::Stroke,
        StatePiece::Paint,
    ];
}

/// Logical state of one render target
pub struct TargetState {
    pub(crate) context: ContextId,
    pub(crate) drawable: DrawableId,
    pub(crate) device: DeviceContextId,
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Height of the native drawable; window-space flips use it
    pub(crate) buffer_height: u32,
    pub(crate) offscreen: Option<OffscreenBuffer>,
    pub(crate) constructing: bool,
    pub(crate) paint: Paint,
    pub(crate) background: Color,
    pub(crate) transform: Affine2D,
    /// Clip rectangles relative to the transform's translation
    pub(crate) clip: Option<ClipRegion>,
    pub(crate) composite: Composite,
    pub(crate) xor_color: Option<Color>,
    pub(crate) stroke: Stroke,
    pub(crate) font: Option<Arc<dyn GlyphProvider>>,
    /// Top-down read-back cached until the next draw
    pub(crate) snapshot: Option<PixelSurface>,
    /// Bottom-up read-back used when this target is a texture source
    pub(crate) backing: Option<PixelSurface>,
}

impl TargetState {
    pub(crate) fn new(
        context: ContextId,
        drawable: DrawableId,
        device: DeviceContextId,
        width: u32,
        height: u32,
        buffer_height: u32,
    ) -> Self {
        Self {
            context,
            drawable,
            device,
            width,
            height,
            buffer_height,
            offscreen: None,
            constructing: true,
            paint: Paint::default(),
            background: Color::WHITE,
            transform: Affine2D::IDENTITY,
            clip: None,
            composite: Composite::SRC_OVER,
            xor_color: None,
            stroke: Stroke::default(),
            font: None,
            snapshot: None,
            backing: None,
        }
    }

    /// Copy of the drawing state for a second façade on the same drawable
    pub(crate) fn child(&self) -> Self {
        Self {
            context: self.context,
            drawable: self.drawable,
            device: self.device,
            width: self.width,
            height: self.height,
            buffer_height: self.buffer_height,
            offscreen: None,
            constructing: true,
            paint: self.paint.clone(),
            background: self.background,
            transform: self.transform,
            clip: self.clip.clone(),
            composite: self.composite,
            xor_color: self.xor_color,
            stroke: self.stroke.clone(),
            font: self.font.clone(),
            snapshot: None,
            backing: None,
        }
    }

    pub(crate) fn device_rect(&self) -> IntRect {
        IntRect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn clip_offset(&self) -> (i32, i32) {
        let (tx, ty) = self.transform.translation_components();
        (tx.round() as i32, ty.round() as i32)
    }

    /// Clip in device pixels
    pub(crate) fn device_clip(&self) -> Option<ClipRegion> {
        let (dx, dy) = self.clip_offset();
        self.clip.as_ref().map(|c| c.translate(dx, dy))
    }

    /// Store a device-space clip relative to the current translation
    pub(crate) fn set_device_clip(&mut self, clip: Option<ClipRegion>) {
        let (dx, dy) = self.clip_offset();
        self.clip = clip.map(|c| c.translate(-dx, -dy));
    }

    /// Window-space y of the bottom edge of device row span `[y, y + h)`
    pub(crate) fn flip_y(&self, y: i32, h: i32) -> i32 {
        self.buffer_height as i32 - (y + h)
    }

    /// Color the paint reduces to, if any
    pub(crate) fn flat_color(&self) -> Option<Color> {
        match &self.paint {
            Paint::Solid(c) => Some(*c),
            Paint::LinearGradient {
                start,
                end,
                start_color,
                ..
            } if is_degenerate(*start, *end) => Some(*start_color),
            _ => None,
        }
    }

    /// Premultiplied native color for the current paint and composite
    pub(crate) fn draw_color(&self) -> [f32; 4] {
        if let Some(xor) = self.xor_color {
            let paint = self.flat_color().unwrap_or(Color::BLACK);
            let bits = (paint.to_argb() ^ xor.to_argb()) & 0x00FF_FFFF;
            let c = Color::from_argb(bits);
            return [c.r, c.g, c.b, 0.0];
        }
        let alpha = self.composite.alpha;
        match self.flat_color() {
            Some(color) => color.with_alpha(color.a * alpha).premultiplied(),
            // textures and vertex colors carry the paint; the color only modulates
            None => [alpha; 4],
        }
    }

    /// Whether the paint may produce non-opaque source pixels
    pub(crate) fn paint_has_alpha(&self) -> bool {
        match self.flat_color() {
            Some(c) => !c.is_opaque(),
            None => !self.paint.is_opaque(),
        }
    }

    /// Whether the clip is held in the drawable's stencil plane
    fn has_stencil_clip(&self) -> bool {
        self.clip.as_ref().is_some_and(|c| c.len() > 1)
    }

    /// Pieces whose applied native state differs between `self` and `other`
    pub(crate) fn diff(&self, other: &TargetState) -> impl Iterator<Item = StatePiece> {
        let transform_changed = self.transform != other.transform;
        // stencil contents belong to one drawable
        let stencil_moved = self.drawable != other.drawable
            && (self.has_stencil_clip() || other.has_stencil_clip());
        let changed = [
            (self.width, self.height, self.buffer_height)
                != (other.width, other.height, other.buffer_height),
            self.draw_color() != other.draw_color(),
            transform_changed,
            transform_changed || stencil_moved || self.device_clip() != other.device_clip(),
            self.composite != other.composite
                || self.xor_color != other.xor_color
                || self.paint_has_alpha() != other.paint_has_alpha(),
            self.stroke != other.stroke,
            transform_changed || self.paint != other.paint,
        ];
        StatePiece::ALL
            .into_iter()
            .zip(changed)
            .filter_map(|(piece, changed)| changed.then_some(piece))
    }
}

fn is_degenerate(start: Point, end: Point) -> bool {
    (end.x - start.x).abs() < f32::EPSILON && (end.y - start.y).abs() < f32::EPSILON
}

// ─────────────────────────────────────────────────────────────────────────────
// Piece Application
// ─────────────────────────────────────────────────────────────────────────────

/// Shared objects the paint piece draws on
pub(crate) struct PaintResources<'a> {
    pub textures: &'a mut TextureCache,
    /// 1D texture reused by every gradient paint
    pub gradient: &'a mut Option<TextureId>,
    pub config: &'a RenderConfig,
}

pub(crate) fn apply_piece(
    gl: &mut dyn GlApi,
    state: &TargetState,
    piece: StatePiece,
    res: &mut PaintResources<'_>,
) -> Result<()> {
    match piece {
        StatePiece::Viewport => apply_viewport(gl, state),
        StatePiece::Color => apply_color(gl, state),
        StatePiece::Transform => apply_transform(gl, state),
        StatePiece::Clip => apply_clip(gl, state),
        StatePiece::Composite => apply_composite(gl, state),
        StatePiece::Stroke => apply_stroke(gl, state),
        StatePiece::Paint => return apply_paint(gl, state, res),
    }
    Ok(())
}

pub(crate) fn apply_all(
    gl: &mut dyn GlApi,
    state: &TargetState,
    res: &mut PaintResources<'_>,
) -> Result<()> {
    for piece in StatePiece::ALL {
        apply_piece(gl, state, piece, res)?;
    }
    Ok(())
}

/// Viewport over the target's region and a top-down orthographic projection
pub(crate) fn apply_viewport(gl: &mut dyn GlApi, state: &TargetState) {
    gl.apply(StateCall::Viewport {
        x: 0,
        y: state.flip_y(0, state.height as i32),
        width: state.width,
        height: state.height,
    });
    gl.apply(StateCall::Ortho {
        width: state.width as f32,
        height: state.height as f32,
    });
}

pub(crate) fn apply_color(gl: &mut dyn GlApi, state: &TargetState) {
    gl.apply(StateCall::Color(state.draw_color()));
}

pub(crate) fn apply_transform(gl: &mut dyn GlApi, state: &TargetState) {
    gl.apply(StateCall::LoadModelview(state.transform.to_matrix4()));
}

/// Scissor for a single rectangle, stencil mask for several
pub(crate) fn apply_clip(gl: &mut dyn GlApi, state: &TargetState) {
    let Some(clip) = state.device_clip() else {
        gl.apply(StateCall::Disable(Capability::ScissorTest));
        gl.apply(StateCall::Disable(Capability::StencilTest));
        return;
    };
    match clip.rects() {
        [] => {
            gl.apply(StateCall::Disable(Capability::StencilTest));
            gl.apply(StateCall::Enable(Capability::ScissorTest));
            gl.apply(StateCall::Scissor {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            });
        }
        [rect] => {
            gl.apply(StateCall::Disable(Capability::StencilTest));
            gl.apply(StateCall::Enable(Capability::ScissorTest));
            gl.apply(StateCall::Scissor {
                x: rect.x,
                y: state.flip_y(rect.y, rect.height),
                width: rect.width.max(0) as u32,
                height: rect.height.max(0) as u32,
            });
        }
        rects => {
            gl.apply(StateCall::Disable(Capability::ScissorTest));
            gl.apply(StateCall::Clear {
                color: false,
                stencil: true,
            });
            gl.apply(StateCall::Enable(Capability::StencilTest));
            gl.apply(StateCall::StencilFunc {
                func: StencilFunc::Always,
                reference: 1,
            });
            gl.apply(StateCall::StencilOp(StencilOp::Replace));
            gl.apply(StateCall::ColorMask(false));
            gl.apply(StateCall::LoadModelview(Affine2D::IDENTITY.to_matrix4()));
            let quads: Vec<[f32; 2]> = rects
                .iter()
                .flat_map(|r| {
                    let (x0, y0) = (r.x as f32, r.y as f32);
                    let (x1, y1) = (r.max_x() as f32, r.max_y() as f32);
                    [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
                })
                .collect();
            gl.draw(PrimitiveMode::Quads, &quads, None, None);
            gl.apply(StateCall::ColorMask(true));
            gl.apply(StateCall::StencilFunc {
                func: StencilFunc::Equal,
                reference: 1,
            });
            gl.apply(StateCall::StencilOp(StencilOp::Keep));
            apply_transform(gl, state);
        }
    }
}

/// Blend or XOR state for the composite and the paint's transparency
pub(crate) fn apply_composite(gl: &mut dyn GlApi, state: &TargetState) {
    if state.xor_color.is_some() {
        gl.apply(StateCall::Disable(Capability::Blend));
        gl.apply(StateCall::Enable(Capability::ColorLogicOp));
        gl.apply(StateCall::LogicOpXor);
        return;
    }
    gl.apply(StateCall::Disable(Capability::ColorLogicOp));
    let setup = translate(state.composite, true, state.paint_has_alpha());
    apply_blend(gl, setup.blend);
}

pub(crate) fn apply_blend(gl: &mut dyn GlApi, blend: Option<crate::gl::BlendFactors>) {
    match blend {
        None => gl.apply(StateCall::Disable(Capability::Blend)),
        Some(factors) => {
            gl.apply(StateCall::Enable(Capability::Blend));
            gl.apply(StateCall::BlendFunc(factors));
        }
    }
}

pub(crate) fn apply_stroke(gl: &mut dyn GlApi, state: &TargetState) {
    gl.apply(StateCall::LineWidth(state.stroke.width.max(1.0)));
    match state.stroke.dash.as_ref().and_then(dash_to_stipple) {
        Some(stipple) => {
            gl.apply(StateCall::Enable(Capability::LineStipple));
            gl.apply(StateCall::LineStipple {
                factor: stipple.factor,
                pattern: stipple.pattern,
            });
        }
        None => gl.apply(StateCall::Disable(Capability::LineStipple)),
    }
}

fn disable_paint_textures(gl: &mut dyn GlApi) {
    for cap in [
        Capability::TexGenS,
        Capability::TexGenT,
        Capability::Texture1D,
        Capability::Texture2D,
    ] {
        gl.apply(StateCall::Disable(cap));
    }
}

/// Texture and texture-coordinate generation state for the paint
pub(crate) fn apply_paint(
    gl: &mut dyn GlApi,
    state: &TargetState,
    res: &mut PaintResources<'_>,
) -> Result<()> {
    if state.flat_color().is_some() {
        disable_paint_textures(gl);
        return Ok(());
    }
    match &state.paint {
        Paint::LinearGradient {
            start,
            end,
            start_color,
            end_color,
            cyclic,
        } => {
            let handle = match *res.gradient {
                Some(handle) => handle,
                None => {
                    let handle = gl
                        .gen_texture()
                        .ok_or_else(|| RenderError::exhausted("gradient texture"))?;
                    *res.gradient = Some(handle);
                    handle
                }
            };
            gl.apply(StateCall::Disable(Capability::Texture2D));
            gl.apply(StateCall::Disable(Capability::TexGenT));
            gl.apply(StateCall::BindTexture(TextureTarget::Texture1D, Some(handle)));
            let wrap = if *cyclic { Wrap::Repeat } else { Wrap::Clamp };
            for param in [
                TexParam::MinFilter(Filter::Linear),
                TexParam::MagFilter(Filter::Linear),
                TexParam::WrapS(wrap),
            ] {
                gl.apply(StateCall::TexParameter(TextureTarget::Texture1D, param));
            }
            let texels = [
                to_premultiplied_bytes(*start_color),
                to_premultiplied_bytes(*end_color),
            ];
            gl.tex_image(
                TextureTarget::Texture1D,
                2,
                1,
                PixelLayout::RGBA_BYTES,
                Some(bytemuck::cast_slice(&texels)),
            );
            let plane = gradient_plane(*start, *end);
            gl.apply(StateCall::TexGenPlane(TexCoord::S, plane));
            gl.apply(StateCall::Enable(Capability::TexGenS));
            gl.apply(StateCall::Enable(Capability::Texture1D));
        }
        Paint::Pattern { image, anchor } => {
            let record = res.textures.obtain(
                gl,
                image,
                TextureUsage::Image,
                res.config.npot_textures,
                res.config.cleanup_after_insert,
            )?;
            gl.apply(StateCall::Disable(Capability::Texture1D));
            gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(record.handle)));
            for param in [
                TexParam::MinFilter(Filter::Nearest),
                TexParam::MagFilter(Filter::Nearest),
                TexParam::WrapS(Wrap::Repeat),
                TexParam::WrapT(Wrap::Repeat),
            ] {
                gl.apply(StateCall::TexParameter(TextureTarget::Texture2D, param));
            }
            let (us, ut) = record.extent();
            let sx = us / anchor.width();
            let sy = ut / anchor.height();
            gl.apply(StateCall::TexGenPlane(
                TexCoord::S,
                [sx, 0.0, 0.0, -anchor.x() * sx],
            ));
            gl.apply(StateCall::TexGenPlane(
                TexCoord::T,
                [0.0, sy, 0.0, -anchor.y() * sy],
            ));
            gl.apply(StateCall::Enable(Capability::TexGenS));
            gl.apply(StateCall::Enable(Capability::TexGenT));
            gl.apply(StateCall::Enable(Capability::Texture2D));
        }
        // sampled per vertex at draw time
        Paint::Custom(_) | Paint::Solid(_) => disable_paint_textures(gl),
    }
    Ok(())
}

fn to_premultiplied_bytes(color: Color) -> [u8; 4] {
    color
        .premultiplied()
        .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Object-linear plane placing `start` at s = 0.25 and `end` at s = 0.75
///
/// Solves `A x + B y + D = s` at both endpoints and at `start` offset along the
/// perpendicular of the axis (s = 0.25 there, keeping isolines perpendicular).
pub fn gradient_plane(start: Point, end: Point) -> [f32; 4] {
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let rows = [
        [start.x, start.y, 1.0, 0.25],
        [end.x, end.y, 1.0, 0.75],
        [start.x - dy, start.y + dx, 1.0, 0.25],
    ];
    let det3 = |m: [[f32; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let column = |col: Option<usize>| {
        let mut m = [[0.0; 3]; 3];
        for (r, row) in rows.iter().enumerate() {
            for c in 0..3 {
                m[r][c] = if Some(c) == col { row[3] } else { row[c] };
            }
        }
        m
    };
    let det = det3(column(None));
    if det.abs() < f32::EPSILON {
        return [0.0, 0.0, 0.0, 0.25];
    }
    let a = det3(column(Some(0))) / det;
    let b = det3(column(Some(1))) / det;
    let d = det3(column(Some(2))) / det;
    [a, b, 0.0, d]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_core::{CompositeRule, Rect};

    fn state() -> TargetState {
        TargetState::new(ContextId(1), DrawableId(1), DeviceContextId::NONE, 100, 80, 80)
    }

    #[test]
    fn test_gradient_plane_maps_endpoints_to_texel_centers() {
        let plane = gradient_plane(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!((plane[0] - 0.005).abs() < 1e-6);
        assert!(plane[1].abs() < 1e-6);
        assert!((plane[3] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_plane_diagonal_axis() {
        let (p1, p2) = (Point::new(10.0, 20.0), Point::new(40.0, 60.0));
        let plane = gradient_plane(p1, p2);
        let s = |p: Point| plane[0] * p.x + plane[1] * p.y + plane[3];
        assert!((s(p1) - 0.25).abs() < 1e-4);
        assert!((s(p2) - 0.75).abs() < 1e-4);
        // isolines run perpendicular to the axis
        assert!((s(Point::new(10.0 - 40.0, 20.0 + 30.0)) - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_draw_color_premultiplies_composite_alpha() {
        let mut s = state();
        s.paint = Paint::Solid(Color::rgba(1.0, 0.0, 0.0, 0.5));
        s.composite = Composite::new(CompositeRule::SrcOver, 0.5);
        assert_eq!(s.draw_color(), [0.25, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn test_non_flat_paint_modulates_by_alpha_only() {
        let mut s = state();
        s.paint = Paint::linear_gradient(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Color::RED,
            Color::BLUE,
        );
        s.composite = Composite::new(CompositeRule::SrcOver, 0.5);
        assert_eq!(s.draw_color(), [0.5; 4]);
    }

    #[test]
    fn test_degenerate_gradient_is_flat() {
        let mut s = state();
        let p = Point::new(5.0, 5.0);
        s.paint = Paint::linear_gradient(p, p, Color::GREEN, Color::BLUE);
        assert_eq!(s.flat_color(), Some(Color::GREEN));
    }

    #[test]
    fn test_clip_follows_translation() {
        let mut s = state();
        s.set_device_clip(Some(ClipRegion::from_rect(IntRect::new(10, 10, 20, 20))));
        s.transform = Affine2D::translation(5.0, -3.0);
        let device = s.device_clip().unwrap();
        assert_eq!(device.rects(), &[IntRect::new(15, 7, 20, 20)]);
    }

    #[test]
    fn test_diff_orders_and_filters_pieces() {
        let a = state();
        let mut b = a.child();
        assert_eq!(a.diff(&b).count(), 0);
        b.transform = Affine2D::scale(2.0, 2.0);
        b.paint = Paint::Solid(Color::BLUE);
        let pieces: Vec<_> = a.diff(&b).collect();
        assert_eq!(
            pieces,
            vec![
                StatePiece::Color,
                StatePiece::Transform,
                StatePiece::Clip,
                StatePiece::Paint
            ]
        );
    }

    #[test]
    fn test_pattern_paint_is_not_flat() {
        let mut s = state();
        let image = PixelSurface::new(4, 4, glaze_core::PixelFormat::IntRgb).unwrap();
        s.paint = Paint::pattern(image, Rect::new(0.0, 0.0, 4.0, 4.0));
        assert!(s.flat_color().is_none());
        assert!(!s.paint_has_alpha());
    }

    #[test]
    fn test_stencil_clip_resyncs_across_drawables() {
        let two = ClipRegion::from_rects([IntRect::new(0, 0, 5, 5), IntRect::new(10, 10, 5, 5)]);
        let one = ClipRegion::from_rect(IntRect::new(0, 0, 5, 5));
        let mut a = state();
        let mut b = state();
        b.drawable = DrawableId(2);

        a.set_device_clip(Some(two.clone()));
        b.set_device_clip(Some(two));
        assert!(a.diff(&b).any(|p| p == StatePiece::Clip));
        let child = a.child();
        assert!(!a.diff(&child).any(|p| p == StatePiece::Clip));

        a.set_device_clip(Some(one.clone()));
        b.set_device_clip(Some(one));
        assert!(!a.diff(&b).any(|p| p == StatePiece::Clip));
    }
}
