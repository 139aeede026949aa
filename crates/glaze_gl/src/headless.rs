//! In-process implementation of the native seam
//!
//! [`HeadlessGl`] keeps per-context pipeline state, bottom-up RGBA framebuffers
//! with stencil planes, texture and display-list storage, and a log of every
//! call it receives. It rasterizes filled primitives by pixel-center sampling,
//! draws lines with a DDA walk honoring the stipple, and runs every fragment
//! through scissor, stencil, logic-op and blend stages. Contexts created by one
//! [`HeadlessContextManager`] per device share object names.

use crate::context::{ContextId, ContextManager};
use crate::error::{RenderError, Result};
use crate::format::{ChannelOrder, NativeType, PixelLayout, PixelTransfer};
use crate::gl::{
    BlendFactor, BlendFactors, Capability, ColorBuffer, Filter, GlApi, ListId, PixelStore,
    PrimitiveMode, StateCall, StencilFunc, StencilOp, TexCoord, TexParam, TextureId,
    TextureTarget, Wrap,
};
use glaze_core::{
    DeviceContextId, DrawableId, GlyphBitmap, GlyphProvider, NativeWindow, Path, Rect,
};
use rustc_hash::FxHashMap;
use std::any::Any;

// ─────────────────────────────────────────────────────────────────────────────
// Call Log
// ─────────────────────────────────────────────────────────────────────────────

/// One call received by the headless driver
#[derive(Clone, Debug, PartialEq)]
pub enum GlCall {
    State(StateCall),
    GenTexture(Option<TextureId>),
    DeleteTexture(TextureId),
    TexImage {
        target: TextureTarget,
        width: u32,
        height: u32,
    },
    TexSubImage {
        target: TextureTarget,
        width: u32,
        height: u32,
    },
    GenList(Option<ListId>),
    BeginList(ListId),
    EndList,
    CallList(ListId),
    DeleteList(ListId),
    Draw {
        mode: PrimitiveMode,
        vertices: usize,
    },
    DrawPixels {
        width: u32,
        height: u32,
    },
    ReadPixels {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    CopyPixels {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Flush,
    MakeCurrent {
        context: ContextId,
        draw: DrawableId,
        read: DrawableId,
    },
    SwapBuffers(DrawableId),
}

/// Native object counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub textures_created: u64,
    pub textures_deleted: u64,
    pub lists_created: u64,
    pub lists_deleted: u64,
    pub offscreen_created: u64,
    pub offscreen_destroyed: u64,
    /// Deletes of names that were never allocated or already deleted
    pub invalid_deletes: u64,
    /// Deletes issued with no context current
    pub unbound_deletes: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline State
// ─────────────────────────────────────────────────────────────────────────────

fn cap_bit(cap: Capability) -> u16 {
    1 << match cap {
        Capability::Blend => 0,
        Capability::ScissorTest => 1,
        Capability::StencilTest => 2,
        Capability::ColorLogicOp => 3,
        Capability::Texture1D => 4,
        Capability::Texture2D => 5,
        Capability::TexGenS => 6,
        Capability::TexGenT => 7,
        Capability::LineStipple => 8,
        Capability::Dither => 9,
        Capability::VertexArray => 10,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unpack {
    pub row_length: u32,
    pub skip_pixels: u32,
    pub skip_rows: u32,
    pub alignment: u32,
}

/// Pipeline state of one context
#[derive(Clone, Debug, PartialEq)]
pub struct ContextState {
    enabled: u16,
    pub viewport: (i32, i32, u32, u32),
    pub ortho: (f32, f32),
    pub modelview: [f32; 16],
    pub color: [f32; 4],
    pub scissor: (i32, i32, u32, u32),
    pub blend: BlendFactors,
    pub line_width: f32,
    pub stipple: (u16, u16),
    pub unpack: Unpack,
    pub pack_alignment: u32,
    pub transfer: PixelTransfer,
    pub zoom: (f32, f32),
    pub raster: (f32, f32),
    pub clear_color: [f32; 4],
    pub stencil_func: (StencilFunc, u8),
    pub stencil_op: StencilOp,
    pub color_mask: bool,
    pub bound_1d: Option<TextureId>,
    pub bound_2d: Option<TextureId>,
    pub tex_gen_s: [f32; 4],
    pub tex_gen_t: [f32; 4],
    pub draw_buffer: ColorBuffer,
    pub read_buffer: ColorBuffer,
}

const IDENTITY4: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

impl Default for ContextState {
    fn default() -> Self {
        Self {
            enabled: cap_bit(Capability::Dither),
            viewport: (0, 0, 0, 0),
            ortho: (1.0, 1.0),
            modelview: IDENTITY4,
            color: [1.0; 4],
            scissor: (0, 0, 0, 0),
            blend: BlendFactors::new(BlendFactor::One, BlendFactor::Zero),
            line_width: 1.0,
            stipple: (1, 0xFFFF),
            unpack: Unpack {
                row_length: 0,
                skip_pixels: 0,
                skip_rows: 0,
                alignment: 4,
            },
            pack_alignment: 4,
            transfer: PixelTransfer::IDENTITY,
            zoom: (1.0, 1.0),
            raster: (0.0, 0.0),
            clear_color: [0.0; 4],
            stencil_func: (StencilFunc::Always, 0),
            stencil_op: StencilOp::Keep,
            color_mask: true,
            bound_1d: None,
            bound_2d: None,
            tex_gen_s: [1.0, 0.0, 0.0, 0.0],
            tex_gen_t: [0.0, 1.0, 0.0, 0.0],
            draw_buffer: ColorBuffer::Back,
            read_buffer: ColorBuffer::Back,
        }
    }
}

impl ContextState {
    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.enabled & cap_bit(cap) != 0
    }

    fn apply(&mut self, call: &StateCall) {
        match *call {
            StateCall::Enable(cap) => self.enabled |= cap_bit(cap),
            StateCall::Disable(cap) => self.enabled &= !cap_bit(cap),
            StateCall::Viewport {
                x,
                y,
                width,
                height,
            } => self.viewport = (x, y, width, height),
            StateCall::Ortho { width, height } => self.ortho = (width, height),
            StateCall::LoadModelview(m) => self.modelview = m,
            StateCall::Color(c) => self.color = c,
            StateCall::Scissor {
                x,
                y,
                width,
                height,
            } => self.scissor = (x, y, width, height),
            StateCall::BlendFunc(f) => self.blend = f,
            StateCall::LineWidth(w) => self.line_width = w,
            StateCall::LineStipple { factor, pattern } => self.stipple = (factor.max(1), pattern),
            StateCall::PixelStore(p) => match p {
                PixelStore::UnpackRowLength(v) => self.unpack.row_length = v,
                PixelStore::UnpackSkipPixels(v) => self.unpack.skip_pixels = v,
                PixelStore::UnpackSkipRows(v) => self.unpack.skip_rows = v,
                PixelStore::UnpackAlignment(v) => self.unpack.alignment = v,
                PixelStore::PackAlignment(v) => self.pack_alignment = v,
            },
            StateCall::PixelTransfer(t) => self.transfer = t,
            StateCall::PixelZoom { x, y } => self.zoom = (x, y),
            StateCall::WindowPos { x, y } => self.raster = (x, y),
            StateCall::ClearColor(c) => self.clear_color = c,
            StateCall::StencilFunc { func, reference } => self.stencil_func = (func, reference),
            StateCall::StencilOp(op) => self.stencil_op = op,
            StateCall::ColorMask(m) => self.color_mask = m,
            StateCall::BindTexture(target, tex) => match target {
                TextureTarget::Texture1D => self.bound_1d = tex,
                TextureTarget::Texture2D => self.bound_2d = tex,
            },
            StateCall::TexGenPlane(coord, plane) => match coord {
                TexCoord::S => self.tex_gen_s = plane,
                TexCoord::T => self.tex_gen_t = plane,
            },
            StateCall::DrawBuffer(b) => self.draw_buffer = b,
            StateCall::ReadBuffer(b) => self.read_buffer = b,
            // handled by the driver: they touch objects or framebuffers
            StateCall::LogicOpXor | StateCall::Clear { .. } | StateCall::TexParameter(..) => {}
        }
    }

    fn bound(&self, target: TextureTarget) -> Option<TextureId> {
        match target {
            TextureTarget::Texture1D => self.bound_1d,
            TextureTarget::Texture2D => self.bound_2d,
        }
    }

    /// Object coordinates to window coordinates (origin bottom-left)
    fn to_window(&self, v: [f32; 2]) -> [f32; 2] {
        let m = &self.modelview;
        let ex = m[0] * v[0] + m[4] * v[1] + m[12];
        let ey = m[1] * v[0] + m[5] * v[1] + m[13];
        let (w, h) = self.ortho;
        let ndc_x = 2.0 * ex / w - 1.0;
        let ndc_y = 1.0 - 2.0 * ey / h;
        let (vx, vy, vw, vh) = self.viewport;
        [
            vx as f32 + (ndc_x + 1.0) * vw as f32 / 2.0,
            vy as f32 + (ndc_y + 1.0) * vh as f32 / 2.0,
        ]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Objects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Texture {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
    min_filter: Filter,
    wrap_s: Wrap,
    wrap_t: Wrap,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            texels: Vec::new(),
            min_filter: Filter::Nearest,
            wrap_s: Wrap::Repeat,
            wrap_t: Wrap::Repeat,
        }
    }
}

fn wrap_index(i: i64, n: u32, wrap: Wrap) -> usize {
    match wrap {
        Wrap::Clamp => i.clamp(0, n as i64 - 1) as usize,
        Wrap::Repeat => i.rem_euclid(n as i64) as usize,
    }
}

impl Texture {
    fn texel(&self, i: i64, j: i64) -> [f32; 4] {
        let x = wrap_index(i, self.width, self.wrap_s);
        let y = wrap_index(j, self.height, self.wrap_t);
        self.texels[y * self.width as usize + x]
    }

    fn sample(&self, s: f32, t: f32) -> [f32; 4] {
        if self.width == 0 || self.height == 0 {
            return [1.0; 4];
        }
        let u = s * self.width as f32;
        let v = t * self.height as f32;
        match self.min_filter {
            Filter::Nearest => self.texel(u.floor() as i64, v.floor() as i64),
            Filter::Linear => {
                let (u, v) = (u - 0.5, v - 0.5);
                let (i0, j0) = (u.floor() as i64, v.floor() as i64);
                let (fu, fv) = (u - u.floor(), v - v.floor());
                let a = self.texel(i0, j0);
                let b = self.texel(i0 + 1, j0);
                let c = self.texel(i0, j0 + 1);
                let d = self.texel(i0 + 1, j0 + 1);
                let mut out = [0.0; 4];
                for k in 0..4 {
                    let top = a[k] + (b[k] - a[k]) * fu;
                    let bottom = c[k] + (d[k] - c[k]) * fu;
                    out[k] = if self.height == 1 {
                        top
                    } else {
                        top + (bottom - top) * fv
                    };
                }
                out
            }
        }
    }
}

/// Bottom-up color and stencil planes of one drawable
#[derive(Clone, Debug)]
pub struct Framebuffer {
    pub width: u32,
    pub height: u32,
    color: Vec<[u8; 4]>,
    stencil: Vec<u8>,
}

impl Framebuffer {
    fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![[0; 4]; n],
            stencil: vec![0; n],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// RGBA at window coordinates (origin bottom-left)
    pub fn rgba(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| self.color[i])
    }

    /// Premultiplied `0xAARRGGBB` at image coordinates (origin top-left)
    pub fn argb_top_down(&self, x: i32, y: i32) -> Option<u32> {
        let [r, g, b, a] = self.rgba(x, self.height as i32 - 1 - y)?;
        Some((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn stencil(&self, x: i32, y: i32) -> Option<u8> {
        self.index(x, y).map(|i| self.stencil[i])
    }
}

#[derive(Clone, Debug)]
enum Recorded {
    State(StateCall),
    Draw {
        mode: PrimitiveMode,
        vertices: Vec<[f32; 2]>,
        tex_coords: Option<Vec<[f32; 2]>>,
        colors: Option<Vec<[f32; 4]>>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Pixel Codecs
// ─────────────────────────────────────────────────────────────────────────────

/// RGBA slot of each transferred component
fn channel_map(order: ChannelOrder) -> &'static [usize] {
    match order {
        ChannelOrder::Rgba => &[0, 1, 2, 3],
        ChannelOrder::Bgra => &[2, 1, 0, 3],
        ChannelOrder::Rgb => &[0, 1, 2],
        ChannelOrder::Bgr => &[2, 1, 0],
        ChannelOrder::Abgr => &[3, 2, 1, 0],
        ChannelOrder::Luminance | ChannelOrder::Intensity => &[0],
    }
}

fn unit(v: u32, max: u32) -> f32 {
    v as f32 / max as f32
}

fn quantize(v: f32, max: u32) -> u32 {
    (v.clamp(0.0, 1.0) * max as f32).round() as u32
}

fn decode(layout: PixelLayout, px: &[u8]) -> [f32; 4] {
    let n = layout.components();
    let mut comps = [0.0f32; 4];
    match layout.ty {
        NativeType::UnsignedByte => {
            for k in 0..n {
                comps[k] = unit(px[k] as u32, 255);
            }
        }
        NativeType::UnsignedShort => {
            for k in 0..n {
                comps[k] = unit(u16::from_ne_bytes([px[2 * k], px[2 * k + 1]]) as u32, 65535);
            }
        }
        NativeType::Packed8888Rev | NativeType::Packed8888 => {
            let v = u32::from_ne_bytes([px[0], px[1], px[2], px[3]]);
            for (k, c) in comps.iter_mut().enumerate() {
                let shift = if layout.ty == NativeType::Packed8888Rev {
                    8 * k
                } else {
                    24 - 8 * k
                };
                *c = unit((v >> shift) & 0xFF, 255);
            }
        }
        NativeType::Packed565 => {
            let v = u16::from_ne_bytes([px[0], px[1]]) as u32;
            comps[0] = unit(v >> 11, 31);
            comps[1] = unit((v >> 5) & 0x3F, 63);
            comps[2] = unit(v & 0x1F, 31);
        }
        NativeType::Packed1555Rev => {
            let v = u16::from_ne_bytes([px[0], px[1]]) as u32;
            comps[0] = unit(v & 0x1F, 31);
            comps[1] = unit((v >> 5) & 0x1F, 31);
            comps[2] = unit((v >> 10) & 0x1F, 31);
            comps[3] = unit(v >> 15, 1);
        }
    }
    match layout.order {
        ChannelOrder::Luminance => [comps[0], comps[0], comps[0], 1.0],
        ChannelOrder::Intensity => [comps[0]; 4],
        order => {
            let map = channel_map(order);
            let mut rgba = [0.0, 0.0, 0.0, 1.0];
            let packed_components = match layout.ty {
                NativeType::Packed8888Rev | NativeType::Packed8888 | NativeType::Packed1555Rev => 4,
                NativeType::Packed565 => 3,
                _ => n,
            };
            for k in 0..packed_components.min(map.len()) {
                rgba[map[k]] = comps[k];
            }
            rgba
        }
    }
}

fn encode(layout: PixelLayout, rgba: [f32; 4], out: &mut [u8]) {
    let comps: [f32; 4] = match layout.order {
        ChannelOrder::Luminance | ChannelOrder::Intensity => {
            let l = 0.299 * rgba[0] + 0.587 * rgba[1] + 0.114 * rgba[2];
            [l, 0.0, 0.0, 0.0]
        }
        order => {
            let mut c = [0.0; 4];
            for (k, &slot) in channel_map(order).iter().enumerate() {
                c[k] = rgba[slot];
            }
            c
        }
    };
    let n = layout.components();
    match layout.ty {
        NativeType::UnsignedByte => {
            for k in 0..n {
                out[k] = quantize(comps[k], 255) as u8;
            }
        }
        NativeType::UnsignedShort => {
            for k in 0..n {
                let v = quantize(comps[k], 65535) as u16;
                out[2 * k..2 * k + 2].copy_from_slice(&v.to_ne_bytes());
            }
        }
        NativeType::Packed8888Rev | NativeType::Packed8888 => {
            let mut v = 0u32;
            for (k, c) in comps.iter().enumerate() {
                let shift = if layout.ty == NativeType::Packed8888Rev {
                    8 * k
                } else {
                    24 - 8 * k
                };
                v |= quantize(*c, 255) << shift;
            }
            out[..4].copy_from_slice(&v.to_ne_bytes());
        }
        NativeType::Packed565 => {
            let v = quantize(comps[0], 31) << 11 | quantize(comps[1], 63) << 5 | quantize(comps[2], 31);
            out[..2].copy_from_slice(&(v as u16).to_ne_bytes());
        }
        NativeType::Packed1555Rev => {
            let v = quantize(comps[0], 31)
                | quantize(comps[1], 31) << 5
                | quantize(comps[2], 31) << 10
                | quantize(comps[3], 1) << 15;
            out[..2].copy_from_slice(&(v as u16).to_ne_bytes());
        }
    }
}

fn apply_transfer(t: &PixelTransfer, c: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for k in 0..4 {
        out[k] = (c[k] * t.scale[k] + t.bias[k]).clamp(0.0, 1.0);
    }
    out
}

/// Decode `width` x `height` pixels laid out per the unpack state
fn unpack_pixels(
    state: &ContextState,
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: &[u8],
) -> Vec<[f32; 4]> {
    let unpack = state.unpack;
    let row_length = if unpack.row_length > 0 {
        unpack.row_length
    } else {
        width
    };
    let stride = PixelLayout {
        alignment: unpack.alignment,
        ..layout
    }
    .row_stride(row_length);
    let bpp = layout.bytes_per_pixel();
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for i in 0..height as usize {
        for j in 0..width as usize {
            let offset = (unpack.skip_rows as usize + i) * stride + (unpack.skip_pixels as usize + j) * bpp;
            let px = data
                .get(offset..offset + bpp)
                .map(|px| decode(layout, px))
                .unwrap_or([0.0; 4]);
            out.push(apply_transfer(&state.transfer, px));
        }
    }
    out
}

fn blend_factor(f: BlendFactor, src_a: f32, dst_a: f32) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src_a,
        BlendFactor::OneMinusSrcAlpha => 1.0 - src_a,
        BlendFactor::DstAlpha => dst_a,
        BlendFactor::OneMinusDstAlpha => 1.0 - dst_a,
    }
}

/// Per-fragment operations for one window pixel
fn write_fragment(state: &ContextState, fb: &mut Framebuffer, x: i32, y: i32, src: [f32; 4]) {
    let Some(index) = fb.index(x, y) else {
        return;
    };
    if state.is_enabled(Capability::ScissorTest) {
        let (sx, sy, sw, sh) = state.scissor;
        if x < sx || y < sy || x >= sx + sw as i32 || y >= sy + sh as i32 {
            return;
        }
    }
    if state.is_enabled(Capability::StencilTest) {
        let (func, reference) = state.stencil_func;
        let pass = match func {
            StencilFunc::Always => true,
            StencilFunc::Equal => fb.stencil[index] == reference,
        };
        if !pass {
            return;
        }
        if state.stencil_op == StencilOp::Replace {
            fb.stencil[index] = reference;
        }
    }
    if !state.color_mask {
        return;
    }
    let dst = fb.color[index];
    let src_u8 = src.map(|c| quantize(c, 255) as u8);
    fb.color[index] = if state.is_enabled(Capability::ColorLogicOp) {
        [
            src_u8[0] ^ dst[0],
            src_u8[1] ^ dst[1],
            src_u8[2] ^ dst[2],
            src_u8[3] ^ dst[3],
        ]
    } else if state.is_enabled(Capability::Blend) {
        let d = dst.map(|c| unit(c as u32, 255));
        let f = state.blend;
        let sa = src[3];
        let da = d[3];
        let sf = blend_factor(f.src, sa, da);
        let df = blend_factor(f.dst, sa, da);
        let saf = blend_factor(f.src_alpha, sa, da);
        [
            quantize(src[0] * sf + d[0] * df, 255) as u8,
            quantize(src[1] * sf + d[1] * df, 255) as u8,
            quantize(src[2] * sf + d[2] * df, 255) as u8,
            quantize(src[3] * saf + d[3] * df, 255) as u8,
        ]
    } else {
        src_u8
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Software implementation of [`GlApi`] with inspection hooks
#[derive(Default)]
pub struct HeadlessGl {
    contexts: FxHashMap<ContextId, ContextState>,
    scratch: ContextState,
    current: Option<ContextId>,
    draw_target: Option<DrawableId>,
    read_target: Option<DrawableId>,
    drawables: FxHashMap<DrawableId, Framebuffer>,
    textures: FxHashMap<TextureId, Texture>,
    lists: FxHashMap<ListId, Vec<Recorded>>,
    recording: Option<(ListId, Vec<Recorded>)>,
    next_name: u32,
    log: Vec<GlCall>,
    stats: ResourceStats,
    /// Refuse texture and display-list allocations
    pub fail_allocations: bool,
}

impl HeadlessGl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[GlCall] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// State calls logged after position `mark`
    pub fn state_calls_since(&self, mark: usize) -> Vec<&StateCall> {
        self.log
            .get(mark..)
            .unwrap_or_default()
            .iter()
            .filter_map(|c| match c {
                GlCall::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn stats(&self) -> ResourceStats {
        self.stats
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn context_state(&self, context: ContextId) -> Option<&ContextState> {
        self.contexts.get(&context)
    }

    /// State of the current context
    pub fn current_state(&self) -> &ContextState {
        self.current
            .and_then(|c| self.contexts.get(&c))
            .unwrap_or(&self.scratch)
    }

    pub fn framebuffer(&self, drawable: DrawableId) -> Option<&Framebuffer> {
        self.drawables.get(&drawable)
    }

    /// Size of texture `id`, if allocated
    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|t| (t.width, t.height))
    }

    /// Premultiplied RGBA of a texel, top row first
    pub fn texel(&self, id: TextureId, x: u32, y: u32) -> Option<[u8; 4]> {
        let tex = self.textures.get(&id)?;
        if x >= tex.width || y >= tex.height {
            return None;
        }
        Some(tex.texels[(y * tex.width + x) as usize].map(|c| quantize(c, 255) as u8))
    }

    fn state_mut(&mut self) -> &mut ContextState {
        match self.current.and_then(|c| self.contexts.get_mut(&c)) {
            Some(state) => state,
            None => &mut self.scratch,
        }
    }

    fn next_name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn create_context(&mut self, context: ContextId) {
        self.contexts.entry(context).or_default();
    }

    fn destroy_context(&mut self, context: ContextId) {
        self.contexts.remove(&context);
        if self.current == Some(context) {
            self.current = None;
            self.draw_target = None;
            self.read_target = None;
        }
    }

    fn bind(&mut self, context: ContextId, draw: DrawableId, read: DrawableId) {
        self.current = Some(context);
        self.draw_target = Some(draw);
        self.read_target = Some(read);
        self.log.push(GlCall::MakeCurrent {
            context,
            draw,
            read,
        });
    }

    fn add_drawable(&mut self, drawable: DrawableId, width: u32, height: u32) {
        self.drawables.insert(drawable, Framebuffer::new(width, height));
    }

    fn remove_drawable(&mut self, drawable: DrawableId) {
        self.drawables.remove(&drawable);
        if self.draw_target == Some(drawable) {
            // a context loses its binding with its drawable
            self.current = None;
            self.draw_target = None;
        }
        if self.read_target == Some(drawable) {
            self.read_target = None;
        }
    }

    fn execute_state(&mut self, call: &StateCall) {
        match call {
            StateCall::Clear { color, stencil } => self.clear(*color, *stencil),
            StateCall::TexParameter(target, param) => {
                let bound = self.state_mut().bound(*target);
                if let Some(tex) = bound.and_then(|id| self.textures.get_mut(&id)) {
                    match *param {
                        TexParam::MinFilter(f) | TexParam::MagFilter(f) => tex.min_filter = f,
                        TexParam::WrapS(w) => tex.wrap_s = w,
                        TexParam::WrapT(w) => tex.wrap_t = w,
                    }
                }
            }
            other => self.state_mut().apply(other),
        }
    }

    fn clear(&mut self, color: bool, stencil: bool) {
        let state = self.current_state().clone();
        let Some(fb) = self.draw_target.and_then(|d| self.drawables.get_mut(&d)) else {
            return;
        };
        let value = state.clear_color.map(|c| quantize(c, 255) as u8);
        for y in 0..fb.height as i32 {
            for x in 0..fb.width as i32 {
                if state.is_enabled(Capability::ScissorTest) {
                    let (sx, sy, sw, sh) = state.scissor;
                    if x < sx || y < sy || x >= sx + sw as i32 || y >= sy + sh as i32 {
                        continue;
                    }
                }
                let Some(i) = fb.index(x, y) else { continue };
                if color && state.color_mask {
                    fb.color[i] = value;
                }
                if stencil {
                    fb.stencil[i] = 0;
                }
            }
        }
    }

    fn execute_draw(
        &mut self,
        mode: PrimitiveMode,
        vertices: &[[f32; 2]],
        tex_coords: Option<&[[f32; 2]]>,
        colors: Option<&[[f32; 4]]>,
    ) {
        let state = self.current_state().clone();
        let texture = if state.is_enabled(Capability::Texture2D) {
            state.bound_2d.and_then(|id| self.textures.get(&id)).cloned()
        } else if state.is_enabled(Capability::Texture1D) {
            state.bound_1d.and_then(|id| self.textures.get(&id)).cloned()
        } else {
            None
        };
        let Some(fb) = self.draw_target.and_then(|d| self.drawables.get_mut(&d)) else {
            return;
        };

        let coords: Vec<[f32; 2]> = vertices
            .iter()
            .enumerate()
            .map(|(i, v)| match tex_coords {
                Some(tc) => tc.get(i).copied().unwrap_or([0.0, 0.0]),
                None => {
                    let plane = |p: [f32; 4]| p[0] * v[0] + p[1] * v[1] + p[3];
                    [
                        if state.is_enabled(Capability::TexGenS) {
                            plane(state.tex_gen_s)
                        } else {
                            0.0
                        },
                        if state.is_enabled(Capability::TexGenT) {
                            plane(state.tex_gen_t)
                        } else {
                            0.0
                        },
                    ]
                }
            })
            .collect();
        let vertex = |i: usize| RasterVertex {
            window: state.to_window(vertices[i]),
            tex: coords[i],
            color: colors.and_then(|c| c.get(i).copied()).unwrap_or(state.color),
        };
        let shade = |v: &RasterVertex| -> [f32; 4] {
            match &texture {
                Some(tex) => {
                    let t = tex.sample(v.tex[0], v.tex[1]);
                    [
                        v.color[0] * t[0],
                        v.color[1] * t[1],
                        v.color[2] * t[2],
                        v.color[3] * t[3],
                    ]
                }
                None => v.color,
            }
        };

        let n = vertices.len();
        let mut triangles: Vec<[usize; 3]> = Vec::new();
        match mode {
            PrimitiveMode::Triangles => {
                triangles.extend((0..n / 3).map(|t| [3 * t, 3 * t + 1, 3 * t + 2]));
            }
            PrimitiveMode::TriangleFan => {
                triangles.extend((1..n.saturating_sub(1)).map(|i| [0, i, i + 1]));
            }
            PrimitiveMode::Quads => {
                for q in 0..n / 4 {
                    triangles.push([4 * q, 4 * q + 1, 4 * q + 2]);
                    triangles.push([4 * q, 4 * q + 2, 4 * q + 3]);
                }
            }
            PrimitiveMode::Lines | PrimitiveMode::LineStrip | PrimitiveMode::LineLoop => {
                let mut segments: Vec<(usize, usize)> = match mode {
                    PrimitiveMode::Lines => (0..n / 2).map(|s| (2 * s, 2 * s + 1)).collect(),
                    _ => (1..n).map(|i| (i - 1, i)).collect(),
                };
                if mode == PrimitiveMode::LineLoop && n > 2 {
                    segments.push((n - 1, 0));
                }
                let stipple = state
                    .is_enabled(Capability::LineStipple)
                    .then_some(state.stipple);
                let mut counter = 0u32;
                for (a, b) in segments {
                    if mode == PrimitiveMode::Lines {
                        counter = 0;
                    }
                    let (va, vb) = (vertex(a), vertex(b));
                    let dx = vb.window[0] - va.window[0];
                    let dy = vb.window[1] - va.window[1];
                    let steps = dx.abs().max(dy.abs()).round() as u32;
                    for i in 0..steps {
                        let t = i as f32 / steps as f32;
                        let visible = match stipple {
                            Some((factor, pattern)) => {
                                pattern & (1 << ((counter / factor as u32) % 16)) != 0
                            }
                            None => true,
                        };
                        counter += 1;
                        if !visible {
                            continue;
                        }
                        let v = RasterVertex::lerp(&va, &vb, t);
                        let px = v.window[0].floor() as i32;
                        let py = v.window[1].floor() as i32;
                        write_fragment(&state, fb, px, py, shade(&v));
                    }
                }
                return;
            }
        }

        for [a, b, c] in triangles {
            rasterize_triangle(&state, fb, [vertex(a), vertex(b), vertex(c)], &shade);
        }
    }

    fn write_pixels(&mut self, width: u32, height: u32, pixels: &[[f32; 4]]) {
        let state = self.current_state().clone();
        let Some(fb) = self.draw_target.and_then(|d| self.drawables.get_mut(&d)) else {
            return;
        };
        let x0 = state.raster.0.floor() as i32;
        let y0 = state.raster.1.floor() as i32;
        for i in 0..height as i32 {
            let row = if state.zoom.1 < 0.0 { y0 - i - 1 } else { y0 + i };
            for j in 0..width as i32 {
                let col = if state.zoom.0 < 0.0 { x0 - j - 1 } else { x0 + j };
                let src = pixels[(i * width as i32 + j) as usize];
                write_fragment(&state, fb, col, row, src);
            }
        }
    }
}

#[derive(Clone, Copy)]
struct RasterVertex {
    window: [f32; 2],
    tex: [f32; 2],
    color: [f32; 4],
}

impl RasterVertex {
    fn weighted(v: &[RasterVertex; 3], w: [f32; 3], window: [f32; 2]) -> Self {
        let mix = |f: fn(&RasterVertex) -> f32| w[0] * f(&v[0]) + w[1] * f(&v[1]) + w[2] * f(&v[2]);
        Self {
            window,
            tex: [mix(|r| r.tex[0]), mix(|r| r.tex[1])],
            color: [
                mix(|r| r.color[0]),
                mix(|r| r.color[1]),
                mix(|r| r.color[2]),
                mix(|r| r.color[3]),
            ],
        }
    }

    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        let l = |x: f32, y: f32| x + (y - x) * t;
        Self {
            window: [l(a.window[0], b.window[0]), l(a.window[1], b.window[1])],
            tex: [l(a.tex[0], b.tex[0]), l(a.tex[1], b.tex[1])],
            color: [
                l(a.color[0], b.color[0]),
                l(a.color[1], b.color[1]),
                l(a.color[2], b.color[2]),
                l(a.color[3], b.color[3]),
            ],
        }
    }
}

/// Edges going down, or horizontal edges going left, own their boundary pixels
fn is_top_left(a: [f32; 2], b: [f32; 2]) -> bool {
    let dy = b[1] - a[1];
    let dx = b[0] - a[0];
    dy < 0.0 || (dy == 0.0 && dx < 0.0)
}

fn rasterize_triangle(
    state: &ContextState,
    fb: &mut Framebuffer,
    mut v: [RasterVertex; 3],
    shade: &dyn Fn(&RasterVertex) -> [f32; 4],
) {
    let edge = |a: [f32; 2], b: [f32; 2], p: [f32; 2]| {
        (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
    };
    let mut area = edge(v[0].window, v[1].window, v[2].window);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if area < 0.0 {
        v.swap(1, 2);
        area = -area;
    }
    let xs = [v[0].window[0], v[1].window[0], v[2].window[0]];
    let ys = [v[0].window[1], v[1].window[1], v[2].window[1]];
    let min_x = xs.iter().cloned().fold(f32::MAX, f32::min).floor().max(0.0) as i32;
    let max_x = xs.iter().cloned().fold(f32::MIN, f32::max).ceil().min(fb.width as f32) as i32;
    let min_y = ys.iter().cloned().fold(f32::MAX, f32::min).floor().max(0.0) as i32;
    let max_y = ys.iter().cloned().fold(f32::MIN, f32::max).ceil().min(fb.height as f32) as i32;

    let edges = [(1, 2), (2, 0), (0, 1)];
    for py in min_y..max_y {
        for px in min_x..max_x {
            let p = [px as f32 + 0.5, py as f32 + 0.5];
            let mut w = [0.0f32; 3];
            let mut inside = true;
            for (k, &(a, b)) in edges.iter().enumerate() {
                let e = edge(v[a].window, v[b].window, p);
                if e < 0.0 || (e == 0.0 && !is_top_left(v[a].window, v[b].window)) {
                    inside = false;
                    break;
                }
                w[k] = e / area;
            }
            if !inside {
                continue;
            }
            let frag = RasterVertex::weighted(&v, w, p);
            write_fragment(state, fb, px, py, shade(&frag));
        }
    }
}

impl GlApi for HeadlessGl {
    fn apply(&mut self, call: StateCall) {
        if let Some((_, recorded)) = self.recording.as_mut() {
            recorded.push(Recorded::State(call));
            return;
        }
        self.execute_state(&call);
        self.log.push(GlCall::State(call));
    }

    fn gen_texture(&mut self) -> Option<TextureId> {
        let id = (!self.fail_allocations).then(|| TextureId(self.next_name()));
        if let Some(id) = id {
            self.textures.insert(id, Texture::default());
            self.stats.textures_created += 1;
        }
        self.log.push(GlCall::GenTexture(id));
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.current.is_none() {
            self.stats.unbound_deletes += 1;
        }
        if self.textures.remove(&texture).is_some() {
            self.stats.textures_deleted += 1;
        } else {
            self.stats.invalid_deletes += 1;
        }
        let scratch = &mut self.scratch;
        for state in self.contexts.values_mut().chain(std::iter::once(scratch)) {
            if state.bound_1d == Some(texture) {
                state.bound_1d = None;
            }
            if state.bound_2d == Some(texture) {
                state.bound_2d = None;
            }
        }
        self.log.push(GlCall::DeleteTexture(texture));
    }

    fn tex_image(
        &mut self,
        target: TextureTarget,
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Option<&[u8]>,
    ) {
        self.log.push(GlCall::TexImage {
            target,
            width,
            height,
        });
        let state = self.current_state().clone();
        let texels = match data {
            Some(data) => unpack_pixels(&state, width, height, layout, data),
            None => vec![[0.0; 4]; width as usize * height as usize],
        };
        if let Some(tex) = state.bound(target).and_then(|id| self.textures.get_mut(&id)) {
            tex.width = width;
            tex.height = height;
            tex.texels = texels;
        }
    }

    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: &[u8],
    ) {
        self.log.push(GlCall::TexSubImage {
            target,
            width,
            height,
        });
        let state = self.current_state().clone();
        let pixels = unpack_pixels(&state, width, height, layout, data);
        let Some(tex) = state.bound(target).and_then(|id| self.textures.get_mut(&id)) else {
            return;
        };
        for i in 0..height {
            for j in 0..width {
                let (tx, ty) = (x + j, y + i);
                if tx < tex.width && ty < tex.height {
                    tex.texels[(ty * tex.width + tx) as usize] = pixels[(i * width + j) as usize];
                }
            }
        }
    }

    fn gen_list(&mut self) -> Option<ListId> {
        let id = (!self.fail_allocations).then(|| ListId(self.next_name()));
        if let Some(id) = id {
            self.lists.insert(id, Vec::new());
            self.stats.lists_created += 1;
        }
        self.log.push(GlCall::GenList(id));
        id
    }

    fn begin_list(&mut self, list: ListId) {
        self.log.push(GlCall::BeginList(list));
        self.recording = Some((list, Vec::new()));
    }

    fn end_list(&mut self) {
        self.log.push(GlCall::EndList);
        if let Some((id, recorded)) = self.recording.take() {
            if let Some(slot) = self.lists.get_mut(&id) {
                *slot = recorded;
            }
        }
    }

    fn call_list(&mut self, list: ListId) {
        self.log.push(GlCall::CallList(list));
        let Some(recorded) = self.lists.get(&list).cloned() else {
            return;
        };
        for item in recorded {
            match item {
                Recorded::State(call) => self.execute_state(&call),
                Recorded::Draw {
                    mode,
                    vertices,
                    tex_coords,
                    colors,
                } => self.execute_draw(mode, &vertices, tex_coords.as_deref(), colors.as_deref()),
            }
        }
    }

    fn delete_list(&mut self, list: ListId) {
        if self.current.is_none() {
            self.stats.unbound_deletes += 1;
        }
        if self.lists.remove(&list).is_some() {
            self.stats.lists_deleted += 1;
        } else {
            self.stats.invalid_deletes += 1;
        }
        self.log.push(GlCall::DeleteList(list));
    }

    fn draw(
        &mut self,
        mode: PrimitiveMode,
        vertices: &[[f32; 2]],
        tex_coords: Option<&[[f32; 2]]>,
        colors: Option<&[[f32; 4]]>,
    ) {
        if let Some((_, recorded)) = self.recording.as_mut() {
            recorded.push(Recorded::Draw {
                mode,
                vertices: vertices.to_vec(),
                tex_coords: tex_coords.map(<[_]>::to_vec),
                colors: colors.map(<[_]>::to_vec),
            });
            return;
        }
        self.log.push(GlCall::Draw {
            mode,
            vertices: vertices.len(),
        });
        self.execute_draw(mode, vertices, tex_coords, colors);
    }

    fn draw_pixels(&mut self, width: u32, height: u32, layout: PixelLayout, data: &[u8]) {
        self.log.push(GlCall::DrawPixels { width, height });
        let state = self.current_state().clone();
        let pixels = unpack_pixels(&state, width, height, layout, data);
        self.write_pixels(width, height, &pixels);
    }

    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        out: &mut [u8],
    ) {
        self.log.push(GlCall::ReadPixels {
            x,
            y,
            width,
            height,
        });
        let pack_alignment = self.current_state().pack_alignment;
        let Some(fb) = self.read_target.and_then(|d| self.drawables.get(&d)) else {
            return;
        };
        let stride = PixelLayout {
            alignment: pack_alignment,
            ..layout
        }
        .row_stride(width);
        let bpp = layout.bytes_per_pixel();
        for i in 0..height as i32 {
            for j in 0..width as i32 {
                let Some(rgba) = fb.rgba(x + j, y + i) else {
                    continue;
                };
                let offset = i as usize * stride + j as usize * bpp;
                if let Some(slot) = out.get_mut(offset..offset + bpp) {
                    encode(layout, rgba.map(|c| unit(c as u32, 255)), slot);
                }
            }
        }
    }

    fn copy_pixels(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(GlCall::CopyPixels {
            x,
            y,
            width,
            height,
        });
        let transfer = self.current_state().transfer;
        let Some(fb) = self.read_target.and_then(|d| self.drawables.get(&d)) else {
            return;
        };
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for i in 0..height as i32 {
            for j in 0..width as i32 {
                let px = fb
                    .rgba(x + j, y + i)
                    .map(|c| c.map(|v| unit(v as u32, 255)))
                    .unwrap_or([0.0; 4]);
                pixels.push(apply_transfer(&transfer, px));
            }
        }
        self.write_pixels(width, height, &pixels);
    }

    fn flush(&mut self) {
        self.log.push(GlCall::Flush);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context Manager
// ─────────────────────────────────────────────────────────────────────────────

/// A headless window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadlessWindow {
    pub id: DrawableId,
    pub width: u32,
    pub height: u32,
    pub device: DeviceContextId,
}

impl NativeWindow for HeadlessWindow {
    fn id(&self) -> DrawableId {
        self.id
    }

    fn bounds(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn device_context(&self) -> DeviceContextId {
        self.device
    }
}

/// Context manager over [`HeadlessGl`]
///
/// Drawables on the same device share one context; drawables on different
/// devices cannot be read across contexts.
#[derive(Default)]
pub struct HeadlessContextManager {
    gl: HeadlessGl,
    next_id: u64,
    contexts: FxHashMap<DeviceContextId, ContextId>,
    drawable_device: FxHashMap<DrawableId, DeviceContextId>,
    current: Option<(ContextId, DrawableId, DrawableId)>,
    /// Maximum number of live off-screen buffers
    pub offscreen_limit: Option<usize>,
    live_offscreen: usize,
    /// Fail every context creation
    pub fail_context_creation: bool,
}

impl HeadlessContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn create_window(&mut self, width: u32, height: u32) -> HeadlessWindow {
        self.create_window_on_device(width, height, DeviceContextId::NONE)
    }

    pub fn create_window_on_device(
        &mut self,
        width: u32,
        height: u32,
        device: DeviceContextId,
    ) -> HeadlessWindow {
        let id = DrawableId(self.next_id());
        self.gl.add_drawable(id, width, height);
        self.drawable_device.insert(id, device);
        HeadlessWindow {
            id,
            width,
            height,
            device,
        }
    }

    pub fn headless(&self) -> &HeadlessGl {
        &self.gl
    }

    pub fn headless_mut(&mut self) -> &mut HeadlessGl {
        &mut self.gl
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn live_offscreen(&self) -> usize {
        self.live_offscreen
    }

    pub fn current(&self) -> Option<(ContextId, DrawableId, DrawableId)> {
        self.current
    }
}

impl ContextManager for HeadlessContextManager {
    fn get_or_create_context(
        &mut self,
        drawable: DrawableId,
        device: DeviceContextId,
    ) -> Result<ContextId> {
        if self.fail_context_creation {
            return Err(RenderError::ContextCreation(format!(
                "no pixel format for drawable {}",
                drawable.0
            )));
        }
        let device = self.drawable_device.get(&drawable).copied().unwrap_or(device);
        if let Some(context) = self.contexts.get(&device) {
            return Ok(*context);
        }
        let context = ContextId(self.next_id());
        self.gl.create_context(context);
        self.contexts.insert(device, context);
        tracing::debug!(?context, ?drawable, "headless context created");
        Ok(context)
    }

    fn make_current(
        &mut self,
        context: ContextId,
        drawable: DrawableId,
        _device: DeviceContextId,
    ) -> bool {
        if self.current == Some((context, drawable, drawable)) {
            return true;
        }
        self.current = Some((context, drawable, drawable));
        self.gl.bind(context, drawable, drawable);
        false
    }

    fn make_current_for_read(
        &mut self,
        context: ContextId,
        draw: DrawableId,
        read: DrawableId,
    ) -> bool {
        let read_context = self
            .drawable_device
            .get(&read)
            .and_then(|device| self.contexts.get(device));
        if read_context != Some(&context) {
            return false;
        }
        self.current = Some((context, draw, read));
        self.gl.bind(context, draw, read);
        true
    }

    fn create_offscreen(&mut self, width: u32, height: u32) -> Option<DrawableId> {
        if self
            .offscreen_limit
            .is_some_and(|limit| self.live_offscreen >= limit)
        {
            return None;
        }
        let id = DrawableId(self.next_id());
        self.gl.add_drawable(id, width, height);
        self.drawable_device.insert(id, DeviceContextId::NONE);
        self.live_offscreen += 1;
        self.gl.stats.offscreen_created += 1;
        Some(id)
    }

    fn destroy_offscreen(&mut self, drawable: DrawableId) {
        if self.drawable_device.remove(&drawable).is_some() {
            self.live_offscreen = self.live_offscreen.saturating_sub(1);
            self.gl.stats.offscreen_destroyed += 1;
        }
        self.gl.remove_drawable(drawable);
        if self.current.is_some_and(|(_, d, r)| d == drawable || r == drawable) {
            self.current = None;
        }
    }

    fn destroy_context(&mut self, context: ContextId) {
        self.contexts.retain(|_, c| *c != context);
        self.gl.destroy_context(context);
        if self.current.is_some_and(|(c, _, _)| c == context) {
            self.current = None;
        }
    }

    fn swap_buffers(&mut self, drawable: DrawableId) {
        self.gl.log.push(GlCall::SwapBuffers(drawable));
    }

    fn gl(&mut self) -> &mut dyn GlApi {
        &mut self.gl
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostic Font
// ─────────────────────────────────────────────────────────────────────────────

/// Font whose glyphs are solid blocks, for diagnostics and tests
#[derive(Clone, Debug)]
pub struct BlockFont {
    pub id: u64,
    /// Em size in user units
    pub size: f32,
}

impl BlockFont {
    pub fn new(id: u64, size: f32) -> Self {
        Self { id, size }
    }

    fn block(&self) -> (f32, f32) {
        (self.size * 0.5, self.size * 0.7)
    }
}

impl GlyphProvider for BlockFont {
    fn font_id(&self) -> u64 {
        self.id
    }

    fn glyph_bitmap(&self, ch: char, scale: f32, _antialias: bool) -> Option<GlyphBitmap> {
        if ch.is_whitespace() {
            return None;
        }
        let (w, h) = self.block();
        let width = (w * scale).round().max(1.0) as u32;
        let height = (h * scale).round().max(1.0) as u32;
        Some(GlyphBitmap {
            width,
            height,
            coverage: vec![255; (width * height) as usize],
            bearing_x: 0.0,
            bearing_y: -(height as f32),
            advance_x: self.advance(ch) * scale,
            advance_y: 0.0,
        })
    }

    fn glyph_outline(&self, ch: char) -> Option<Path> {
        if ch.is_whitespace() {
            return None;
        }
        let (w, h) = self.block();
        Some(Path::rect(Rect::new(0.0, -h, w, h)))
    }

    fn advance(&self, _ch: char) -> f32 {
        self.size * 0.6
    }
}
