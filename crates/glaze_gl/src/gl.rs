//! Immediate-mode native graphics API seam
//!
//! Everything the core issues to the driver goes through [`GlApi`]. State calls
//! are values ([`StateCall`]) so they can be logged, compared and compiled into
//! display lists; resource calls return `Option` where the driver may refuse an
//! allocation.

use crate::format::{PixelLayout, PixelTransfer};

/// Native texture object name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Native display list name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub u32);

/// Toggleable pipeline capabilities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    ScissorTest,
    StencilTest,
    /// Bitwise XOR of source and destination instead of blending
    ColorLogicOp,
    Texture1D,
    Texture2D,
    TexGenS,
    TexGenT,
    LineStipple,
    Dither,
    VertexArray,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Source and destination factors; the destination factor also weights destination alpha
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendFactors {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    /// Factor applied to the source alpha component
    pub src_alpha: BlendFactor,
}

impl BlendFactors {
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src,
            dst,
            src_alpha: src,
        }
    }

    pub const fn with_alpha(src: BlendFactor, dst: BlendFactor, src_alpha: BlendFactor) -> Self {
        Self {
            src,
            dst,
            src_alpha,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wrap {
    Clamp,
    Repeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexParam {
    MinFilter(Filter),
    MagFilter(Filter),
    WrapS(Wrap),
    WrapT(Wrap),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TexCoord {
    S,
    T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelStore {
    UnpackRowLength(u32),
    UnpackSkipPixels(u32),
    UnpackSkipRows(u32),
    UnpackAlignment(u32),
    PackAlignment(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorBuffer {
    Front,
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilFunc {
    Always,
    Equal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Replace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveMode {
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleFan,
    Quads,
}

impl PrimitiveMode {
    pub fn is_line(&self) -> bool {
        matches!(
            self,
            PrimitiveMode::Lines | PrimitiveMode::LineStrip | PrimitiveMode::LineLoop
        )
    }
}

/// One native pipeline state change
#[derive(Clone, Debug, PartialEq)]
pub enum StateCall {
    Enable(Capability),
    Disable(Capability),
    /// Window-space viewport, origin bottom-left
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    /// Projection mapping (0, 0) to the top-left and (width, height) to the bottom-right
    Ortho { width: f32, height: f32 },
    /// Column-major model-view matrix
    LoadModelview([f32; 16]),
    /// Current vertex color, premultiplied
    Color([f32; 4]),
    /// Window-space scissor box, origin bottom-left
    Scissor { x: i32, y: i32, width: u32, height: u32 },
    BlendFunc(BlendFactors),
    LogicOpXor,
    LineWidth(f32),
    /// `pattern` bit i gates the i-th run of `factor` pixels, least significant first
    LineStipple { factor: u16, pattern: u16 },
    PixelStore(PixelStore),
    PixelTransfer(PixelTransfer),
    PixelZoom { x: f32, y: f32 },
    /// Raster position in window coordinates, origin bottom-left
    WindowPos { x: f32, y: f32 },
    ClearColor([f32; 4]),
    Clear { color: bool, stencil: bool },
    StencilFunc { func: StencilFunc, reference: u8 },
    StencilOp(StencilOp),
    ColorMask(bool),
    BindTexture(TextureTarget, Option<TextureId>),
    TexParameter(TextureTarget, TexParam),
    /// Object-linear generation plane for one texture coordinate
    TexGenPlane(TexCoord, [f32; 4]),
    DrawBuffer(ColorBuffer),
    ReadBuffer(ColorBuffer),
}

/// Immediate-mode driver interface
///
/// Texture and pixel calls operate on the texture bound to `target` and honor
/// the current pixel-store, pixel-transfer and raster state, as the native API does.
pub trait GlApi {
    /// Apply one state change (compiled instead while a display list is open).
    fn apply(&mut self, call: StateCall);

    /// Allocate a texture name; `None` when the driver is out of resources.
    fn gen_texture(&mut self) -> Option<TextureId>;

    fn delete_texture(&mut self, texture: TextureId);

    /// (Re)define the bound texture's storage; `data` may be `None` to allocate only.
    fn tex_image(
        &mut self,
        target: TextureTarget,
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Option<&[u8]>,
    );

    /// Replace a region of the bound texture.
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image(
        &mut self,
        target: TextureTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: &[u8],
    );

    /// Allocate a display list name; `None` when the driver is out of resources.
    fn gen_list(&mut self) -> Option<ListId>;

    /// Start compiling into `list`; subsequent state and draw calls are recorded, not executed.
    fn begin_list(&mut self, list: ListId);

    fn end_list(&mut self);

    fn call_list(&mut self, list: ListId);

    fn delete_list(&mut self, list: ListId);

    /// Submit vertices with optional per-vertex texture coordinates and colors.
    fn draw(
        &mut self,
        mode: PrimitiveMode,
        vertices: &[[f32; 2]],
        tex_coords: Option<&[[f32; 2]]>,
        colors: Option<&[[f32; 4]]>,
    );

    /// Stream pixels to the draw buffer at the raster position.
    fn draw_pixels(&mut self, width: u32, height: u32, layout: PixelLayout, data: &[u8]);

    /// Read a window-space rectangle of the read buffer, bottom row first.
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        layout: PixelLayout,
        out: &mut [u8],
    );

    /// Copy a window-space rectangle of the read drawable to the raster position.
    fn copy_pixels(&mut self, x: i32, y: i32, width: u32, height: u32);

    fn flush(&mut self);
}
