//! CPU-resident pixel surfaces
//!
//! A `PixelSurface` is a cheap handle: clones share identity, pixel storage and
//! generation counter. Backends key their GPU caches on [`SurfaceId`] and check
//! liveness through [`WeakSurface`], so dropping the last handle is observable
//! deterministically without any collector involvement.

use crate::error::{Result, SurfaceError};
use crate::geometry::IntRect;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Logical pixel layouts a surface may carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Native-endian u32 `0x00RRGGBB`
    IntRgb,
    /// Native-endian u32 `0xAARRGGBB`
    IntArgb,
    /// Native-endian u32 `0xAARRGGBB`, premultiplied
    IntArgbPre,
    /// Native-endian u32 `0x00BBGGRR`
    IntBgr,
    /// Bytes `B, G, R`
    ThreeByteBgr,
    /// Bytes `A, B, G, R`
    FourByteAbgr,
    /// Bytes `A, B, G, R`, premultiplied
    FourByteAbgrPre,
    /// Native-endian u16 `RRRRRGGGGGGBBBBB`
    Ushort565Rgb,
    /// Native-endian u16 `xRRRRRGGGGGBBBBB`
    Ushort555Rgb,
    /// One luminance byte
    ByteGray,
    /// Native-endian u16 luminance
    UshortGray,
    /// One bit per pixel, most significant bit first, two-entry palette
    ByteBinary,
    /// One palette index byte
    ByteIndexed,
    /// Layout unknown to the backends; stored as non-premultiplied `R, G, B, A` bytes
    Custom,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 14] = [
        PixelFormat::IntRgb,
        PixelFormat::IntArgb,
        PixelFormat::IntArgbPre,
        PixelFormat::IntBgr,
        PixelFormat::ThreeByteBgr,
        PixelFormat::FourByteAbgr,
        PixelFormat::FourByteAbgrPre,
        PixelFormat::Ushort565Rgb,
        PixelFormat::Ushort555Rgb,
        PixelFormat::ByteGray,
        PixelFormat::UshortGray,
        PixelFormat::ByteBinary,
        PixelFormat::ByteIndexed,
        PixelFormat::Custom,
    ];

    pub fn has_alpha(&self) -> bool {
        matches!(
            self,
            PixelFormat::IntArgb
                | PixelFormat::IntArgbPre
                | PixelFormat::FourByteAbgr
                | PixelFormat::FourByteAbgrPre
                | PixelFormat::Custom
        )
    }

    pub fn is_premultiplied(&self) -> bool {
        matches!(self, PixelFormat::IntArgbPre | PixelFormat::FourByteAbgrPre)
    }

    pub fn uses_palette(&self) -> bool {
        matches!(self, PixelFormat::ByteIndexed | PixelFormat::ByteBinary)
    }

    /// Tightly packed row length in bytes
    pub fn row_bytes(&self, width: u32) -> usize {
        let w = width as usize;
        match self {
            PixelFormat::IntRgb
            | PixelFormat::IntArgb
            | PixelFormat::IntArgbPre
            | PixelFormat::IntBgr
            | PixelFormat::FourByteAbgr
            | PixelFormat::FourByteAbgrPre
            | PixelFormat::Custom => w * 4,
            PixelFormat::ThreeByteBgr => w * 3,
            PixelFormat::Ushort565Rgb | PixelFormat::Ushort555Rgb | PixelFormat::UshortGray => {
                w * 2
            }
            PixelFormat::ByteGray | PixelFormat::ByteIndexed => w,
            PixelFormat::ByteBinary => w.div_ceil(8),
        }
    }
}

/// Stable identity of a surface; shared by every clone of the handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    pub fn next() -> Self {
        SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct SurfaceInner {
    id: SurfaceId,
    width: u32,
    height: u32,
    format: PixelFormat,
    palette: Option<Arc<[u32]>>,
    pixels: RwLock<Vec<u8>>,
    generation: AtomicU64,
}

/// Shared handle to a CPU pixel surface
#[derive(Clone)]
pub struct PixelSurface {
    inner: Arc<SurfaceInner>,
}

impl std::fmt::Debug for PixelSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelSurface")
            .field("id", &self.inner.id)
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("format", &self.inner.format)
            .finish()
    }
}

impl PixelSurface {
    /// Zero-filled surface
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let len = format.row_bytes(width) * height as usize;
        Self::build(width, height, format, None, vec![0; len])
    }

    /// Surface over existing pixel bytes (tightly packed rows, top-down)
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        Self::build(width, height, format, None, data)
    }

    /// Palette-based surface (`ByteIndexed` or `ByteBinary`); palette entries are `0xAARRGGBB`
    pub fn with_palette(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Vec<u32>,
        data: Vec<u8>,
    ) -> Result<Self> {
        Self::build(width, height, format, Some(palette.into()), data)
    }

    /// Encode non-premultiplied ARGB pixels into a new surface of `format`
    pub fn from_argb(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Option<Vec<u32>>,
        argb: &[u32],
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        if argb.len() != expected {
            return Err(SurfaceError::DataLength {
                expected,
                actual: argb.len(),
            });
        }
        let palette: Option<Arc<[u32]>> = palette.map(Into::into);
        if format.uses_palette() && palette.is_none() {
            return Err(SurfaceError::MissingPalette(format));
        }
        let row_bytes = format.row_bytes(width);
        let mut data = vec![0u8; row_bytes * height as usize];
        for y in 0..height as usize {
            let row = &mut data[y * row_bytes..(y + 1) * row_bytes];
            for x in 0..width as usize {
                encode_pixel(
                    format,
                    palette.as_deref(),
                    row,
                    x,
                    argb[y * width as usize + x],
                );
            }
        }
        Self::build(width, height, format, palette, data)
    }

    fn build(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Option<Arc<[u32]>>,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidDimensions { width, height });
        }
        if format.uses_palette() && palette.as_ref().map_or(true, |p| p.is_empty()) {
            return Err(SurfaceError::MissingPalette(format));
        }
        let expected = format.row_bytes(width) * height as usize;
        if data.len() != expected {
            return Err(SurfaceError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            inner: Arc::new(SurfaceInner {
                id: SurfaceId::next(),
                width,
                height,
                format,
                palette,
                pixels: RwLock::new(data),
                generation: AtomicU64::new(0),
            }),
        })
    }

    pub fn id(&self) -> SurfaceId {
        self.inner.id
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn format(&self) -> PixelFormat {
        self.inner.format
    }

    /// Color model of palette-based surfaces
    pub fn palette(&self) -> Option<&[u32]> {
        self.inner.palette.as_deref()
    }

    pub fn has_alpha(&self) -> bool {
        self.inner.format.has_alpha()
            || self
                .inner
                .palette
                .as_deref()
                .is_some_and(|p| p.iter().any(|c| c >> 24 != 0xFF))
    }

    pub fn is_alpha_premultiplied(&self) -> bool {
        self.inner.format.is_premultiplied()
    }

    pub fn row_bytes(&self) -> usize {
        self.inner.format.row_bytes(self.inner.width)
    }

    /// Bumped by every [`PixelSurface::write`]; caches compare it to detect stale uploads
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Mark contents as changed without touching them
    pub fn mark_modified(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Read access to the raw pixel bytes
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self
            .inner
            .pixels
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    /// Write access to the raw pixel bytes; bumps the generation
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let result = {
            let mut guard = self
                .inner
                .pixels
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut guard)
        };
        self.mark_modified();
        result
    }

    /// Non-premultiplied `0xAARRGGBB` at (x, y)
    pub fn argb_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let row_bytes = self.row_bytes();
        let y = y as usize;
        Some(self.read(|data| {
            decode_pixel(
                self.format(),
                self.palette(),
                &data[y * row_bytes..(y + 1) * row_bytes],
                x as usize,
            )
        }))
    }

    /// Pixels of `rect` as `0xAARRGGBB`, rows top-down
    ///
    /// `premultiplied` selects the output representation, independent of the
    /// surface's own storage.
    pub fn read_argb(&self, rect: IntRect, premultiplied: bool) -> Vec<u32> {
        let bounds = IntRect::new(0, 0, self.width() as i32, self.height() as i32);
        let Some(rect) = rect.intersect(&bounds) else {
            return Vec::new();
        };
        let row_bytes = self.row_bytes();
        let format = self.format();
        let palette = self.palette();
        let mut out = Vec::with_capacity(rect.area() as usize);
        self.read(|data| {
            for y in rect.y..rect.max_y() {
                let row = &data[y as usize * row_bytes..(y as usize + 1) * row_bytes];
                for x in rect.x..rect.max_x() {
                    let argb = decode_pixel(format, palette, row, x as usize);
                    out.push(if premultiplied {
                        premultiply_argb(argb)
                    } else {
                        argb
                    });
                }
            }
        });
        out
    }

    pub fn downgrade(&self) -> WeakSurface {
        WeakSurface {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &PixelSurface) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Non-owning reference used for liveness checks
#[derive(Clone, Debug)]
pub struct WeakSurface {
    id: SurfaceId,
    inner: Weak<SurfaceInner>,
}

impl WeakSurface {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<PixelSurface> {
        self.inner.upgrade().map(|inner| PixelSurface { inner })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pixel Codecs
// ─────────────────────────────────────────────────────────────────────────────

pub fn premultiply_argb(argb: u32) -> u32 {
    let a = argb >> 24;
    if a == 0xFF {
        return argb;
    }
    if a == 0 {
        return 0;
    }
    let mul = |c: u32| (c * a + 127) / 255;
    a << 24 | mul((argb >> 16) & 0xFF) << 16 | mul((argb >> 8) & 0xFF) << 8 | mul(argb & 0xFF)
}

pub fn unpremultiply_argb(argb: u32) -> u32 {
    let a = argb >> 24;
    if a == 0xFF {
        return argb;
    }
    if a == 0 {
        return 0;
    }
    let div = |c: u32| ((c * 255 + a / 2) / a).min(255);
    a << 24 | div((argb >> 16) & 0xFF) << 16 | div((argb >> 8) & 0xFF) << 8 | div(argb & 0xFF)
}

fn expand5(v: u32) -> u32 {
    (v << 3) | (v >> 2)
}

fn expand6(v: u32) -> u32 {
    (v << 2) | (v >> 4)
}

fn gray_of(argb: u32) -> u32 {
    let r = (argb >> 16) & 0xFF;
    let g = (argb >> 8) & 0xFF;
    let b = argb & 0xFF;
    (77 * r + 150 * g + 29 * b + 128) >> 8
}

fn read_u32(row: &[u8], x: usize) -> u32 {
    let o = x * 4;
    u32::from_ne_bytes([row[o], row[o + 1], row[o + 2], row[o + 3]])
}

fn read_u16(row: &[u8], x: usize) -> u32 {
    let o = x * 2;
    u16::from_ne_bytes([row[o], row[o + 1]]) as u32
}

fn palette_entry(palette: Option<&[u32]>, index: usize) -> u32 {
    palette
        .and_then(|p| p.get(index).copied())
        .unwrap_or(0xFF000000)
}

/// Decode one pixel of a tightly packed row into non-premultiplied ARGB
pub fn decode_pixel(format: PixelFormat, palette: Option<&[u32]>, row: &[u8], x: usize) -> u32 {
    match format {
        PixelFormat::IntRgb => 0xFF000000 | (read_u32(row, x) & 0x00FF_FFFF),
        PixelFormat::IntArgb => read_u32(row, x),
        PixelFormat::IntArgbPre => unpremultiply_argb(read_u32(row, x)),
        PixelFormat::IntBgr => {
            let v = read_u32(row, x);
            0xFF000000 | (v & 0xFF) << 16 | (v & 0xFF00) | (v >> 16) & 0xFF
        }
        PixelFormat::ThreeByteBgr => {
            let o = x * 3;
            0xFF000000 | (row[o + 2] as u32) << 16 | (row[o + 1] as u32) << 8 | row[o] as u32
        }
        PixelFormat::FourByteAbgr | PixelFormat::FourByteAbgrPre => {
            let o = x * 4;
            let argb = (row[o] as u32) << 24
                | (row[o + 3] as u32) << 16
                | (row[o + 2] as u32) << 8
                | row[o + 1] as u32;
            if format == PixelFormat::FourByteAbgrPre {
                unpremultiply_argb(argb)
            } else {
                argb
            }
        }
        PixelFormat::Ushort565Rgb => {
            let v = read_u16(row, x);
            0xFF000000
                | expand5(v >> 11) << 16
                | expand6((v >> 5) & 0x3F) << 8
                | expand5(v & 0x1F)
        }
        PixelFormat::Ushort555Rgb => {
            let v = read_u16(row, x);
            0xFF000000
                | expand5((v >> 10) & 0x1F) << 16
                | expand5((v >> 5) & 0x1F) << 8
                | expand5(v & 0x1F)
        }
        PixelFormat::ByteGray => {
            let g = row[x] as u32;
            0xFF000000 | g << 16 | g << 8 | g
        }
        PixelFormat::UshortGray => {
            let g = read_u16(row, x) >> 8;
            0xFF000000 | g << 16 | g << 8 | g
        }
        PixelFormat::ByteBinary => {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            palette_entry(palette, bit as usize)
        }
        PixelFormat::ByteIndexed => palette_entry(palette, row[x] as usize),
        PixelFormat::Custom => {
            let o = x * 4;
            (row[o + 3] as u32) << 24
                | (row[o] as u32) << 16
                | (row[o + 1] as u32) << 8
                | row[o + 2] as u32
        }
    }
}

fn nearest_palette_index(palette: Option<&[u32]>, argb: u32) -> usize {
    let Some(palette) = palette else {
        return 0;
    };
    if let Some(exact) = palette.iter().position(|&c| c == argb) {
        return exact;
    }
    let channel = |c: u32, shift: u32| ((c >> shift) & 0xFF) as i64;
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, &c)| {
            [24, 16, 8, 0]
                .iter()
                .map(|&s| (channel(c, s) - channel(argb, s)).pow(2))
                .sum::<i64>()
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Encode one non-premultiplied ARGB pixel into a tightly packed row
pub fn encode_pixel(
    format: PixelFormat,
    palette: Option<&[u32]>,
    row: &mut [u8],
    x: usize,
    argb: u32,
) {
    let r = (argb >> 16) & 0xFF;
    let g = (argb >> 8) & 0xFF;
    let b = argb & 0xFF;
    let a = argb >> 24;
    let put_u32 = |row: &mut [u8], v: u32| row[x * 4..x * 4 + 4].copy_from_slice(&v.to_ne_bytes());
    let put_u16 =
        |row: &mut [u8], v: u32| row[x * 2..x * 2 + 2].copy_from_slice(&(v as u16).to_ne_bytes());
    match format {
        PixelFormat::IntRgb => put_u32(row, argb & 0x00FF_FFFF),
        PixelFormat::IntArgb => put_u32(row, argb),
        PixelFormat::IntArgbPre => put_u32(row, premultiply_argb(argb)),
        PixelFormat::IntBgr => put_u32(row, b << 16 | g << 8 | r),
        PixelFormat::ThreeByteBgr => {
            row[x * 3] = b as u8;
            row[x * 3 + 1] = g as u8;
            row[x * 3 + 2] = r as u8;
        }
        PixelFormat::FourByteAbgr | PixelFormat::FourByteAbgrPre => {
            let v = if format == PixelFormat::FourByteAbgrPre {
                premultiply_argb(argb)
            } else {
                argb
            };
            row[x * 4] = (v >> 24) as u8;
            row[x * 4 + 1] = v as u8;
            row[x * 4 + 2] = (v >> 8) as u8;
            row[x * 4 + 3] = (v >> 16) as u8;
        }
        PixelFormat::Ushort565Rgb => put_u16(row, (r >> 3) << 11 | (g >> 2) << 5 | b >> 3),
        PixelFormat::Ushort555Rgb => put_u16(row, (r >> 3) << 10 | (g >> 3) << 5 | b >> 3),
        PixelFormat::ByteGray => row[x] = gray_of(argb) as u8,
        PixelFormat::UshortGray => put_u16(row, gray_of(argb) * 257),
        PixelFormat::ByteBinary => {
            let bit = nearest_palette_index(palette, argb) as u8 & 1;
            let mask = 1u8 << (7 - (x % 8));
            if bit == 1 {
                row[x / 8] |= mask;
            } else {
                row[x / 8] &= !mask;
            }
        }
        PixelFormat::ByteIndexed => row[x] = nearest_palette_index(palette, argb) as u8,
        PixelFormat::Custom => {
            row[x * 4] = r as u8;
            row[x * 4 + 1] = g as u8;
            row[x * 4 + 2] = b as u8;
            row[x * 4 + 3] = a as u8;
        }
    }
}
