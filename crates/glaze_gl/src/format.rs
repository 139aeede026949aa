//! Pixel format table
//!
//! Maps each logical [`PixelFormat`] to the native transfer layout used when
//! streaming or uploading its pixels, and flags the formats that must be
//! converted on the CPU first.

use glaze_core::{IntRect, PixelFormat, PixelSurface};
use std::borrow::Cow;

/// Component order of a native pixel transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    Rgba,
    Bgra,
    Rgb,
    Bgr,
    /// Bytes A, B, G, R
    Abgr,
    Luminance,
    /// One value replicated into all four channels
    Intensity,
}

/// Storage type of a native pixel transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    UnsignedByte,
    UnsignedShort,
    /// u32 with the first component in the low byte
    Packed8888Rev,
    /// u32 with the first component in the high byte
    Packed8888,
    /// u16 with the first component in the high five bits
    Packed565,
    /// u16 with the first component in the low five bits, alpha in the top bit
    Packed1555Rev,
}

/// Native description of pixel memory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelLayout {
    pub order: ChannelOrder,
    pub ty: NativeType,
    /// Row alignment in bytes
    pub alignment: u32,
}

impl PixelLayout {
    pub const fn new(order: ChannelOrder, ty: NativeType, alignment: u32) -> Self {
        Self {
            order,
            ty,
            alignment,
        }
    }

    /// Layout of native-endian `0xAARRGGBB` words
    pub const ARGB: PixelLayout =
        PixelLayout::new(ChannelOrder::Bgra, NativeType::Packed8888Rev, 4);

    /// Layout of byte-sized `R, G, B, A` texels
    pub const RGBA_BYTES: PixelLayout =
        PixelLayout::new(ChannelOrder::Rgba, NativeType::UnsignedByte, 4);

    /// Single-byte coverage replicated into every channel
    pub const COVERAGE: PixelLayout =
        PixelLayout::new(ChannelOrder::Intensity, NativeType::UnsignedByte, 1);

    pub fn components(&self) -> usize {
        match self.order {
            ChannelOrder::Rgba | ChannelOrder::Bgra | ChannelOrder::Abgr => 4,
            ChannelOrder::Rgb | ChannelOrder::Bgr => 3,
            ChannelOrder::Luminance | ChannelOrder::Intensity => 1,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self.ty {
            NativeType::UnsignedByte => self.components(),
            NativeType::UnsignedShort => self.components() * 2,
            NativeType::Packed8888Rev | NativeType::Packed8888 => 4,
            NativeType::Packed565 | NativeType::Packed1555Rev => 2,
        }
    }

    /// Row stride for `row_length` pixels, honoring the alignment
    pub fn row_stride(&self, row_length: u32) -> usize {
        let raw = row_length as usize * self.bytes_per_pixel();
        let align = self.alignment.max(1) as usize;
        raw.div_ceil(align) * align
    }
}

/// Table entry for one logical format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub layout: PixelLayout,
    /// Pixels must go through the CPU converter before any native transfer
    pub needs_conversion: bool,
    /// The alpha bits hold garbage and must be forced to one during transfer
    pub force_opaque: bool,
    pub premultiplied: bool,
}

const fn direct(order: ChannelOrder, ty: NativeType, alignment: u32) -> FormatDescriptor {
    FormatDescriptor {
        layout: PixelLayout::new(order, ty, alignment),
        needs_conversion: false,
        force_opaque: false,
        premultiplied: false,
    }
}

/// Converted formats land in the `0xAARRGGBB` layout
const CONVERTED: FormatDescriptor = FormatDescriptor {
    layout: PixelLayout::ARGB,
    needs_conversion: true,
    force_opaque: false,
    premultiplied: false,
};

/// Native transfer descriptor for `format`; total over every format
pub fn lookup(format: PixelFormat) -> FormatDescriptor {
    use ChannelOrder::*;
    use NativeType::*;
    match format {
        PixelFormat::IntRgb => FormatDescriptor {
            force_opaque: true,
            ..direct(Bgra, Packed8888Rev, 4)
        },
        PixelFormat::IntArgb => direct(Bgra, Packed8888Rev, 4),
        PixelFormat::IntArgbPre => FormatDescriptor {
            premultiplied: true,
            ..direct(Bgra, Packed8888Rev, 4)
        },
        PixelFormat::IntBgr => FormatDescriptor {
            force_opaque: true,
            ..direct(Rgba, Packed8888Rev, 4)
        },
        PixelFormat::ThreeByteBgr => direct(Bgr, UnsignedByte, 1),
        PixelFormat::FourByteAbgr => direct(Abgr, UnsignedByte, 4),
        PixelFormat::FourByteAbgrPre => FormatDescriptor {
            premultiplied: true,
            ..direct(Abgr, UnsignedByte, 4)
        },
        PixelFormat::Ushort565Rgb => direct(Rgb, Packed565, 2),
        PixelFormat::Ushort555Rgb => FormatDescriptor {
            force_opaque: true,
            ..direct(Bgra, Packed1555Rev, 2)
        },
        PixelFormat::ByteGray => direct(Luminance, UnsignedByte, 1),
        PixelFormat::UshortGray => direct(Luminance, UnsignedShort, 2),
        PixelFormat::ByteBinary | PixelFormat::ByteIndexed | PixelFormat::Custom => CONVERTED,
    }
}

/// Pixel transfer scale and bias applied to every component during a transfer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelTransfer {
    pub scale: [f32; 4],
    pub bias: [f32; 4],
}

impl PixelTransfer {
    pub const IDENTITY: PixelTransfer = PixelTransfer {
        scale: [1.0; 4],
        bias: [0.0; 4],
    };

    /// Replace the source alpha with the scaled constant one
    pub fn force_opaque(mut self) -> Self {
        self.bias[3] = self.scale[3];
        self.scale[3] = 0.0;
        self
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Pixels ready for a native transfer of one rectangle
#[derive(Debug)]
pub struct PreparedPixels<'a> {
    pub layout: PixelLayout,
    pub data: Cow<'a, [u8]>,
    /// Pixels per row in `data`
    pub row_length: u32,
    pub skip_pixels: u32,
    pub skip_rows: u32,
    pub transfer: PixelTransfer,
    /// Whether the transferred color channels are premultiplied
    pub premultiplied: bool,
}

/// Prepare `rect` of `surface` for transfer
///
/// `premultiply` requests premultiplied output for sources with alpha; formats
/// the table cannot express natively are always converted.
pub fn prepare_pixels<'a>(
    surface: &PixelSurface,
    rect: IntRect,
    premultiply: bool,
    raw: &'a [u8],
) -> PreparedPixels<'a> {
    let desc = lookup(surface.format());
    let has_alpha = surface.has_alpha();
    let convert =
        desc.needs_conversion || (premultiply && has_alpha && !desc.premultiplied);
    if convert {
        let premultiplied = premultiply && has_alpha;
        let argb = surface.read_argb(rect, premultiplied);
        let bytes: &[u8] = bytemuck::cast_slice(&argb);
        return PreparedPixels {
            layout: PixelLayout::ARGB,
            data: Cow::Owned(bytes.to_vec()),
            row_length: rect.width as u32,
            skip_pixels: 0,
            skip_rows: 0,
            transfer: PixelTransfer::IDENTITY,
            premultiplied: premultiplied || !has_alpha,
        };
    }
    let transfer = if desc.force_opaque {
        PixelTransfer::IDENTITY.force_opaque()
    } else {
        PixelTransfer::IDENTITY
    };
    PreparedPixels {
        layout: desc.layout,
        data: Cow::Borrowed(raw),
        row_length: surface.width(),
        skip_pixels: rect.x as u32,
        skip_rows: rect.y as u32,
        transfer,
        premultiplied: desc.premultiplied || !has_alpha,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_total() {
        for format in PixelFormat::ALL {
            let desc = lookup(format);
            assert!(desc.layout.bytes_per_pixel() > 0);
        }
    }

    #[test]
    fn test_conversion_required_formats() {
        let converted: Vec<_> = PixelFormat::ALL
            .into_iter()
            .filter(|f| lookup(*f).needs_conversion)
            .collect();
        assert_eq!(
            converted,
            vec![PixelFormat::ByteBinary, PixelFormat::ByteIndexed, PixelFormat::Custom]
        );
        assert_eq!(lookup(PixelFormat::Custom).layout, PixelLayout::ARGB);
    }

    #[test]
    fn test_packed_bytes_per_pixel_matches_surface_rows() {
        for format in PixelFormat::ALL {
            let desc = lookup(format);
            if desc.needs_conversion {
                continue;
            }
            assert_eq!(
                desc.layout.bytes_per_pixel() * 7,
                format.row_bytes(7),
                "{format:?}"
            );
        }
    }

    #[test]
    fn test_row_stride_alignment() {
        let layout = PixelLayout::new(ChannelOrder::Bgr, NativeType::UnsignedByte, 4);
        assert_eq!(layout.row_stride(5), 16);
        assert_eq!(PixelLayout::ARGB.row_stride(5), 20);
    }

    #[test]
    fn test_prepare_indexed_converts_to_argb() {
        let surface = PixelSurface::with_palette(
            2,
            1,
            PixelFormat::ByteIndexed,
            vec![0xFFFF0000, 0xFF00FF00],
            vec![1, 0],
        )
        .unwrap();
        surface.read(|raw| {
            let prepared = prepare_pixels(&surface, IntRect::new(0, 0, 2, 1), false, raw);
            assert_eq!(prepared.layout, PixelLayout::ARGB);
            let words: Vec<u32> = prepared
                .data
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            assert_eq!(words, vec![0xFF00FF00, 0xFFFF0000]);
        });
    }

    #[test]
    fn test_prepare_direct_uses_skip_offsets() {
        let surface = PixelSurface::new(8, 8, PixelFormat::ByteGray).unwrap();
        surface.read(|raw| {
            let prepared = prepare_pixels(&surface, IntRect::new(2, 3, 4, 4), false, raw);
            assert_eq!(prepared.row_length, 8);
            assert_eq!((prepared.skip_pixels, prepared.skip_rows), (2, 3));
            assert!(matches!(prepared.data, Cow::Borrowed(_)));
        });
    }

    #[test]
    fn test_force_opaque_transfer() {
        let transfer = PixelTransfer {
            scale: [0.5; 4],
            bias: [0.0; 4],
        }
        .force_opaque();
        assert_eq!(transfer.scale[3], 0.0);
        assert_eq!(transfer.bias[3], 0.5);
    }
}
