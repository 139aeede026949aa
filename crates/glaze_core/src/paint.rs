//! Paint sources for fills, strokes and text

use crate::color::Color;
use crate::geometry::{Point, Rect};
use crate::surface::PixelSurface;
use std::fmt;
use std::sync::Arc;

/// Per-point color source for paints the backends cannot express natively
pub type PaintSampler = Arc<dyn Fn(Point) -> Color + Send + Sync>;

/// A paint with no native representation
#[derive(Clone)]
pub struct CustomPaint {
    /// Identity used when hashing paint signatures
    pub id: u64,
    /// Whether every sampled color is fully opaque
    pub opaque: bool,
    pub sampler: PaintSampler,
}

impl CustomPaint {
    pub fn new(id: u64, opaque: bool, sampler: impl Fn(Point) -> Color + Send + Sync + 'static) -> Self {
        Self {
            id,
            opaque,
            sampler: Arc::new(sampler),
        }
    }

    pub fn sample(&self, point: Point) -> Color {
        (self.sampler)(point)
    }
}

impl fmt::Debug for CustomPaint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomPaint")
            .field("id", &self.id)
            .field("opaque", &self.opaque)
            .finish_non_exhaustive()
    }
}

/// Paint for filling or stroking
#[derive(Clone, Debug)]
pub enum Paint {
    /// Flat color
    Solid(Color),
    /// Two-stop linear gradient in user space
    LinearGradient {
        start: Point,
        end: Point,
        start_color: Color,
        end_color: Color,
        /// Mirror-repeat beyond the endpoints instead of clamping
        cyclic: bool,
    },
    /// Image tiled so that one copy covers `anchor`
    Pattern { image: PixelSurface, anchor: Rect },
    /// Arbitrary paint, rendered through per-vertex sampling
    Custom(CustomPaint),
}

impl Default for Paint {
    fn default() -> Self {
        Paint::Solid(Color::BLACK)
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

impl Paint {
    pub fn linear_gradient(start: Point, end: Point, start_color: Color, end_color: Color) -> Self {
        Paint::LinearGradient {
            start,
            end,
            start_color,
            end_color,
            cyclic: false,
        }
    }

    pub fn pattern(image: PixelSurface, anchor: Rect) -> Self {
        Paint::Pattern { image, anchor }
    }

    /// Whether the native pipeline can express this paint directly
    pub fn is_native(&self) -> bool {
        match self {
            Paint::Solid(_) | Paint::LinearGradient { .. } | Paint::Pattern { .. } => true,
            Paint::Custom(_) => false,
        }
    }

    pub fn is_opaque(&self) -> bool {
        match self {
            Paint::Solid(c) => c.is_opaque(),
            Paint::LinearGradient {
                start_color,
                end_color,
                ..
            } => start_color.is_opaque() && end_color.is_opaque(),
            Paint::Pattern { image, .. } => !image.has_alpha(),
            Paint::Custom(custom) => custom.opaque,
        }
    }

    pub fn as_solid(&self) -> Option<Color> {
        match self {
            Paint::Solid(c) => Some(*c),
            _ => None,
        }
    }

    /// Stable value used to key caches on paint identity
    pub fn signature(&self) -> u64 {
        fn bits(c: &Color) -> u64 {
            c.to_argb() as u64
        }
        match self {
            Paint::Solid(c) => bits(c),
            Paint::LinearGradient {
                start,
                end,
                start_color,
                end_color,
                cyclic,
            } => {
                let mut h = 0x9E37_79B9_7F4A_7C15u64;
                for v in [
                    start.x.to_bits() as u64,
                    start.y.to_bits() as u64,
                    end.x.to_bits() as u64,
                    end.y.to_bits() as u64,
                    bits(start_color),
                    bits(end_color),
                    *cyclic as u64,
                ] {
                    h = (h ^ v).wrapping_mul(0x0100_0000_01B3);
                }
                h
            }
            Paint::Pattern { image, .. } => image.id().raw() | 1 << 62,
            Paint::Custom(custom) => custom.id | 1 << 63,
        }
    }
}

/// Identity-aware equality: patterns compare by surface identity, custom paints by id
impl PartialEq for Paint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Paint::Solid(a), Paint::Solid(b)) => a == b,
            (
                Paint::LinearGradient {
                    start: s1,
                    end: e1,
                    start_color: c1,
                    end_color: d1,
                    cyclic: y1,
                },
                Paint::LinearGradient {
                    start: s2,
                    end: e2,
                    start_color: c2,
                    end_color: d2,
                    cyclic: y2,
                },
            ) => s1 == s2 && e1 == e2 && c1 == c2 && d1 == d2 && y1 == y2,
            (
                Paint::Pattern {
                    image: i1,
                    anchor: a1,
                },
                Paint::Pattern {
                    image: i2,
                    anchor: a2,
                },
            ) => i1.ptr_eq(i2) && a1 == a2,
            (Paint::Custom(a), Paint::Custom(b)) => a.id == b.id,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelFormat;

    #[test]
    fn test_native_predicate() {
        assert!(Paint::Solid(Color::RED).is_native());
        assert!(Paint::linear_gradient(Point::ZERO, Point::new(1.0, 0.0), Color::RED, Color::BLUE).is_native());
        assert!(!Paint::Custom(CustomPaint::new(7, true, |_| Color::RED)).is_native());
    }

    #[test]
    fn test_pattern_opacity_follows_surface() {
        let rgb = PixelSurface::new(2, 2, PixelFormat::IntRgb).unwrap();
        let argb = PixelSurface::new(2, 2, PixelFormat::IntArgb).unwrap();
        assert!(Paint::pattern(rgb, Rect::new(0.0, 0.0, 2.0, 2.0)).is_opaque());
        assert!(!Paint::pattern(argb, Rect::new(0.0, 0.0, 2.0, 2.0)).is_opaque());
    }

    #[test]
    fn test_signature_distinguishes_colors() {
        assert_ne!(
            Paint::Solid(Color::RED).signature(),
            Paint::Solid(Color::BLUE).signature()
        );
    }
}
