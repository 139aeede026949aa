//! Glaze Core
//!
//! Value types shared between the drawing interface and its backends:
//! geometry, colors, paints, compositing rules, strokes, paths, clip regions,
//! CPU pixel surfaces, and the glyph and native-window interfaces a backend
//! consumes. The [`Graphics2D`] trait is the drawing surface backends implement.

pub mod color;
pub mod composite;
pub mod error;
pub mod geometry;
pub mod glyph;
pub mod graphics;
pub mod paint;
pub mod path;
pub mod region;
pub mod stroke;
pub mod surface;
pub mod window;

pub use color::Color;
pub use composite::{Composite, CompositeRule};
pub use error::{Result, SurfaceError};
pub use geometry::{Affine2D, IntRect, Point, Rect, Size};
pub use glyph::{GlyphBitmap, GlyphProvider, PositionedGlyph};
pub use graphics::Graphics2D;
pub use paint::{CustomPaint, Paint, PaintSampler};
pub use path::{Path, PathBuilder, PathCommand};
pub use region::ClipRegion;
pub use stroke::{Dash, LineCap, LineJoin, Stroke};
pub use surface::{PixelFormat, PixelSurface, SurfaceId, WeakSurface};
pub use window::{DeviceContextId, DrawableId, NativeWindow};
