//! Error types for surface construction

use crate::surface::PixelFormat;
use thiserror::Error;

/// Errors raised while building pixel surfaces
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Invalid surface dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Pixel buffer length mismatch: expected {expected} bytes, got {actual}")]
    DataLength { expected: usize, actual: usize },

    #[error("Format {0:?} requires a color palette")]
    MissingPalette(PixelFormat),
}

/// Result type for surface operations
pub type Result<T> = std::result::Result<T, SurfaceError>;
