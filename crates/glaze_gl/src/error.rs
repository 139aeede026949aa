//! Rendering error types

use glaze_core::SurfaceError;
use thiserror::Error;

/// Errors surfaced by draw operations and runtime management
#[derive(Error, Debug)]
pub enum RenderError {
    /// A native allocation (texture, display list, off-screen buffer) failed
    #[error("Resource exhausted: could not allocate {resource}")]
    ResourceExhausted { resource: &'static str },

    /// The native context for a drawable could not be created
    #[error("Context creation failed: {0}")]
    ContextCreation(String),

    /// The render target has been torn down
    #[error("Render target disposed")]
    Disposed,

    /// Building a CPU surface failed
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// Reading or parsing configuration failed
    #[error("Config error: {0}")]
    Config(String),
}

impl RenderError {
    pub(crate) fn exhausted(resource: &'static str) -> Self {
        RenderError::ResourceExhausted { resource }
    }
}

/// Result type for rendering operations
pub type Result<T> = std::result::Result<T, RenderError>;
