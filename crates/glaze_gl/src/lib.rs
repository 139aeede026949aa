//! Glaze GL Backend
//!
//! Immediate-mode GPU rendering for the [`glaze_core::Graphics2D`] interface.
//!
//! A [`RenderThread`] owns one thread's native contexts, texture and glyph
//! caches and render-target states; [`SurfaceRenderTarget`]s bound to it draw
//! through the [`GlApi`] seam. [`headless`] provides a software implementation
//! of that seam for tests and diagnostics.
//!
//! ```ignore
//! let mut manager = HeadlessContextManager::new();
//! let window = manager.create_window(640, 480);
//! let runtime = RenderThread::with_defaults(manager);
//! let mut target = SurfaceRenderTarget::for_window(&runtime, &window)?;
//! target.set_color(Color::RED);
//! target.fill_rect(Rect::new(10.0, 10.0, 50.0, 50.0))?;
//! ```

mod blit;
pub mod composite;
pub mod config;
pub mod context;
mod dispose;
mod draw;
pub mod error;
pub mod format;
pub mod gl;
pub mod glyph;
pub mod headless;
pub mod runtime;
pub mod state;
pub mod stipple;
pub mod target;
pub mod tessellate;
pub mod texture;
pub mod validator;

pub use composite::{translate, BlendSetup};
pub use config::RenderConfig;
pub use context::{ContextId, ContextManager, OffscreenBuffer, OffscreenPool};
pub use dispose::DisposeHandle;
pub use error::{RenderError, Result};
pub use format::{lookup, FormatDescriptor, PixelLayout, PixelTransfer};
pub use gl::{GlApi, ListId, StateCall, TextureId};
pub use glyph::GlyphRenderCache;
pub use headless::{BlockFont, HeadlessContextManager, HeadlessGl, HeadlessWindow};
pub use runtime::{RenderThread, SharedRenderThread};
pub use state::{StatePiece, TargetKey};
pub use stipple::{dash_to_stipple, Stipple};
pub use target::SurfaceRenderTarget;
pub use texture::{TextureCache, TextureRecord, TextureUsage};
pub use validator::{RenderStateValidator, ValidateOutcome};
