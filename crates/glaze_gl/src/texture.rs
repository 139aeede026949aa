//! Per-thread texture cache for CPU pixel surfaces
//!
//! Entries live in a slot arena keyed by [`TextureKey`] and are indexed by the
//! identity of the source surface. Each entry keeps only a weak reference to its
//! surface; `cleanup_textures` deletes the native texture of every entry whose
//! surface has been dropped. Native deletes require a current context.

use crate::error::{RenderError, Result};
use crate::format::{prepare_pixels, PixelLayout, PixelTransfer, PreparedPixels};
use crate::gl::{Filter, GlApi, PixelStore, StateCall, TexParam, TextureId, TextureTarget, Wrap};
use glaze_core::{IntRect, PixelFormat, PixelSurface, SurfaceId, WeakSurface};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use std::borrow::Cow;

new_key_type! {
    /// Stable key of a cached texture entry
    pub struct TextureKey;
}

/// How a surface's pixels are interpreted on upload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureUsage {
    /// Color image, stored premultiplied
    Image,
    /// `ByteGray` coverage mask replicated into every channel
    Coverage,
}

/// A native texture holding a surface's pixels in its top-left corner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureRecord {
    pub handle: TextureId,
    pub target: TextureTarget,
    pub padded_width: u32,
    pub padded_height: u32,
    pub used_width: u32,
    pub used_height: u32,
}

impl TextureRecord {
    /// Texture coordinates of the used region's far corner
    pub fn extent(&self) -> (f32, f32) {
        (
            self.used_width as f32 / self.padded_width as f32,
            self.used_height as f32 / self.padded_height as f32,
        )
    }
}

/// Texture dimensions for a `width` x `height` image
pub fn padded_size(width: u32, height: u32, npot: bool) -> (u32, u32) {
    if npot {
        (width.max(1), height.max(1))
    } else {
        (
            width.max(1).next_power_of_two(),
            height.max(1).next_power_of_two(),
        )
    }
}

struct TextureEntry {
    surface: WeakSurface,
    generation: u64,
    usage: TextureUsage,
    record: TextureRecord,
}

/// Cache of native textures keyed by surface identity
#[derive(Default)]
pub struct TextureCache {
    entries: SlotMap<TextureKey, TextureEntry>,
    by_surface: FxHashMap<SurfaceId, TextureKey>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached texture for `surface`, if one is registered
    pub fn find(&self, surface: &PixelSurface) -> Option<&TextureRecord> {
        let key = self.by_surface.get(&surface.id())?;
        self.entries.get(*key).map(|e| &e.record)
    }

    /// Whether a texture is registered for a still-reachable surface
    pub fn is_live(&self, surface: SurfaceId) -> bool {
        self.by_surface
            .get(&surface)
            .and_then(|key| self.entries.get(*key))
            .is_some_and(|e| e.surface.is_alive())
    }

    /// Register `record` for `surface`, deleting any texture it replaces
    pub fn add(
        &mut self,
        gl: &mut dyn GlApi,
        surface: &PixelSurface,
        record: TextureRecord,
        usage: TextureUsage,
    ) -> TextureKey {
        if let Some(old) = self
            .by_surface
            .remove(&surface.id())
            .and_then(|key| self.entries.remove(key))
        {
            if old.record.handle != record.handle {
                gl.delete_texture(old.record.handle);
            }
        }
        let key = self.entries.insert(TextureEntry {
            surface: surface.downgrade(),
            generation: surface.generation(),
            usage,
            record,
        });
        self.by_surface.insert(surface.id(), key);
        key
    }

    /// Delete the texture cached for `surface`
    pub fn remove(&mut self, gl: &mut dyn GlApi, surface: SurfaceId) -> bool {
        let Some(entry) = self
            .by_surface
            .remove(&surface)
            .and_then(|key| self.entries.remove(key))
        else {
            return false;
        };
        gl.delete_texture(entry.record.handle);
        tracing::trace!(surface = surface.raw(), "texture removed");
        true
    }

    /// Delete the textures of every surface dropped since the last sweep
    pub fn cleanup_textures(&mut self, gl: &mut dyn GlApi) -> usize {
        let dead: Vec<TextureKey> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.surface.is_alive())
            .map(|(key, _)| key)
            .collect();
        for key in &dead {
            if let Some(entry) = self.entries.remove(*key) {
                self.by_surface.remove(&entry.surface.id());
                gl.delete_texture(entry.record.handle);
            }
        }
        if !dead.is_empty() {
            tracing::debug!(count = dead.len(), "collected textures of dropped surfaces");
        }
        dead.len()
    }

    /// Texture holding the current pixels of `surface`
    ///
    /// Reuses the cached texture when it is current, re-uploads in place when the
    /// surface changed or outgrew the used region, and allocates otherwise.
    pub fn obtain(
        &mut self,
        gl: &mut dyn GlApi,
        surface: &PixelSurface,
        usage: TextureUsage,
        npot: bool,
        cleanup: bool,
    ) -> Result<TextureRecord> {
        let (width, height) = (surface.width(), surface.height());
        let generation = surface.generation();

        if let Some(entry) = self
            .by_surface
            .get(&surface.id())
            .copied()
            .and_then(|key| self.entries.get_mut(key))
        {
            let record = &mut entry.record;
            if entry.generation == generation
                && entry.usage == usage
                && width <= record.used_width
                && height <= record.used_height
            {
                return Ok(*record);
            }
            if width > record.padded_width || height > record.padded_height {
                let (pw, ph) = padded_size(width, height, npot);
                gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(record.handle)));
                gl.tex_image(TextureTarget::Texture2D, pw, ph, PixelLayout::RGBA_BYTES, None);
                record.padded_width = pw;
                record.padded_height = ph;
            }
            upload(gl, record.handle, surface, usage);
            record.used_width = width;
            record.used_height = height;
            entry.generation = generation;
            entry.usage = usage;
            tracing::trace!(surface = surface.id().raw(), "texture refreshed in place");
            return Ok(*record);
        }

        let handle = gl
            .gen_texture()
            .ok_or_else(|| RenderError::exhausted("texture"))?;
        let (pw, ph) = padded_size(width, height, npot);
        gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(handle)));
        for param in [
            TexParam::MinFilter(Filter::Nearest),
            TexParam::MagFilter(Filter::Nearest),
            TexParam::WrapS(Wrap::Clamp),
            TexParam::WrapT(Wrap::Clamp),
        ] {
            gl.apply(StateCall::TexParameter(TextureTarget::Texture2D, param));
        }
        gl.tex_image(TextureTarget::Texture2D, pw, ph, PixelLayout::RGBA_BYTES, None);
        upload(gl, handle, surface, usage);

        let record = TextureRecord {
            handle,
            target: TextureTarget::Texture2D,
            padded_width: pw,
            padded_height: ph,
            used_width: width,
            used_height: height,
        };
        self.add(gl, surface, record, usage);
        tracing::trace!(
            surface = surface.id().raw(),
            padded_width = pw,
            padded_height = ph,
            "texture created"
        );
        if cleanup {
            self.cleanup_textures(gl);
        }
        Ok(record)
    }

    /// Delete every cached texture
    pub fn release_all(&mut self, gl: &mut dyn GlApi) {
        for (_, entry) in self.entries.drain() {
            gl.delete_texture(entry.record.handle);
        }
        self.by_surface.clear();
    }

    /// Forget every entry without deleting; their context is gone
    pub fn abandon(&mut self) {
        self.entries.clear();
        self.by_surface.clear();
    }
}

/// Stream `surface` into the top-left corner of texture `handle`
fn upload(gl: &mut dyn GlApi, handle: TextureId, surface: &PixelSurface, usage: TextureUsage) {
    let full = IntRect::new(0, 0, surface.width() as i32, surface.height() as i32);
    gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(handle)));
    surface.read(|raw| {
        let prepared = match usage {
            TextureUsage::Coverage if surface.format() == PixelFormat::ByteGray => PreparedPixels {
                layout: PixelLayout::COVERAGE,
                data: Cow::Borrowed(raw),
                row_length: surface.width(),
                skip_pixels: 0,
                skip_rows: 0,
                transfer: PixelTransfer::IDENTITY,
                premultiplied: true,
            },
            _ => prepare_pixels(surface, full, true, raw),
        };
        with_unpack_state(gl, &prepared, |gl| {
            gl.tex_sub_image(
                TextureTarget::Texture2D,
                0,
                0,
                surface.width(),
                surface.height(),
                prepared.layout,
                &prepared.data,
            );
        });
    });
}

/// Run `f` with unpack and transfer state set for `prepared`, restoring defaults after
pub(crate) fn with_unpack_state(
    gl: &mut dyn GlApi,
    prepared: &PreparedPixels<'_>,
    f: impl FnOnce(&mut dyn GlApi),
) {
    gl.apply(StateCall::PixelStore(PixelStore::UnpackRowLength(prepared.row_length)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackSkipPixels(prepared.skip_pixels)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackSkipRows(prepared.skip_rows)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackAlignment(prepared.layout.alignment)));
    if !prepared.transfer.is_identity() {
        gl.apply(StateCall::PixelTransfer(prepared.transfer));
    }
    f(gl);
    if !prepared.transfer.is_identity() {
        gl.apply(StateCall::PixelTransfer(PixelTransfer::IDENTITY));
    }
    gl.apply(StateCall::PixelStore(PixelStore::UnpackRowLength(0)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackSkipPixels(0)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackSkipRows(0)));
    gl.apply(StateCall::PixelStore(PixelStore::UnpackAlignment(4)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_size_is_smallest_power_of_two() {
        assert_eq!(padded_size(1, 1, false), (1, 1));
        assert_eq!(padded_size(5, 17, false), (8, 32));
        assert_eq!(padded_size(64, 65, false), (64, 128));
        assert_eq!(padded_size(5, 17, true), (5, 17));
    }

    #[test]
    fn test_extent_fractions() {
        let record = TextureRecord {
            handle: TextureId(1),
            target: TextureTarget::Texture2D,
            padded_width: 8,
            padded_height: 32,
            used_width: 5,
            used_height: 17,
        };
        assert_eq!(record.extent(), (5.0 / 8.0, 17.0 / 32.0));
    }
}
