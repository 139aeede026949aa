//! Glyph display-list cache
//!
//! Two levels: an LRU of font strikes keyed by font identity, rasterization
//! scale, paint signature and antialiasing, each holding the compiled
//! display list of every glyph drawn with it. A glyph's list draws a quad
//! textured with the glyph's coverage, so an entry is only usable while its
//! coverage texture is still live in the [`TextureCache`].

use crate::error::{RenderError, Result};
use crate::gl::{GlApi, ListId, PrimitiveMode, StateCall, TextureTarget};
use crate::texture::{TextureCache, TextureUsage};
use glaze_core::{GlyphProvider, Paint, PixelFormat, PixelSurface};
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;

struct GlyphEntry {
    list: ListId,
    /// Coverage surface the list's texture was built from
    surface: PixelSurface,
}

#[derive(Default)]
struct Strike {
    glyphs: FxHashMap<char, GlyphEntry>,
}

impl Strike {
    fn release(self, gl: &mut dyn GlApi, textures: &mut TextureCache) {
        for (_, entry) in self.glyphs {
            gl.delete_list(entry.list);
            textures.remove(gl, entry.surface.id());
        }
    }
}

/// Identity of one font, scale, paint and antialiasing combination
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StrikeKey {
    font_id: u64,
    scale_bits: u32,
    paint: u64,
    antialias: bool,
}

pub fn strike_key(font_id: u64, scale: f32, paint: &Paint, antialias: bool) -> StrikeKey {
    StrikeKey {
        font_id,
        scale_bits: scale.to_bits(),
        paint: paint.signature(),
        antialias,
    }
}

/// A glyph to look up or build
pub(crate) struct GlyphRequest<'a> {
    pub font: &'a dyn GlyphProvider,
    pub strike: StrikeKey,
    pub ch: char,
    pub scale: f32,
    pub antialias: bool,
    pub npot: bool,
    pub cleanup: bool,
}

pub struct GlyphRenderCache {
    strikes: LruCache<StrikeKey, Strike>,
}

impl GlyphRenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            strikes: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Number of cached strikes
    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    /// Number of cached glyphs across every strike
    pub fn glyph_count(&self) -> usize {
        self.strikes.iter().map(|(_, s)| s.glyphs.len()).sum()
    }

    pub fn contains_strike(&self, key: StrikeKey) -> bool {
        self.strikes.contains(&key)
    }

    /// Display list drawing `request.ch`, building it if missing or stale
    ///
    /// `None` for glyphs without an image.
    pub(crate) fn glyph(
        &mut self,
        gl: &mut dyn GlApi,
        textures: &mut TextureCache,
        request: &GlyphRequest<'_>,
    ) -> Result<Option<ListId>> {
        if !self.strikes.contains(&request.strike) {
            if let Some((evicted_key, evicted)) = self.strikes.push(request.strike, Strike::default())
            {
                tracing::debug!(strike = ?evicted_key, glyphs = evicted.glyphs.len(), "glyph strike evicted");
                evicted.release(gl, textures);
            }
        }
        let Some(strike) = self.strikes.get_mut(&request.strike) else {
            return Ok(None);
        };

        if let Some(entry) = strike.glyphs.get(&request.ch) {
            if textures.is_live(entry.surface.id()) {
                return Ok(Some(entry.list));
            }
        }
        if let Some(stale) = strike.glyphs.remove(&request.ch) {
            tracing::trace!(ch = ?request.ch, "stale glyph rebuilt");
            gl.delete_list(stale.list);
            textures.remove(gl, stale.surface.id());
        }

        let Some(bitmap) = request
            .font
            .glyph_bitmap(request.ch, request.scale, request.antialias)
            .filter(|b| b.width > 0 && b.height > 0)
        else {
            return Ok(None);
        };
        let surface = PixelSurface::from_data(
            bitmap.width,
            bitmap.height,
            PixelFormat::ByteGray,
            bitmap.coverage,
        )?;
        let record = textures.obtain(
            gl,
            &surface,
            TextureUsage::Coverage,
            request.npot,
            request.cleanup,
        )?;
        let Some(list) = gl.gen_list() else {
            textures.remove(gl, surface.id());
            return Err(RenderError::exhausted("display list"));
        };

        let scale = request.scale;
        let (x0, y0) = (bitmap.bearing_x / scale, bitmap.bearing_y / scale);
        let (x1, y1) = (
            x0 + bitmap.width as f32 / scale,
            y0 + bitmap.height as f32 / scale,
        );
        let (s, t) = record.extent();
        gl.begin_list(list);
        gl.apply(StateCall::BindTexture(TextureTarget::Texture2D, Some(record.handle)));
        gl.draw(
            PrimitiveMode::Quads,
            &[[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
            Some(&[[0.0, 0.0], [s, 0.0], [s, t], [0.0, t]]),
            None,
        );
        gl.end_list();

        strike.glyphs.insert(request.ch, GlyphEntry { list, surface });
        Ok(Some(list))
    }

    /// Delete every cached list and its texture
    pub fn release_all(&mut self, gl: &mut dyn GlApi, textures: &mut TextureCache) {
        while let Some((_, strike)) = self.strikes.pop_lru() {
            strike.release(gl, textures);
        }
    }

    /// Forget every strike without deleting its lists
    pub fn abandon(&mut self) {
        self.strikes.clear();
    }
}
