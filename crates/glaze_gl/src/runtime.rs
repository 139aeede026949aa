//! Per-thread rendering runtime
//!
//! A [`RenderThread`] owns everything that is affine to one OS thread: the
//! context manager, the validator slot, the texture and glyph caches, the
//! off-screen buffer pool, the render-target states and the disposal queue.
//! It is shared as `Rc<RefCell<_>>`, so neither it nor any target bound to it
//! can leave the thread.

use crate::blit;
use crate::config::RenderConfig;
use crate::context::{ContextId, ContextManager, OffscreenBuffer, OffscreenPool};
use crate::dispose::{DisposalQueue, DisposeRequest};
use crate::error::{RenderError, Result};
use crate::gl::{GlApi, StateCall, TextureId};
use crate::glyph::GlyphRenderCache;
use crate::state::{apply_all, apply_piece, PaintResources, StatePiece, TargetKey, TargetState};
use crate::texture::TextureCache;
use crate::validator::{RenderStateValidator, ValidateOutcome};
use glaze_core::{DeviceContextId, NativeWindow, PixelSurface};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::mpsc;

/// Runtime handle shared by every target on one thread
pub type SharedRenderThread = Rc<RefCell<RenderThread>>;

pub struct RenderThread {
    manager: Box<dyn ContextManager>,
    config: RenderConfig,
    validator: RenderStateValidator,
    textures: TextureCache,
    glyphs: GlyphRenderCache,
    pool: OffscreenPool,
    targets: SlotMap<TargetKey, TargetState>,
    contexts: Vec<ContextId>,
    gradient: Option<TextureId>,
    disposals: DisposalQueue,
}

/// Mutable view of one active target and the runtime resources it draws with
pub(crate) struct Frame<'a> {
    pub manager: &'a mut dyn ContextManager,
    pub state: &'a mut TargetState,
    pub textures: &'a mut TextureCache,
    pub glyphs: &'a mut GlyphRenderCache,
    pub gradient: &'a mut Option<TextureId>,
    pub config: &'a RenderConfig,
    /// Set once the drawable's pixels changed
    pub drew: bool,
}

impl Frame<'_> {
    /// Re-apply `pieces` of the target's state after a draw perturbed them
    pub fn restore(&mut self, pieces: &[StatePiece]) -> Result<()> {
        let gl = self.manager.gl();
        let mut res = PaintResources {
            textures: &mut *self.textures,
            gradient: &mut *self.gradient,
            config: self.config,
        };
        for &piece in pieces {
            apply_piece(gl, self.state, piece, &mut res)?;
        }
        Ok(())
    }

    /// Drop cached read-backs and their textures; the target's pixels changed
    ///
    /// Other targets on the same drawable are invalidated once the draw ends.
    pub fn invalidate_readback(&mut self) {
        self.drew = true;
        let stale = [self.state.snapshot.take(), self.state.backing.take()];
        for surface in stale.into_iter().flatten() {
            self.textures.remove(self.manager.gl(), surface.id());
        }
    }

    /// User-space tessellation tolerance for the current transform
    pub fn tolerance(&self) -> f32 {
        let scale = self.state.transform.max_scale();
        if scale > f32::EPSILON {
            self.config.tessellation_tolerance / scale
        } else {
            self.config.tessellation_tolerance
        }
    }
}

impl RenderThread {
    pub fn new(manager: impl ContextManager + 'static, config: RenderConfig) -> SharedRenderThread {
        let pool = OffscreenPool::new(config.offscreen_pool_capacity);
        let glyphs = GlyphRenderCache::new(config.glyph_cache_capacity);
        Rc::new(RefCell::new(Self {
            manager: Box::new(manager),
            config,
            validator: RenderStateValidator::new(),
            textures: TextureCache::new(),
            glyphs,
            pool,
            targets: SlotMap::with_key(),
            contexts: Vec::new(),
            gradient: None,
            disposals: DisposalQueue::new(),
        }))
    }

    pub fn with_defaults(manager: impl ContextManager + 'static) -> SharedRenderThread {
        Self::new(manager, RenderConfig::default())
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The context manager, downcast to its concrete type
    pub fn manager_as<M: ContextManager + 'static>(&mut self) -> Option<&mut M> {
        self.manager.as_any_mut().downcast_mut::<M>()
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn glyph_cache(&self) -> &GlyphRenderCache {
        &self.glyphs
    }

    pub fn offscreen_pool(&self) -> &OffscreenPool {
        &self.pool
    }

    pub fn validator(&self) -> &RenderStateValidator {
        &self.validator
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Delete the textures of surfaces dropped since the last sweep
    pub fn cleanup_textures(&mut self) -> usize {
        if self.textures.is_empty() {
            return 0;
        }
        let scratch = match self.bind_for_deletes() {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::warn!(error = %e, "no context for texture cleanup");
                return 0;
            }
        };
        let count = self.textures.cleanup_textures(self.manager.gl());
        if let Some(buffer) = scratch {
            self.pool.release(self.manager.as_mut(), buffer);
        }
        count
    }

    /// Make a context current so shared objects can be deleted
    ///
    /// Prefers the active target, then any target; with none left a 1x1
    /// scratch buffer is bound and returned for release after the deletes.
    fn bind_for_deletes(&mut self) -> Result<Option<OffscreenBuffer>> {
        let target = self
            .validator
            .last_active()
            .and_then(|key| self.targets.get(key))
            .or_else(|| self.targets.values().next());
        if let Some(state) = target {
            if !self
                .manager
                .make_current(state.context, state.drawable, state.device)
            {
                self.validator.forget();
            }
            return Ok(None);
        }
        let buffer = self.pool.acquire(self.manager.as_mut(), 1, 1)?;
        let context = match self
            .manager
            .get_or_create_context(buffer.drawable, DeviceContextId::NONE)
        {
            Ok(context) => context,
            Err(e) => {
                self.pool.release(self.manager.as_mut(), buffer);
                return Err(e);
            }
        };
        self.track_context(context);
        self.manager
            .make_current(context, buffer.drawable, DeviceContextId::NONE);
        self.validator.forget();
        Ok(Some(buffer))
    }

    /// Run every queued disposal; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(DisposeRequest { key, reply }) = self.disposals.pop() {
            let result = self.teardown(key);
            if let Some(reply) = reply {
                if reply.send(result).is_err() {
                    tracing::warn!(?key, "disposal reply dropped by requester");
                }
            } else if let Err(e) = result {
                tracing::warn!(?key, error = %e, "deferred disposal failed");
            }
            count += 1;
        }
        count
    }

    /// Release every target, texture, glyph strike, pooled buffer and context
    pub fn shutdown(&mut self) {
        self.run_pending();
        if !self.textures.is_empty() || !self.glyphs.is_empty() || self.gradient.is_some() {
            match self.bind_for_deletes() {
                Ok(scratch) => {
                    let gl = self.manager.gl();
                    self.glyphs.release_all(gl, &mut self.textures);
                    self.textures.release_all(gl);
                    if let Some(gradient) = self.gradient.take() {
                        gl.delete_texture(gradient);
                    }
                    if let Some(buffer) = scratch {
                        self.pool.release(self.manager.as_mut(), buffer);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "no context to delete shared objects; abandoning them");
                    self.glyphs.abandon();
                    self.textures.abandon();
                    self.gradient = None;
                }
            }
        }
        let keys: Vec<TargetKey> = self.targets.keys().collect();
        for key in keys {
            if let Err(e) = self.teardown(key) {
                tracing::warn!(?key, error = %e, "teardown during shutdown failed");
            }
        }
        self.pool.teardown(self.manager.as_mut());
        for context in self.contexts.drain(..) {
            self.manager.destroy_context(context);
            self.validator.forget_context(context);
        }
        self.validator.forget();
        tracing::debug!("render thread shut down");
    }

    pub(crate) fn disposal_sender(&self) -> mpsc::UnboundedSender<DisposeRequest> {
        self.disposals.sender()
    }

    pub(crate) fn state(&self, key: TargetKey) -> Result<&TargetState> {
        self.targets.get(key).ok_or(RenderError::Disposed)
    }

    fn track_context(&mut self, context: ContextId) {
        if !self.contexts.contains(&context) {
            self.contexts.push(context);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Target Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn create_window_target(&mut self, window: &dyn NativeWindow) -> Result<TargetKey> {
        let drawable = window.id();
        let device = window.device_context();
        let (width, height) = window.bounds();
        let context = self.manager.get_or_create_context(drawable, device)?;
        self.track_context(context);
        let key = self.targets.insert(TargetState::new(
            context, drawable, device, width, height, height,
        ));
        self.finish_construction(key)?;
        tracing::debug!(?key, ?drawable, width, height, "window target created");
        Ok(key)
    }

    pub(crate) fn create_offscreen_target(&mut self, width: u32, height: u32) -> Result<TargetKey> {
        let buffer = self.pool.acquire(self.manager.as_mut(), width, height)?;
        let context = match self
            .manager
            .get_or_create_context(buffer.drawable, DeviceContextId::NONE)
        {
            Ok(context) => context,
            Err(e) => {
                self.pool.release(self.manager.as_mut(), buffer);
                return Err(e);
            }
        };
        self.track_context(context);
        let mut state = TargetState::new(
            context,
            buffer.drawable,
            DeviceContextId::NONE,
            width,
            height,
            buffer.height,
        );
        state.offscreen = Some(buffer);
        let key = self.targets.insert(state);
        self.finish_construction(key)?;

        // pooled buffers keep whatever their last owner drew
        let gl = self.manager.gl();
        gl.apply(StateCall::ClearColor([0.0; 4]));
        gl.apply(StateCall::Clear {
            color: true,
            stencil: true,
        });
        tracing::debug!(?key, width, height, "off-screen target created");
        Ok(key)
    }

    /// Second target on `parent`'s drawable with a copy of its state
    pub(crate) fn create_child(&mut self, parent: TargetKey) -> Result<TargetKey> {
        let child = self.state(parent)?.child();
        let key = self.targets.insert(child);
        self.finish_construction(key)?;
        Ok(key)
    }

    fn finish_construction(&mut self, key: TargetKey) -> Result<()> {
        let result = self.activate(key).and_then(|outcome| {
            if outcome == ValidateOutcome::SkippedConstruction {
                let mut frame = self.frame_unchecked(key)?;
                let mut res = PaintResources {
                    textures: frame.textures,
                    gradient: frame.gradient,
                    config: frame.config,
                };
                apply_all(frame.manager.gl(), frame.state, &mut res)?;
            }
            Ok(())
        });
        match result {
            Ok(()) => {
                if let Some(state) = self.targets.get_mut(key) {
                    state.constructing = false;
                }
                Ok(())
            }
            Err(e) => {
                self.validator.forget_target(key);
                if let Some(buffer) = self.targets.remove(key).and_then(|s| s.offscreen) {
                    self.pool.release(self.manager.as_mut(), buffer);
                }
                Err(e)
            }
        }
    }

    /// Tear `key` down now; a target already gone is not an error
    pub(crate) fn teardown(&mut self, key: TargetKey) -> Result<()> {
        let Some(state) = self.targets.get(key) else {
            return Ok(());
        };
        // native deletes need a current context
        self.manager
            .make_current(state.context, state.drawable, state.device);
        self.validator.forget();

        let Some(state) = self.targets.remove(key) else {
            return Ok(());
        };
        let gl = self.manager.gl();
        for surface in [state.snapshot, state.backing].into_iter().flatten() {
            self.textures.remove(gl, surface.id());
        }
        if let Some(buffer) = state.offscreen {
            self.pool.release(self.manager.as_mut(), buffer);
        }
        tracing::debug!(?key, "render target torn down");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activation
    // ─────────────────────────────────────────────────────────────────────────

    /// Drain pending disposals, then make `key` the active target
    pub(crate) fn activate(&mut self, key: TargetKey) -> Result<ValidateOutcome> {
        self.run_pending();
        let Self {
            manager,
            validator,
            targets,
            textures,
            gradient,
            config,
            ..
        } = self;
        let mut res = PaintResources {
            textures,
            gradient,
            config,
        };
        validator.validate(manager.as_mut(), targets, key, &mut res)
    }

    /// Activate `key` and borrow it for drawing
    pub(crate) fn frame(&mut self, key: TargetKey) -> Result<Frame<'_>> {
        self.activate(key)?;
        self.frame_unchecked(key)
    }

    fn frame_unchecked(&mut self, key: TargetKey) -> Result<Frame<'_>> {
        let Self {
            manager,
            config,
            textures,
            glyphs,
            targets,
            gradient,
            ..
        } = self;
        let state = targets.get_mut(key).ok_or(RenderError::Disposed)?;
        Ok(Frame {
            manager: manager.as_mut(),
            state,
            textures,
            glyphs,
            gradient,
            config,
            drew: false,
        })
    }

    /// Run a draw against `key`, keeping the validator and read-back caches honest
    ///
    /// A failed draw may leave native state partly applied, so the target is
    /// dropped from the validator slot and fully re-synced next time.
    pub(crate) fn draw<R>(
        &mut self,
        key: TargetKey,
        f: impl FnOnce(&mut Frame<'_>) -> Result<R>,
    ) -> Result<R> {
        let (result, drew) = match self.frame(key) {
            Ok(mut frame) => {
                let result = f(&mut frame);
                (result, frame.drew)
            }
            Err(e) => (Err(e), false),
        };
        if result.is_err() {
            self.validator.forget_target(key);
        }
        if drew {
            self.invalidate_shared_readback(key);
        }
        result
    }

    /// Drop the read-backs of every other target drawing into `key`'s drawable
    fn invalidate_shared_readback(&mut self, key: TargetKey) {
        let Some(drawable) = self.targets.get(key).map(|s| s.drawable) else {
            return;
        };
        let gl = self.manager.gl();
        for (other, state) in self.targets.iter_mut() {
            if other == key || state.drawable != drawable {
                continue;
            }
            for surface in [state.snapshot.take(), state.backing.take()].into_iter().flatten() {
                self.textures.remove(gl, surface.id());
            }
        }
    }

    /// Mutate `key`'s state, re-applying `pieces` at once if it is active
    pub(crate) fn update(
        &mut self,
        key: TargetKey,
        pieces: &[StatePiece],
        f: impl FnOnce(&mut TargetState),
    ) -> Result<()> {
        let active = self.validator.last_active() == Some(key);
        let result = {
            let mut frame = self.frame_unchecked(key)?;
            f(frame.state);
            if active {
                frame.restore(pieces)
            } else {
                Ok(())
            }
        };
        if result.is_err() {
            // re-sync at the next draw, which reports the failure again
            self.validator.forget_target(key);
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read-back
    // ─────────────────────────────────────────────────────────────────────────

    /// Top-down copy of `key`'s pixels, cached until the next draw
    pub(crate) fn snapshot(&mut self, key: TargetKey) -> Result<PixelSurface> {
        let mut frame = self.frame(key)?;
        if let Some(snapshot) = &frame.state.snapshot {
            return Ok(snapshot.clone());
        }
        let surface = blit::read_back(frame.manager.gl(), frame.state, true)?;
        frame.state.snapshot = Some(surface.clone());
        Ok(surface)
    }

    /// Bottom-up copy of `key`'s pixels for use as a texture source
    pub(crate) fn backing_surface(&mut self, key: TargetKey) -> Result<PixelSurface> {
        let state = self.targets.get_mut(key).ok_or(RenderError::Disposed)?;
        if let Some(backing) = &state.backing {
            return Ok(backing.clone());
        }
        if self.validator.last_active() != Some(key) {
            self.manager
                .make_current(state.context, state.drawable, state.device);
            self.validator.forget();
        }
        let surface = blit::read_back(self.manager.gl(), state, false)?;
        state.backing = Some(surface.clone());
        Ok(surface)
    }

    pub(crate) fn update_scene(&mut self, key: TargetKey) -> Result<()> {
        self.draw(key, |frame| {
            frame.invalidate_readback();
            Ok(())
        })
    }

    pub(crate) fn flush(&mut self, key: TargetKey) -> Result<()> {
        self.frame(key)?.manager.gl().flush();
        Ok(())
    }

    pub(crate) fn swap_buffers(&mut self, key: TargetKey) -> Result<()> {
        let mut frame = self.frame(key)?;
        frame.manager.swap_buffers(frame.state.drawable);
        Ok(())
    }

    /// Draw from another target, copying natively when the contexts allow it
    pub(crate) fn blit_target(
        &mut self,
        dst: TargetKey,
        src: TargetKey,
        request: blit::TargetBlit,
    ) -> Result<()> {
        let source = blit::TargetSource::of(self.state(src)?);
        let outcome = self.draw(dst, |frame| blit::copy_from_target(frame, &source, &request))?;
        if let blit::CopyOutcome::Copied = outcome {
            return Ok(());
        }
        tracing::debug!(?src, ?dst, "no shared context; copying through a texture");
        let backing = self.backing_surface(src)?;
        self.draw(dst, |frame| {
            blit::blit(
                frame,
                blit::BlitSource {
                    surface: &backing,
                    rect: request.src,
                    bottom_up: true,
                },
                request.at,
                request.transform.as_ref(),
                request.background,
            )
        })
    }
}
