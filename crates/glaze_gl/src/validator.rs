//! Last-active render target tracking
//!
//! The validator owns the runtime's single "last active target" slot. Binding a
//! target makes its context current and re-applies only the state pieces that
//! differ from the previously active target on the same context; a target on a
//! different context gets every piece re-applied.

use crate::context::{ContextId, ContextManager};
use crate::error::{RenderError, Result};
use crate::gl::{Capability, ColorBuffer, StateCall};
use crate::state::{apply_piece, PaintResources, StatePiece, TargetKey, TargetState};
use rustc_hash::FxHashSet;
use slotmap::SlotMap;
use smallvec::SmallVec;

/// What binding a target required
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidateOutcome {
    /// The target was already active; nothing was issued
    AlreadyActive,
    /// First binding of a target under construction; its constructor applies state
    SkippedConstruction,
    /// These pieces were re-applied, in order
    Synced(SmallVec<[StatePiece; 7]>),
}

#[derive(Debug, Default)]
pub struct RenderStateValidator {
    last_active: Option<TargetKey>,
    initialized: FxHashSet<ContextId>,
}

impl RenderStateValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_active(&self) -> Option<TargetKey> {
        self.last_active
    }

    /// Drop the slot after the native binding changed behind the validator's back
    pub fn forget(&mut self) {
        self.last_active = None;
    }

    pub(crate) fn forget_target(&mut self, key: TargetKey) {
        if self.last_active == Some(key) {
            self.last_active = None;
        }
    }

    pub(crate) fn forget_context(&mut self, context: ContextId) {
        self.initialized.remove(&context);
    }

    /// Make `key` the active target, syncing native state as needed
    pub(crate) fn validate(
        &mut self,
        manager: &mut dyn ContextManager,
        targets: &SlotMap<TargetKey, TargetState>,
        key: TargetKey,
        res: &mut PaintResources<'_>,
    ) -> Result<ValidateOutcome> {
        let state = targets.get(key).ok_or(RenderError::Disposed)?;
        if self.last_active == Some(key) {
            return Ok(ValidateOutcome::AlreadyActive);
        }

        manager.make_current(state.context, state.drawable, state.device);
        let gl = manager.gl();
        if self.initialized.insert(state.context) {
            gl.apply(StateCall::DrawBuffer(ColorBuffer::Front));
            gl.apply(StateCall::ReadBuffer(ColorBuffer::Front));
            gl.apply(StateCall::Enable(Capability::VertexArray));
            gl.apply(StateCall::Disable(Capability::Dither));
            tracing::debug!(context = ?state.context, "pipeline initialized");
        }

        let previous = self.last_active.and_then(|k| targets.get(k));
        let pieces: SmallVec<[StatePiece; 7]> = match previous {
            None if state.constructing => {
                self.last_active = Some(key);
                return Ok(ValidateOutcome::SkippedConstruction);
            }
            Some(prev) if prev.context == state.context => prev.diff(state).collect(),
            _ => StatePiece::ALL.into_iter().collect(),
        };

        self.last_active = None;
        for &piece in &pieces {
            apply_piece(gl, state, piece, res)?;
        }
        self.last_active = Some(key);
        tracing::trace!(?key, ?pieces, "render target activated");
        Ok(ValidateOutcome::Synced(pieces))
    }
}
