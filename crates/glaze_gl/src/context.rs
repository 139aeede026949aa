//! Native context management and off-screen buffer pooling

use crate::error::{RenderError, Result};
use crate::gl::GlApi;
use glaze_core::{DeviceContextId, DrawableId};
use std::any::Any;

/// Native rendering context handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

/// Per-platform owner of native contexts and drawables.
///
/// A context is current on at most one thread; the runtime that owns a manager
/// never hands it to another thread.
pub trait ContextManager {
    /// Context able to render into `drawable`, created on first use.
    fn get_or_create_context(
        &mut self,
        drawable: DrawableId,
        device: DeviceContextId,
    ) -> Result<ContextId>;

    /// Bind `context` to `drawable` for drawing and reading.
    ///
    /// Returns whether the binding was already current.
    fn make_current(
        &mut self,
        context: ContextId,
        drawable: DrawableId,
        device: DeviceContextId,
    ) -> bool;

    /// Bind `draw` for drawing and `read` for reading under `context`.
    ///
    /// Returns false when `read` cannot be reached from `context`; the caller
    /// then copies through the CPU instead.
    fn make_current_for_read(
        &mut self,
        context: ContextId,
        draw: DrawableId,
        read: DrawableId,
    ) -> bool;

    /// Create an off-screen drawable; `None` when out of resources.
    fn create_offscreen(&mut self, width: u32, height: u32) -> Option<DrawableId>;

    fn destroy_offscreen(&mut self, drawable: DrawableId);

    fn destroy_context(&mut self, context: ContextId);

    fn swap_buffers(&mut self, drawable: DrawableId);

    /// Driver entry points for the current context.
    fn gl(&mut self) -> &mut dyn GlApi;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An off-screen drawable and its allocated size
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffscreenBuffer {
    pub drawable: DrawableId,
    pub width: u32,
    pub height: u32,
}

impl OffscreenBuffer {
    fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn fits(&self, width: u32, height: u32) -> bool {
        self.width >= width && self.height >= height
    }
}

/// Bounded pool of released off-screen buffers
///
/// When full, a release evicts the smallest pooled buffer if it is smaller than
/// the incoming one; otherwise the incoming buffer is destroyed.
#[derive(Debug)]
pub struct OffscreenPool {
    capacity: usize,
    pooled: Vec<OffscreenBuffer>,
}

impl OffscreenPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pooled: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.pooled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pooled.is_empty()
    }

    pub fn pooled(&self) -> &[OffscreenBuffer] {
        &self.pooled
    }

    /// Smallest pooled buffer that fits, or a new one
    pub fn acquire(
        &mut self,
        manager: &mut dyn ContextManager,
        width: u32,
        height: u32,
    ) -> Result<OffscreenBuffer> {
        let best = self
            .pooled
            .iter()
            .enumerate()
            .filter(|(_, b)| b.fits(width, height))
            .min_by_key(|(_, b)| b.area())
            .map(|(i, _)| i);
        if let Some(index) = best {
            let buffer = self.pooled.swap_remove(index);
            tracing::trace!(width, height, reused = ?buffer.drawable, "off-screen buffer reused");
            return Ok(buffer);
        }
        let drawable = manager
            .create_offscreen(width, height)
            .ok_or_else(|| RenderError::exhausted("off-screen buffer"))?;
        tracing::debug!(width, height, ?drawable, "off-screen buffer created");
        Ok(OffscreenBuffer {
            drawable,
            width,
            height,
        })
    }

    pub fn release(&mut self, manager: &mut dyn ContextManager, buffer: OffscreenBuffer) {
        if self.pooled.len() < self.capacity {
            self.pooled.push(buffer);
            return;
        }
        let smaller = self
            .pooled
            .iter()
            .enumerate()
            .filter(|(_, b)| b.area() < buffer.area())
            .min_by_key(|(_, b)| b.area())
            .map(|(i, _)| i);
        match smaller {
            Some(index) => {
                let evicted = std::mem::replace(&mut self.pooled[index], buffer);
                tracing::debug!(evicted = ?evicted.drawable, "off-screen pool evicted smaller buffer");
                manager.destroy_offscreen(evicted.drawable);
            }
            None => manager.destroy_offscreen(buffer.drawable),
        }
    }

    /// Destroy every pooled buffer
    pub fn teardown(&mut self, manager: &mut dyn ContextManager) {
        for buffer in self.pooled.drain(..) {
            manager.destroy_offscreen(buffer.drawable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContextManager;

    fn filled(manager: &mut HeadlessContextManager, sizes: &[(u32, u32)]) -> OffscreenPool {
        let mut pool = OffscreenPool::new(sizes.len());
        let buffers: Vec<_> = sizes
            .iter()
            .map(|&(w, h)| pool.acquire(&mut *manager, w, h).unwrap())
            .collect();
        for buffer in buffers {
            pool.release(manager, buffer);
        }
        pool
    }

    #[test]
    fn test_acquire_prefers_smallest_fit() {
        let mut manager = HeadlessContextManager::new();
        let mut pool = filled(&mut manager, &[(64, 64), (16, 16), (32, 8)]);

        let buffer = pool.acquire(&mut manager, 12, 12).unwrap();
        assert_eq!((buffer.width, buffer.height), (16, 16));
        let buffer = pool.acquire(&mut manager, 20, 4).unwrap();
        assert_eq!((buffer.width, buffer.height), (32, 8));
        assert_eq!(pool.len(), 1);
        assert_eq!(manager.live_offscreen(), 3);
    }

    #[test]
    fn test_acquire_allocates_when_nothing_fits() {
        let mut manager = HeadlessContextManager::new();
        let mut pool = filled(&mut manager, &[(8, 8)]);

        let buffer = pool.acquire(&mut manager, 9, 4).unwrap();
        assert_eq!((buffer.width, buffer.height), (9, 4));
        assert_eq!(pool.len(), 1);
        assert_eq!(manager.live_offscreen(), 2);
    }

    #[test]
    fn test_full_pool_destroys_smaller_release() {
        let mut manager = HeadlessContextManager::new();
        let mut pool = filled(&mut manager, &[(32, 32)]);

        let small = OffscreenBuffer {
            drawable: manager.create_offscreen(4, 4).unwrap(),
            width: 4,
            height: 4,
        };
        pool.release(&mut manager, small);
        assert_eq!(pool.pooled()[0].width, 32);
        assert_eq!(manager.live_offscreen(), 1);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut manager = HeadlessContextManager::new();
        manager.offscreen_limit = Some(0);
        let mut pool = OffscreenPool::new(2);
        let err = pool.acquire(&mut manager, 4, 4).unwrap_err();
        assert!(matches!(err, RenderError::ResourceExhausted { .. }));
    }

    #[test]
    fn test_teardown_destroys_pooled() {
        let mut manager = HeadlessContextManager::new();
        let mut pool = filled(&mut manager, &[(4, 4), (8, 8)]);
        pool.teardown(&mut manager);
        assert!(pool.is_empty());
        assert_eq!(manager.live_offscreen(), 0);
    }
}
