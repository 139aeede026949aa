//! Cross-thread disposal requests
//!
//! Render targets are bound to the thread that owns their runtime. Other
//! threads hand teardown to that thread through an unbounded queue and may wait
//! on the reply channel for the result.

use crate::error::{RenderError, Result};
use crate::state::TargetKey;
use tokio::sync::{mpsc, oneshot};

/// A queued teardown, optionally with a reply channel
pub(crate) struct DisposeRequest {
    pub key: TargetKey,
    pub reply: Option<oneshot::Sender<Result<()>>>,
}

/// Owning side of a runtime's disposal queue
pub(crate) struct DisposalQueue {
    tx: mpsc::UnboundedSender<DisposeRequest>,
    rx: mpsc::UnboundedReceiver<DisposeRequest>,
}

impl DisposalQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<DisposeRequest> {
        self.tx.clone()
    }

    /// Next pending request, without waiting
    pub fn pop(&mut self) -> Option<DisposeRequest> {
        self.rx.try_recv().ok()
    }
}

/// Thread-safe handle requesting teardown of one render target
///
/// Obtained from [`SurfaceRenderTarget::dispose_handle`](crate::SurfaceRenderTarget::dispose_handle).
/// The request runs the next time the owning thread validates a target or
/// calls [`RenderThread::run_pending`](crate::RenderThread::run_pending).
#[derive(Clone)]
pub struct DisposeHandle {
    tx: mpsc::UnboundedSender<DisposeRequest>,
    key: TargetKey,
}

impl DisposeHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<DisposeRequest>, key: TargetKey) -> Self {
        Self { tx, key }
    }

    /// Queue the teardown; the receiver resolves once the owning thread ran it
    ///
    /// Awaiting, blocking on, or dropping the receiver are all fine.
    pub fn dispose(&self) -> oneshot::Receiver<Result<()>> {
        let (reply, rx) = oneshot::channel();
        let request = DisposeRequest {
            key: self.key,
            reply: Some(reply),
        };
        if let Err(mpsc::error::SendError(request)) = self.tx.send(request) {
            tracing::debug!(key = ?self.key, "render thread gone; disposal refused");
            if let Some(reply) = request.reply {
                let _ = reply.send(Err(RenderError::Disposed));
            }
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_handle_is_send() {
        assert_send_sync::<DisposeHandle>();
    }

    #[test]
    fn test_requests_are_queued_in_order() {
        let mut keys: SlotMap<TargetKey, ()> = SlotMap::with_key();
        let (a, b) = (keys.insert(()), keys.insert(()));
        let mut queue = DisposalQueue::new();
        let _ra = DisposeHandle::new(queue.sender(), a).dispose();
        let _rb = DisposeHandle::new(queue.sender(), b).dispose();
        assert_eq!(queue.pop().map(|r| r.key), Some(a));
        assert_eq!(queue.pop().map(|r| r.key), Some(b));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_closed_queue_replies_disposed() {
        let mut keys: SlotMap<TargetKey, ()> = SlotMap::with_key();
        let key = keys.insert(());
        let queue = DisposalQueue::new();
        let handle = DisposeHandle::new(queue.sender(), key);
        drop(queue);
        let mut rx = handle.dispose();
        assert!(matches!(rx.try_recv(), Ok(Err(RenderError::Disposed))));
    }
}
