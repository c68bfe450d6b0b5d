//! Per-window message queues.
//!
//! Each window owns one FIFO queue. Producer threads push from the outside,
//! the dispatch thread pops; a short critical section around a `VecDeque`
//! is all the synchronization the kernel needs.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;
use crate::tree::WindowId;

/// A mutex-guarded FIFO of messages.
///
/// Shared as `Arc<MessageQueue>` between the tree, the input route snapshot,
/// and any thread that still holds a handle while the window dies; the queue
/// simply drains to nowhere once its window is gone.
#[derive(Default)]
pub struct MessageQueue {
    inner: Mutex<VecDeque<Message>>,
}

impl MessageQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append at the tail.
    pub fn push(&self, msg: Message) {
        self.inner.lock().push_back(msg);
    }

    /// Take the oldest entry, if any.
    pub fn pop(&self) -> Option<Message> {
        self.inner.lock().pop_front()
    }

    /// Drop every entry whose target is in `doomed`, preserving the relative
    /// order of survivors. Returns how many entries were removed.
    ///
    /// Payloads of removed entries are dropped here, on the calling thread.
    pub fn purge(&self, doomed: &HashSet<WindowId>) -> usize {
        let mut q = self.inner.lock();
        let before = q.len();
        q.retain(|m| !doomed.contains(&m.target));
        before - q.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
