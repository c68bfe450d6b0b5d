//! Input routing snapshot.
//!
//! Producer threads must not walk the window tree; it belongs to the
//! dispatch thread. Instead the dispatch thread publishes a flat snapshot
//! after every repaint and focus change: where focused keys go, and which
//! screen regions route pointer events where. A snapshot can lag a little;
//! at worst a message lands in a queue whose window just died, and the
//! dispatcher drops it on arrival.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::input::keys::Key;
use crate::input::mouse::{ClickKind, MouseInfo};
use crate::message::{names, Message, MsgName, Payload};
use crate::queue::MessageQueue;
use crate::tree::WindowId;
use crate::types::Rect;

/// A window plus the queue its messages should land in.
///
/// The queue is not always the window's own: while a dispatch loop is
/// active, messages for windows in its subtree ride the loop window's
/// queue so they can be purged with it.
#[derive(Clone)]
pub struct RouteTarget {
    pub id: WindowId,
    pub queue: Arc<MessageQueue>,
}

/// One hit-testable region, screen-absolute, listed in paint order.
#[derive(Clone)]
pub struct HitRegion {
    pub id: WindowId,
    pub rect: Rect,
    pub queue: Arc<MessageQueue>,
}

struct RouteState {
    focus: Option<RouteTarget>,
    hits: Vec<HitRegion>,
    size: (u16, u16),
}

/// Everything input producers are allowed to know about the tree.
pub struct InputRoute {
    state: RwLock<RouteState>,
}

impl InputRoute {
    pub fn new(size: (u16, u16)) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(RouteState { focus: None, hits: Vec::new(), size }),
        })
    }

    /// Point focused input at a new target.
    pub fn set_focus(&self, target: Option<RouteTarget>) {
        self.state.write().focus = target;
    }

    /// Swap in a freshly built hit list and screen size.
    pub fn publish(&self, hits: Vec<HitRegion>, size: (u16, u16)) {
        let mut s = self.state.write();
        s.hits = hits;
        s.size = size;
    }

    #[inline]
    pub fn screen_size(&self) -> (u16, u16) {
        self.state.read().size
    }

    pub fn focus(&self) -> Option<RouteTarget> {
        self.state.read().focus.clone()
    }

    /// The topmost region containing the cell, if any.
    ///
    /// Later paint order means painted on top, so the scan runs back to
    /// front.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<HitRegion> {
        self.state
            .read()
            .hits
            .iter()
            .rev()
            .find(|h| h.rect.contains(x, y))
            .cloned()
    }

    /// Queue a decoded key for the focus target. False when nobody has
    /// focus and the key is dropped.
    pub fn deliver_key(&self, key: Key) -> bool {
        match self.focus() {
            Some(t) => {
                t.queue.push(Message::new(t.id, names::KEYDOWN, Payload::Key(key)));
                true
            }
            None => false,
        }
    }

    /// Hit-test a pointer event and queue it for the window under it.
    /// False when the event missed every region and was dropped.
    pub fn deliver_mouse(&self, info: MouseInfo) -> bool {
        match self.hit_test(info.x, info.y) {
            Some(h) => {
                h.queue.push(Message::new(h.id, mouse_name(info.kind), Payload::Mouse(info)));
                true
            }
            None => false,
        }
    }
}

fn mouse_name(kind: ClickKind) -> MsgName {
    match kind {
        ClickKind::Down => names::MOUSE_DOWN,
        ClickKind::Up => names::MOUSE_UP,
        ClickKind::Double => names::MOUSE_DOUBLE,
    }
}

// =============================================================================
// Tests
// =============================================================================
