//! Messages and their vocabulary.
//!
//! Everything a window receives travels as a [`Message`]: an interned name,
//! a target handle, and a payload. Names are compared by content, so the
//! standard constants below and dynamically interned names mix freely.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::input::keys::Key;
use crate::input::mouse::MouseInfo;
use crate::tree::WindowId;
use crate::types::Rect;

// =============================================================================
// Message names
// =============================================================================

/// An interned message name.
///
/// Copy-cheap and hashable; the backing string lives for the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgName(&'static str);

/// Intern pool. Each distinct name string is leaked exactly once.
static NAMES: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();

impl MsgName {
    /// Wrap a static string without touching the intern pool.
    pub const fn from_static(name: &'static str) -> Self {
        Self(name)
    }

    /// Intern a runtime-built name. Repeated calls with the same text
    /// return a name backed by the same leaked allocation.
    pub fn intern(name: &str) -> Self {
        let pool = NAMES.get_or_init(|| Mutex::new(HashSet::new()));
        let mut pool = pool.lock();
        if let Some(existing) = pool.get(name) {
            return Self(existing);
        }
        let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
        pool.insert(leaked);
        Self(leaked)
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MsgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for MsgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MsgName({})", self.0)
    }
}

/// The standard message vocabulary every window class understands.
pub mod names {
    use super::MsgName;

    /// Paint the window's content.
    pub const DISPLAY: MsgName = MsgName::from_static("display");
    /// A decoded key reached this window.
    pub const KEYDOWN: MsgName = MsgName::from_static("keydown");
    /// Ask the window to go away; ends its dispatch loop unless stopped.
    pub const CLOSE: MsgName = MsgName::from_static("close");
    /// Clear the window's rectangle before `display`.
    pub const ERASE_BACKGROUND: MsgName = MsgName::from_static("erase-background");
    /// Synchronous full repaint request; never queued.
    pub const UPDATE_SCREEN: MsgName = MsgName::from_static("update-screen");
    /// The window's parent moved; payload carries old and new geometry.
    pub const PARENT_REPOSITIONED: MsgName = MsgName::from_static("parent-repositioned");
    /// Focus handover inside a modal container.
    pub const CHANGE_FOCUS: MsgName = MsgName::from_static("change-focus");
    /// Pointer button pressed over the window.
    pub const MOUSE_DOWN: MsgName = MsgName::from_static("mouse-down");
    /// Pointer button released over the window.
    pub const MOUSE_UP: MsgName = MsgName::from_static("mouse-up");
    /// Second press of the same button within the double-click window.
    pub const MOUSE_DOUBLE: MsgName = MsgName::from_static("mouse-double");
}

// =============================================================================
// Payload
// =============================================================================

/// Data riding along with a message.
///
/// The kernel's own messages use the typed variants; collaborators attach
/// anything sendable through `Custom`. Payloads are dropped, not returned,
/// when a queue entry is purged.
pub enum Payload {
    None,
    Key(Key),
    Mouse(MouseInfo),
    Reposition { old: Rect, new: Rect },
    Custom(Box<dyn Any + Send>),
}

impl Payload {
    /// Box an arbitrary sendable value.
    pub fn custom<T: Any + Send>(value: T) -> Self {
        Self::Custom(Box::new(value))
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Borrow a `Custom` payload as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(b) => b.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match self {
            Self::Custom(b) => b.downcast_mut::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Key(k) => write!(f, "Key({k:?})"),
            Self::Mouse(m) => write!(f, "Mouse({m:?})"),
            Self::Reposition { old, new } => write!(f, "Reposition({old:?} -> {new:?})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// One queued unit of work for a window.
#[derive(Debug)]
pub struct Message {
    /// The window this message is about. May be a descendant of the window
    /// whose queue carries it.
    pub target: WindowId,
    pub name: MsgName,
    pub payload: Payload,
}

impl Message {
    pub fn new(target: WindowId, name: MsgName, payload: Payload) -> Self {
        Self { target, name, payload }
    }
}

// =============================================================================
// Handler return codes
// =============================================================================

/// What a handler tells the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retcode {
    /// Keep going: rest of the chain, then the class default.
    #[default]
    Ok,
    /// Finish the chain but suppress the class default action.
    Stop,
    /// Unwind every nested dispatch loop on this thread.
    Exit,
}

// =============================================================================
// Tests
// =============================================================================
