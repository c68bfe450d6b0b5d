//! # herald-tui
//!
//! A message-passing window kernel for the terminal.
//!
//! Everything on screen is a window in one tree, and everything that
//! happens to a window arrives as a message: a decoded key, a mouse click,
//! a repaint request, a close. Windows get behavior from chainable
//! classes (inheritance without objects) and refine it with per-window
//! handler chains.
//!
//! ## Architecture
//!
//! One thread dispatches; producer threads feed it:
//! ```text
//! stdin bytes ──▶ key decoder ──┐
//!                               ├──▶ per-window FIFO queues ──▶ dispatch loop ──▶ handlers ──▶ screen
//! /dev/input/mice ─▶ PS/2 ──────┘                                   │
//!                                                                   └──▶ nested (modal) loops
//! ```
//!
//! Dispatch loops nest: a handler that opens a dialog calls
//! [`Runtime::run`] on it, and the dialog is modal until that call
//! returns. The call stack is the modal stack.
//!
//! ## Modules
//!
//! - [`types`] - Cell geometry, window flags, cell attributes
//! - [`message`] - Interned names, payloads, return codes
//! - [`queue`] - Per-window FIFO message queues
//! - [`class`] - Window classes, handler conventions, the registry
//! - [`tree`] - The generational window tree
//! - [`input`] - Key decoding, mouse decoding, producer threads, routing
//! - [`screen`] - The diff-flushed display buffer
//! - [`terminal`] - Raw mode and session restore
//! - [`runtime`] - The kernel object tying it all together

pub mod class;
pub mod error;
pub mod input;
pub mod message;
pub mod queue;
pub mod screen;
pub mod terminal;
pub mod tree;
pub mod types;

mod dispatch;
pub mod runtime;

// Re-export the working vocabulary so collaborators need one `use`.
pub use types::{CellAttrs, Point, Rect, WindowFlags};

pub use class::{ClassDef, ClassId, ClassRegistry, Convention, HandlerChain, HandlerFn, WindowClass};

pub use error::{Error, Result};

pub use input::{
    ByteSource, ClickKind, InputRoute, Key, KeyDecoder, KeyTable, MouseButton, MouseInfo,
    PointerDevice,
};

pub use message::{names, Message, MsgName, Payload, Retcode};

pub use queue::MessageQueue;

pub use runtime::{Runtime, RuntimeOptions};

pub use screen::{Cell, Screen};

pub use terminal::TerminalGuard;

pub use tree::{DestructorFn, PurgeScope, WindowId, WindowTree};
