//! Error type for herald-tui.

use std::io;

use thiserror::Error;

use crate::message::MsgName;

/// Everything that can go wrong inside the kernel.
///
/// Stale-handle lookups are deliberately not here: operations on a window
/// that no longer exists degrade to no-ops or `WindowGone`, they never panic.
#[derive(Debug, Error)]
pub enum Error {
    /// The target handle does not name a live window.
    #[error("window handle is stale or was never created")]
    WindowGone,

    /// The parent handle passed to a create or focus call is dead.
    #[error("parent window handle is stale or was never created")]
    ParentGone,

    /// No class along the inheritance chain recognizes the message name.
    #[error("no class in the chain recognizes message `{0}`")]
    UnrecognizedMessage(MsgName),

    /// A handler was registered with a shape that does not match the
    /// calling convention its class declares for that message.
    #[error("handler shape does not match the calling convention for `{0}`")]
    ConventionMismatch(MsgName),

    /// A class with this name is already registered.
    #[error("window class `{0}` is already registered")]
    ClassExists(String),

    /// The parent class id passed at registration is unknown.
    #[error("unknown parent class id")]
    NoSuchClass,

    /// The window refused the focus (NO_FOCUS, hidden, or not a child).
    #[error("window cannot take focus")]
    FocusRefused,

    /// Terminal or input device I/O failed.
    #[error("terminal i/o: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
