//! Input subsystem.
//!
//! Bytes come in from the terminal and the pointer device on their own
//! threads ([`reader`]), get decoded into keys ([`keys`]) and pointer
//! events ([`mouse`]), and are queued for windows through the routing
//! snapshot ([`route`]). Nothing in here touches the window tree.

pub mod keys;
pub mod mouse;
pub mod reader;
pub mod route;

pub use keys::{Key, KeyDecoder, KeyTable};
pub use mouse::{ClickKind, ClickTracker, MouseButton, MouseInfo, PointerDevice};
pub use reader::{ByteSource, InputThreads};
pub use route::{HitRegion, InputRoute, RouteTarget};

#[cfg(unix)]
pub use mouse::Ps2Device;
#[cfg(unix)]
pub use reader::StdinSource;
