//! Pointer input.
//!
//! Two sources feed the same event shape:
//! - X10 mouse reports arriving inline on the terminal byte stream
//!   (3 bytes after `ESC [ M`), giving absolute cell coordinates.
//! - A raw PS/2 byte device (`/dev/input/mice`), giving button state and
//!   relative motion that the mouse thread integrates into a cursor.
//!
//! Double-click detection is shared: a second press of the same button
//! within [`DOUBLE_CLICK_WINDOW`] is reclassified as a double click.

use std::time::{Duration, Instant};

use bitflags::bitflags;

/// Two presses of one button at most this far apart form a double click.
pub const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(200);

// =============================================================================
// Event shape
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    Down,
    Up,
    Double,
}

/// A pointer event in screen cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseInfo {
    pub x: u16,
    pub y: u16,
    pub button: MouseButton,
    pub kind: ClickKind,
}

// =============================================================================
// Double-click tracking
// =============================================================================

/// Remembers the last button press to reclassify quick repeats.
pub struct ClickTracker {
    last: Option<(MouseButton, Instant)>,
}

impl ClickTracker {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Classify a press happening at `at`.
    pub fn classify(&mut self, button: MouseButton, at: Instant) -> ClickKind {
        let kind = match self.last {
            Some((b, t)) if b == button && at.duration_since(t) <= DOUBLE_CLICK_WINDOW => {
                ClickKind::Double
            }
            _ => ClickKind::Down,
        };
        self.last = Some((button, at));
        kind
    }

    /// The most recently pressed button, if any.
    #[inline]
    pub fn last_button(&self) -> Option<MouseButton> {
        self.last.map(|(b, _)| b)
    }
}

impl Default for ClickTracker {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// X10 report decoding
// =============================================================================

/// Decode the 3 data bytes of an X10 mouse report.
///
/// `cb - 32` holds the button in its low two bits (3 means release) and
/// the wheel flag in bit 6. Coordinates are 1-based with a 32 offset;
/// we translate to 0-based cells. Wheel reports are dropped. X10 release
/// reports do not say which button went up, so the tracker's last press
/// is assumed.
pub fn decode_x10(
    packet: [u8; 3],
    tracker: &mut ClickTracker,
    at: Instant,
) -> Option<MouseInfo> {
    let cb = packet[0].wrapping_sub(32);
    let x = packet[1].saturating_sub(33) as u16;
    let y = packet[2].saturating_sub(33) as u16;

    if cb & 0x40 != 0 {
        // Wheel motion.
        return None;
    }

    let (button, kind) = match cb & 0b11 {
        0 => (MouseButton::Left, None),
        1 => (MouseButton::Middle, None),
        2 => (MouseButton::Right, None),
        _ => {
            let button = tracker.last_button().unwrap_or(MouseButton::Left);
            (button, Some(ClickKind::Up))
        }
    };
    let kind = match kind {
        Some(up) => up,
        None => tracker.classify(button, at),
    };
    Some(MouseInfo { x, y, button, kind })
}

// =============================================================================
// PS/2 device
// =============================================================================

bitflags! {
    /// Button mask from the first PS/2 packet byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ps2Buttons: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// One decoded PS/2 packet: held buttons plus screen-oriented motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ps2Motion {
    pub dx: i16,
    /// Positive means down the screen.
    pub dy: i16,
    pub buttons: Ps2Buttons,
}

/// Decode a 3-byte PS/2 stream packet.
///
/// Byte 0 carries buttons, the sign bits, and a sync bit that must be set;
/// a clear sync bit means the stream is misaligned and the packet is
/// dropped. Deltas are 9-bit two's complement, with the device's y axis
/// growing upward.
pub fn decode_ps2(packet: [u8; 3]) -> Option<Ps2Motion> {
    let b0 = packet[0];
    if b0 & 0x08 == 0 {
        return None;
    }
    let buttons = Ps2Buttons::from_bits_truncate(b0 & 0b111);
    let mut dx = packet[1] as i16;
    if b0 & 0x10 != 0 {
        dx -= 256;
    }
    let mut dy = packet[2] as i16;
    if b0 & 0x20 != 0 {
        dy -= 256;
    }
    Some(Ps2Motion { dx, dy: -dy, buttons })
}

/// A source of raw 3-byte pointer packets.
///
/// `Ok(None)` means the poll timed out or a packet had to be skipped;
/// callers just poll again. Swappable so tests and exotic devices can
/// feed the same mouse thread.
pub trait PointerDevice: Send {
    fn poll_packet(&mut self, timeout: Duration) -> std::io::Result<Option<[u8; 3]>>;
}

#[cfg(unix)]
pub use self::unix::{Ps2Device, DEFAULT_DEVICE};

#[cfg(unix)]
mod unix {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read};
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;
    use std::time::Duration;

    use super::PointerDevice;

    /// The standard PS/2 multiplex device.
    pub const DEFAULT_DEVICE: &str = "/dev/input/mice";

    /// Raw PS/2 packet reader over `/dev/input/mice`.
    ///
    /// Opened non-blocking; availability is signalled through `poll(2)` so
    /// the mouse thread wakes at least every poll timeout to check the
    /// shutdown flag.
    pub struct Ps2Device {
        file: File,
    }

    impl Ps2Device {
        pub fn open(path: &Path) -> io::Result<Self> {
            let file = OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_NONBLOCK)
                .open(path)?;
            Ok(Self { file })
        }
    }

    impl PointerDevice for Ps2Device {
        fn poll_packet(&mut self, timeout: Duration) -> io::Result<Option<[u8; 3]>> {
            let mut fds = libc::pollfd {
                fd: self.file.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let n = unsafe { libc::poll(&mut fds, 1, timeout.as_millis() as libc::c_int) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(None);
                }
                return Err(err);
            }
            if n == 0 {
                return Ok(None);
            }

            let mut buf = [0u8; 3];
            match self.file.read(&mut buf) {
                // The kernel delivers whole packets; anything shorter is a
                // truncated read we realign past.
                Ok(3) => Ok(Some(buf)),
                Ok(_) => Ok(None),
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted =>
                {
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
