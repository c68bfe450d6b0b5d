//! Input producer threads.
//!
//! Two workers feed the queues from the outside world:
//! - The keyboard thread polls a byte source (stdin in raw mode), runs the
//!   escape decoder, and also collects the 3-byte X10 mouse reports that
//!   arrive inline after `ESC [ M`.
//! - The mouse thread polls a raw pointer device and integrates relative
//!   motion into a clamped screen cursor.
//!
//! Both park in `poll(2)` with a short timeout so a cleared run flag is
//! noticed quickly, and both are joined on stop, never detached. They
//! touch nothing but their [`InputRoute`] handle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::input::keys::{Key, KeyDecoder, KeyTable};
use crate::input::mouse::{
    decode_ps2, decode_x10, ClickKind, ClickTracker, MouseButton, MouseInfo, PointerDevice,
    Ps2Buttons,
};
use crate::input::route::InputRoute;

/// How long a producer sleeps in `poll` before rechecking the run flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

// =============================================================================
// Byte sources
// =============================================================================

/// A pollable stream of raw input bytes.
///
/// `Ok(0)` means the wait timed out; the caller just polls again.
pub trait ByteSource: Send {
    fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

#[cfg(unix)]
pub use self::unix::StdinSource;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::time::Duration;

    use super::ByteSource;

    /// Raw reads from file descriptor 0.
    ///
    /// Goes through `poll(2)` plus `read(2)` directly rather than the
    /// process-wide buffered stdin handle, so bytes are never stranded in
    /// a userspace buffer the poll cannot see.
    pub struct StdinSource;

    impl StdinSource {
        pub fn new() -> Self {
            Self
        }
    }

    impl Default for StdinSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ByteSource for StdinSource {
        fn poll_read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            let mut fds = libc::pollfd { fd: 0, events: libc::POLLIN, revents: 0 };
            let n = unsafe { libc::poll(&mut fds, 1, timeout.as_millis() as libc::c_int) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(0);
                }
                return Err(err);
            }
            if n == 0 {
                return Ok(0);
            }

            let got = unsafe { libc::read(0, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if got < 0 {
                let err = io::Error::last_os_error();
                return match err.kind() {
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(0),
                    _ => Err(err),
                };
            }
            Ok(got as usize)
        }
    }
}

// =============================================================================
// Thread handles
// =============================================================================

/// The running producer threads.
///
/// `stop` clears the shared flag and joins; dropping does the same.
pub struct InputThreads {
    running: Arc<AtomicBool>,
    keyboard: Option<JoinHandle<()>>,
    mouse: Option<JoinHandle<()>>,
}

impl InputThreads {
    /// Spawn the keyboard producer, and a mouse producer when a pointer
    /// device is available.
    pub fn spawn(
        route: Arc<InputRoute>,
        table: Arc<KeyTable>,
        keyboard_source: Box<dyn ByteSource>,
        pointer: Option<Box<dyn PointerDevice>>,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        let keyboard = {
            let route = Arc::clone(&route);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("herald-keys".into())
                .spawn(move || keyboard_loop(keyboard_source, table, route, running))?
        };

        let mouse = match pointer {
            Some(device) => {
                let route = Arc::clone(&route);
                let flag = Arc::clone(&running);
                let spawned = thread::Builder::new()
                    .name("herald-mouse".into())
                    .spawn(move || mouse_loop(device, route, flag));
                match spawned {
                    Ok(h) => Some(h),
                    Err(e) => {
                        running.store(false, Ordering::Relaxed);
                        let _ = keyboard.join();
                        return Err(e);
                    }
                }
            }
            None => {
                log::debug!("no pointer device; mouse thread not started");
                None
            }
        };

        Ok(Self { running, keyboard: Some(keyboard), mouse })
    }

    /// Ask both threads to finish and wait for them.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.keyboard.take() {
            let _ = h.join();
        }
        if let Some(h) = self.mouse.take() {
            let _ = h.join();
        }
    }
}

impl Drop for InputThreads {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Keyboard thread
// =============================================================================

fn keyboard_loop(
    mut source: Box<dyn ByteSource>,
    table: Arc<KeyTable>,
    route: Arc<InputRoute>,
    running: Arc<AtomicBool>,
) {
    let mut decoder = KeyDecoder::new(table);
    let mut tracker = ClickTracker::new();
    let mut packet: Vec<u8> = Vec::with_capacity(3);
    let mut collecting = false;
    let mut buf = [0u8; 64];

    log::debug!("keyboard thread running");
    while running.load(Ordering::Relaxed) {
        let n = match source.poll_read(&mut buf, POLL_TIMEOUT) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) => {
                log::debug!("keyboard source failed: {e}");
                break;
            }
        };
        for &byte in &buf[..n] {
            if collecting {
                packet.push(byte);
                if packet.len() == 3 {
                    let report = [packet[0], packet[1], packet[2]];
                    packet.clear();
                    collecting = false;
                    if let Some(info) = decode_x10(report, &mut tracker, Instant::now()) {
                        if !route.deliver_mouse(info) {
                            log::trace!("x10 report at {},{} hit nothing", info.x, info.y);
                        }
                    }
                }
                continue;
            }
            for key in decoder.feed(byte) {
                if key == Key::MouseIntro {
                    packet.clear();
                    collecting = true;
                } else if !route.deliver_key(key) {
                    log::trace!("dropped {key:?}: nothing focused");
                }
            }
        }
    }
    log::debug!("keyboard thread done");
}

// =============================================================================
// Mouse thread
// =============================================================================

fn mouse_loop(mut device: Box<dyn PointerDevice>, route: Arc<InputRoute>, running: Arc<AtomicBool>) {
    let mut tracker = ClickTracker::new();
    let mut held = Ps2Buttons::empty();
    let size = route.screen_size();
    let mut pos = (size.0 as i32 / 2, size.1 as i32 / 2);

    log::debug!("mouse thread running");
    while running.load(Ordering::Relaxed) {
        let report = match device.poll_packet(POLL_TIMEOUT) {
            Ok(None) => continue,
            Ok(Some(p)) => p,
            Err(e) => {
                log::debug!("pointer device failed: {e}");
                break;
            }
        };
        let Some(motion) = decode_ps2(report) else { continue };

        let (w, h) = route.screen_size();
        pos.0 = (pos.0 + motion.dx as i32).clamp(0, w.saturating_sub(1) as i32);
        pos.1 = (pos.1 + motion.dy as i32).clamp(0, h.saturating_sub(1) as i32);
        let (x, y) = (pos.0 as u16, pos.1 as u16);

        let pressed = motion.buttons - held;
        let released = held - motion.buttons;
        held = motion.buttons;

        for (mask, button) in [
            (Ps2Buttons::LEFT, MouseButton::Left),
            (Ps2Buttons::MIDDLE, MouseButton::Middle),
            (Ps2Buttons::RIGHT, MouseButton::Right),
        ] {
            if pressed.contains(mask) {
                let kind = tracker.classify(button, Instant::now());
                route.deliver_mouse(MouseInfo { x, y, button, kind });
            }
            if released.contains(mask) {
                route.deliver_mouse(MouseInfo { x, y, button, kind: ClickKind::Up });
            }
        }
    }
    log::debug!("mouse thread done");
}

// =============================================================================
// Tests
// =============================================================================
