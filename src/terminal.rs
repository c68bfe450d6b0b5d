//! Terminal session control.
//!
//! One guard owns the terminal state changes the kernel needs: raw mode,
//! the alternate screen, a hidden cursor, and X10 mouse reporting. Restore
//! runs on drop, so a panicking dispatch loop still hands the shell back.

use std::io::{self, Write};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, size, EnterAlternateScreen, LeaveAlternateScreen,
};

// X10-style button reporting. Deliberately not the SGR variant: reports
// must stay in the 3-byte form the key table's `ESC [ M` entry expects.
const MOUSE_ON: &[u8] = b"\x1b[?1000h";
const MOUSE_OFF: &[u8] = b"\x1b[?1000l";

/// Holds the terminal in kernel hands until dropped.
pub struct TerminalGuard {
    mouse: bool,
    restored: bool,
}

impl TerminalGuard {
    /// Enter raw mode on the alternate screen, hide the cursor, and
    /// optionally switch on mouse reporting.
    pub fn enter(mouse: bool) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        if mouse {
            out.write_all(MOUSE_ON)?;
            out.flush()?;
        }
        log::debug!("terminal acquired (mouse reporting: {mouse})");
        Ok(Self { mouse, restored: false })
    }

    /// Current terminal size in cells.
    pub fn size() -> io::Result<(u16, u16)> {
        size()
    }

    /// Undo everything `enter` did. Idempotent; also runs on drop.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let mut out = io::stdout();
        if self.mouse {
            let _ = out.write_all(MOUSE_OFF);
        }
        let _ = execute!(out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
        log::debug!("terminal restored");
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
