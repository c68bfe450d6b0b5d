//! The display buffer.
//!
//! All painting goes through an in-memory grid of cells; nothing draws to
//! the terminal directly. A flush diffs the grid against what was last
//! shipped and emits cursor moves and runs of changed cells, so a repaint
//! that changed one window writes a few spans, not 2000 cells.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use unicode_width::UnicodeWidthChar;

use crate::types::{CellAttrs, Rect};

// =============================================================================
// Cells
// =============================================================================

/// One terminal cell.
///
/// A `'\0'` character marks the shadow cell behind a double-width
/// character; it is never printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub attrs: CellAttrs,
}

impl Cell {
    pub const BLANK: Cell = Cell { ch: ' ', attrs: CellAttrs::empty() };
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

// =============================================================================
// Screen
// =============================================================================

/// The kernel's picture of the terminal.
pub struct Screen {
    width: u16,
    height: u16,
    /// Row-major, `width * height` cells.
    cells: Vec<Cell>,
    /// What the terminal shows right now. `None` forces a full write.
    shipped: Option<Vec<Cell>>,
}

impl Screen {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::BLANK; width as usize * height as usize],
            shipped: None,
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Blank the buffer at a new size and forget what was shipped.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::BLANK; width as usize * height as usize];
        self.shipped = None;
    }

    /// Blank every cell.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    #[inline]
    fn raw_index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[self.raw_index(x, y)])
        } else {
            None
        }
    }

    /// Write one cell; out-of-bounds writes are clipped.
    pub fn set_cell(&mut self, x: u16, y: u16, ch: char, attrs: CellAttrs) {
        if x < self.width && y < self.height {
            let idx = self.raw_index(x, y);
            self.cells[idx] = Cell { ch, attrs };
        }
    }

    /// Write a string, advancing by display width. Double-width characters
    /// occupy two cells; one that would straddle the right edge is blanked
    /// instead. Zero-width characters are dropped.
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, attrs: CellAttrs) {
        if y >= self.height {
            return;
        }
        let mut col = x;
        for ch in text.chars() {
            if col >= self.width {
                break;
            }
            match ch.width().unwrap_or(0) {
                0 => {}
                2 => {
                    if col + 1 >= self.width {
                        self.set_cell(col, y, ' ', attrs);
                        break;
                    }
                    self.set_cell(col, y, ch, attrs);
                    self.set_cell(col + 1, y, '\0', attrs);
                    col += 2;
                }
                _ => {
                    self.set_cell(col, y, ch, attrs);
                    col += 1;
                }
            }
        }
    }

    /// Fill a rectangle, clipped to the screen.
    pub fn fill_rect(&mut self, rect: Rect, ch: char, attrs: CellAttrs) {
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let idx = self.raw_index(x, y);
                self.cells[idx] = Cell { ch, attrs };
            }
        }
    }

    /// A row's visible text, shadow cells elided. Test and debug helper.
    pub fn row_text(&self, y: u16) -> String {
        if y >= self.height {
            return String::new();
        }
        let start = self.raw_index(0, y);
        self.cells[start..start + self.width as usize]
            .iter()
            .filter(|c| c.ch != '\0')
            .map(|c| c.ch)
            .collect()
    }

    /// Ship changed cells to the terminal.
    ///
    /// The first flush after construction or resize writes everything;
    /// after that only cells differing from the shipped copy are sent, as
    /// per-row runs behind a single cursor move each.
    pub fn flush_to(&mut self, out: &mut impl Write) -> io::Result<()> {
        let full = match &self.shipped {
            Some(prev) => prev.len() != self.cells.len(),
            None => true,
        };
        let mut live_attrs = CellAttrs::empty();
        queue!(out, SetAttribute(Attribute::Reset))?;

        for y in 0..self.height {
            let mut x = 0u16;
            while x < self.width {
                let idx = self.raw_index(x, y);
                let cell = self.cells[idx];
                let dirty =
                    full || self.shipped.as_ref().is_none_or(|p| p[idx] != cell);
                if !dirty || cell.ch == '\0' {
                    x += 1;
                    continue;
                }

                queue!(out, MoveTo(x, y))?;
                while x < self.width {
                    let idx = self.raw_index(x, y);
                    let cell = self.cells[idx];
                    let dirty =
                        full || self.shipped.as_ref().is_none_or(|p| p[idx] != cell);
                    if !dirty {
                        break;
                    }
                    if cell.ch == '\0' {
                        // Shadow of the wide character just printed; the
                        // cursor is already past it.
                        x += 1;
                        continue;
                    }
                    if cell.attrs != live_attrs {
                        queue!(out, SetAttribute(Attribute::Reset))?;
                        if cell.attrs.contains(CellAttrs::BOLD) {
                            queue!(out, SetAttribute(Attribute::Bold))?;
                        }
                        if cell.attrs.contains(CellAttrs::DIM) {
                            queue!(out, SetAttribute(Attribute::Dim))?;
                        }
                        if cell.attrs.contains(CellAttrs::REVERSE) {
                            queue!(out, SetAttribute(Attribute::Reverse))?;
                        }
                        live_attrs = cell.attrs;
                    }
                    queue!(out, Print(cell.ch))?;
                    x += 1;
                }
            }
        }

        queue!(out, SetAttribute(Attribute::Reset))?;
        out.flush()?;
        self.shipped = Some(self.cells.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
