//! Core types for herald-tui.
//!
//! Small copy types shared by every layer: terminal-cell geometry,
//! window flags, and the emphasis attributes the screen buffer understands.

use bitflags::bitflags;

// =============================================================================
// Geometry
// =============================================================================

/// A position in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u16,
    pub y: u16,
}

impl Point {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// A rectangle in terminal cells.
///
/// Window bounds are parent-relative; the tree maintains the screen-absolute
/// origin separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    #[inline]
    pub const fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    #[inline]
    pub const fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Check whether a cell coordinate falls inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// The same extent re-anchored at an absolute origin.
    #[inline]
    pub const fn at(&self, origin: Point) -> Rect {
        Rect::new(origin.x, origin.y, self.width, self.height)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// =============================================================================
// Window flags
// =============================================================================

bitflags! {
    /// Per-window state and behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowFlags: u16 {
        /// Linked into the tree and stamped with a class.
        const INITIALIZED   = 1 << 0;
        /// Modal container: `run` on it nests a dispatch loop, and a
        /// `change-focus` received by one of its children ends that
        /// child's loop.
        const DIALOG        = 1 << 1;
        /// Dialog item (button, field, ...). Metadata for collaborators.
        const ITEM          = 1 << 2;
        /// Never eligible as a focus child.
        const NO_FOCUS      = 1 << 3;
        /// Sized to its parent's full extent.
        const MAXIMIZED     = 1 << 4;
        /// Excluded from the repaint walk and hit testing, children included.
        const HIDDEN        = 1 << 5;
        /// Something below this window changed; cleared by the repaint walk.
        const NEEDS_REPAINT = 1 << 6;
    }
}

// =============================================================================
// Cell attributes
// =============================================================================

bitflags! {
    /// Emphasis attributes for one screen cell.
    ///
    /// The kernel itself stays colorless; collaborators get just enough to
    /// mark focus and disabled states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u8 {
        const BOLD    = 1 << 0;
        const REVERSE = 1 << 1;
        const DIM     = 1 << 2;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let r = Rect::new(10, 5, 20, 10);
        assert!(r.contains(10, 5));
        assert!(r.contains(29, 14));
        assert!(!r.contains(30, 5));
        assert!(!r.contains(10, 15));
        assert!(!r.contains(9, 5));
    }

    #[test]
    fn test_rect_at_rebases_origin() {
        let r = Rect::new(3, 4, 7, 8);
        let abs = r.at(Point::new(10, 20));
        assert_eq!(abs, Rect::new(10, 20, 7, 8));
    }

    #[test]
    fn test_empty_rect_contains_nothing() {
        let r = Rect::new(5, 5, 0, 3);
        assert!(!r.contains(5, 5));
        assert!(r.is_empty());
    }
}
