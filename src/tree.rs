//! The window tree.
//!
//! Windows live in a generational arena: a handle is an index plus the
//! generation it was created under, so a handle to a destroyed window can
//! never reach a recycled slot. Every structural operation on a stale
//! handle degrades to a no-op or an error, never undefined behavior.
//!
//! Within a parent, child order is z-order: position 0 paints first
//! (bottom), the last child paints last (top). Creation appends, so newer
//! siblings stack above older ones, and destruction compacts the order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::class::{ClassId, HandlerChain, HandlerFn};
use crate::error::{Error, Result};
use crate::message::MsgName;
use crate::queue::MessageQueue;
use crate::runtime::Runtime;
use crate::types::{Point, Rect, WindowFlags};

// =============================================================================
// Handles
// =============================================================================

/// A generational window handle.
///
/// Cheap to copy, safe to keep: once the window dies the handle goes stale
/// and every lookup through it misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId {
    index: u32,
    generation: u32,
}

impl WindowId {
    #[cfg(test)]
    pub(crate) fn for_tests(index: u32) -> Self {
        Self { index, generation: 1 }
    }
}

/// Which queue entries a destroy purges.
///
/// Destruction itself always takes the whole subtree; the scope only
/// narrows which targets are scrubbed from surviving queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PurgeScope {
    /// Scrub entries targeting the window or any of its descendants.
    #[default]
    Subtree,
    /// Scrub only entries targeting the window itself.
    TargetOnly,
}

/// A window's teardown callback, run during destroy after its children
/// are gone.
pub type DestructorFn = Box<dyn FnOnce(&mut Runtime, WindowId)>;

// =============================================================================
// Window record
// =============================================================================

struct Window {
    class: ClassId,
    flags: WindowFlags,
    /// Parent-relative extent.
    bounds: Rect,
    /// Screen-absolute position of the top-left cell.
    origin: Point,
    parent: Option<WindowId>,
    children: Vec<WindowId>,
    focus_child: Option<WindowId>,
    queue: Arc<MessageQueue>,
    chains: HashMap<MsgName, HandlerChain>,
    destructors: Vec<DestructorFn>,
}

impl Window {
    fn new(class: ClassId, bounds: Rect, origin: Point, flags: WindowFlags) -> Self {
        Self {
            class,
            flags: flags | WindowFlags::INITIALIZED,
            bounds,
            origin,
            parent: None,
            children: Vec::new(),
            focus_child: None,
            queue: MessageQueue::new(),
            chains: HashMap::new(),
            destructors: Vec::new(),
        }
    }

    fn focus_eligible(&self) -> bool {
        !self.flags.intersects(WindowFlags::NO_FOCUS | WindowFlags::HIDDEN)
    }
}

struct Slot {
    generation: u32,
    window: Option<Window>,
}

// =============================================================================
// Tree
// =============================================================================

/// Arena-backed window tree with a fixed root.
pub struct WindowTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: WindowId,
}

impl WindowTree {
    /// Build a tree holding only the root window.
    pub fn new(root_bounds: Rect, root_class: ClassId) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: WindowId { index: 0, generation: 0 },
        };
        let root = tree.alloc(Window::new(
            root_class,
            root_bounds,
            root_bounds.origin(),
            WindowFlags::empty(),
        ));
        tree.root = root;
        tree
    }

    /// The root handle. Stale only after the root itself was destroyed.
    #[inline]
    pub fn root(&self) -> WindowId {
        self.root
    }

    /// Whether the handle names a live window.
    #[inline]
    pub fn contains(&self, id: WindowId) -> bool {
        self.win(id).is_some()
    }

    /// Number of live windows.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.window.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -------------------------------------------------------------------------
    // Arena internals
    // -------------------------------------------------------------------------

    fn alloc(&mut self, window: Window) -> WindowId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.window = Some(window);
            WindowId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 1, window: Some(window) });
            WindowId { index, generation: 1 }
        }
    }

    fn win(&self, id: WindowId) -> Option<&Window> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.window.as_ref()
    }

    fn win_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.window.as_mut()
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a window as the topmost child of `parent`.
    ///
    /// `bounds` is parent-relative; the absolute origin is derived and kept
    /// in step by `move_window`.
    pub fn create(
        &mut self,
        parent: WindowId,
        bounds: Rect,
        class: ClassId,
        flags: WindowFlags,
    ) -> Result<WindowId> {
        let parent_origin = match self.win(parent) {
            Some(w) => w.origin,
            None => return Err(Error::ParentGone),
        };
        let origin = Point::new(
            parent_origin.x.saturating_add(bounds.x),
            parent_origin.y.saturating_add(bounds.y),
        );
        let mut window = Window::new(class, bounds, origin, flags);
        window.parent = Some(parent);
        let id = self.alloc(window);

        // win_mut cannot miss: parent was checked above and alloc never
        // touches live slots.
        if let Some(p) = self.win_mut(parent) {
            p.children.push(id);
            p.flags |= WindowFlags::NEEDS_REPAINT;
        }
        Ok(id)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[inline]
    pub fn parent(&self, id: WindowId) -> Option<WindowId> {
        self.win(id).and_then(|w| w.parent)
    }

    /// Children bottom-to-top. Empty for stale handles and leaves alike.
    pub fn children(&self, id: WindowId) -> &[WindowId] {
        self.win(id).map(|w| w.children.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn class_of(&self, id: WindowId) -> Option<ClassId> {
        self.win(id).map(|w| w.class)
    }

    /// Parent-relative bounds.
    #[inline]
    pub fn bounds(&self, id: WindowId) -> Option<Rect> {
        self.win(id).map(|w| w.bounds)
    }

    /// Screen-absolute rectangle.
    #[inline]
    pub fn screen_rect(&self, id: WindowId) -> Option<Rect> {
        self.win(id).map(|w| w.bounds.at(w.origin))
    }

    #[inline]
    pub fn flags(&self, id: WindowId) -> Option<WindowFlags> {
        self.win(id).map(|w| w.flags)
    }

    /// Set flags. Returns false on a stale handle.
    pub fn insert_flags(&mut self, id: WindowId, flags: WindowFlags) -> bool {
        match self.win_mut(id) {
            Some(w) => {
                w.flags |= flags;
                true
            }
            None => false,
        }
    }

    /// Clear flags. Returns false on a stale handle.
    pub fn remove_flags(&mut self, id: WindowId, flags: WindowFlags) -> bool {
        match self.win_mut(id) {
            Some(w) => {
                w.flags &= !flags;
                true
            }
            None => false,
        }
    }

    /// Shared handle to the window's message queue.
    #[inline]
    pub fn queue(&self, id: WindowId) -> Option<Arc<MessageQueue>> {
        self.win(id).map(|w| Arc::clone(&w.queue))
    }

    /// Position within the parent's child order; the root is 0.
    ///
    /// Always dense: destroying a sibling shifts everything above it down.
    pub fn z_order(&self, id: WindowId) -> Option<usize> {
        let w = self.win(id)?;
        match w.parent {
            Some(p) => self.win(p)?.children.iter().position(|c| *c == id),
            None => Some(0),
        }
    }

    // -------------------------------------------------------------------------
    // Focus
    // -------------------------------------------------------------------------

    #[inline]
    pub fn focus_child(&self, id: WindowId) -> Option<WindowId> {
        self.win(id).and_then(|w| w.focus_child)
    }

    /// Point `parent`'s focus at `child`.
    ///
    /// The child must be live, a direct child, and focus-eligible.
    pub fn set_focus_child(&mut self, parent: WindowId, child: WindowId) -> Result<()> {
        let child_win = self.win(child).ok_or(Error::WindowGone)?;
        if child_win.parent != Some(parent) || !child_win.focus_eligible() {
            return Err(Error::FocusRefused);
        }
        match self.win_mut(parent) {
            Some(p) => {
                p.focus_child = Some(child);
                p.flags |= WindowFlags::NEEDS_REPAINT;
                Ok(())
            }
            None => Err(Error::ParentGone),
        }
    }

    /// Drop `parent`'s focus pointer.
    pub fn clear_focus_child(&mut self, parent: WindowId) {
        if let Some(p) = self.win_mut(parent) {
            p.focus_child = None;
        }
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    /// Move and/or resize a window, re-deriving absolute origins for the
    /// whole subtree. Returns the old and new screen-absolute rectangles.
    pub fn move_window(&mut self, id: WindowId, bounds: Rect) -> Result<(Rect, Rect)> {
        let parent_origin = {
            let w = self.win(id).ok_or(Error::WindowGone)?;
            match w.parent {
                Some(p) => self.win(p).ok_or(Error::ParentGone)?.origin,
                None => Point::new(0, 0),
            }
        };
        let old = self.screen_rect(id).ok_or(Error::WindowGone)?;
        let origin = Point::new(
            parent_origin.x.saturating_add(bounds.x),
            parent_origin.y.saturating_add(bounds.y),
        );
        {
            // Checked above.
            let w = match self.win_mut(id) {
                Some(w) => w,
                None => return Err(Error::WindowGone),
            };
            w.bounds = bounds;
            w.origin = origin;
            w.flags |= WindowFlags::NEEDS_REPAINT;
        }
        self.reanchor_children(id);
        if let Some(p) = self.parent(id) {
            self.insert_flags(p, WindowFlags::NEEDS_REPAINT);
        }
        let new = self.screen_rect(id).ok_or(Error::WindowGone)?;
        Ok((old, new))
    }

    /// Recompute absolute origins below `id` from its own origin.
    fn reanchor_children(&mut self, id: WindowId) {
        let (origin, children) = match self.win(id) {
            Some(w) => (w.origin, w.children.clone()),
            None => return,
        };
        for child in children {
            if let Some(c) = self.win_mut(child) {
                c.origin = Point::new(
                    origin.x.saturating_add(c.bounds.x),
                    origin.y.saturating_add(c.bounds.y),
                );
            }
            self.reanchor_children(child);
        }
    }

    // -------------------------------------------------------------------------
    // Walks
    // -------------------------------------------------------------------------

    /// Whether `ancestor` is `id` itself or somewhere on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: WindowId, id: WindowId) -> bool {
        if !self.contains(ancestor) {
            return false;
        }
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return self.contains(id);
            }
            cur = self.parent(c);
        }
        false
    }

    /// Parent chain of `id`, innermost first, excluding `id`.
    pub fn ancestors(&self, id: WindowId) -> Vec<WindowId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(c) = cur {
            out.push(c);
            cur = self.parent(c);
        }
        out
    }

    /// The subtree rooted at `id` in destruction order: children before
    /// parents, `id` itself last.
    pub fn subtree_postorder(&self, id: WindowId) -> Vec<WindowId> {
        let mut out = Vec::new();
        self.collect_postorder(id, &mut out);
        out
    }

    fn collect_postorder(&self, id: WindowId, out: &mut Vec<WindowId>) {
        for child in self.children(id).to_vec() {
            self.collect_postorder(child, out);
        }
        if self.contains(id) {
            out.push(id);
        }
    }

    /// Paint order: pre-order DFS from the root, parents before children,
    /// siblings bottom-to-top. Hidden subtrees are skipped whole.
    pub fn paint_order(&self) -> Vec<WindowId> {
        let mut out = Vec::new();
        if self.contains(self.root) {
            self.collect_paint(self.root, &mut out);
        }
        out
    }

    fn collect_paint(&self, id: WindowId, out: &mut Vec<WindowId>) {
        let Some(w) = self.win(id) else { return };
        if w.flags.contains(WindowFlags::HIDDEN) {
            return;
        }
        out.push(id);
        for child in w.children.clone() {
            self.collect_paint(child, out);
        }
    }

    // -------------------------------------------------------------------------
    // Handler chains
    // -------------------------------------------------------------------------

    pub fn chain(&self, id: WindowId, name: MsgName) -> Option<&HandlerChain> {
        self.win(id)?.chains.get(&name)
    }

    /// Prepend a handler; it will run before everything added earlier.
    pub fn push_handler_front(&mut self, id: WindowId, name: MsgName, f: HandlerFn) -> Result<()> {
        let w = self.win_mut(id).ok_or(Error::WindowGone)?;
        w.chains.entry(name).or_default().push_front(f);
        Ok(())
    }

    /// Append a handler; it will run after everything added earlier.
    pub fn push_handler_back(&mut self, id: WindowId, name: MsgName, f: HandlerFn) -> Result<()> {
        let w = self.win_mut(id).ok_or(Error::WindowGone)?;
        w.chains.entry(name).or_default().push_back(f);
        Ok(())
    }

    /// Remove and return the most recently prepended handler.
    pub fn pop_handler_front(&mut self, id: WindowId, name: MsgName) -> Option<HandlerFn> {
        self.win_mut(id)?.chains.get_mut(&name)?.pop_front()
    }

    /// Register a teardown callback, run when the window is destroyed.
    pub fn push_destructor(&mut self, id: WindowId, f: DestructorFn) -> Result<()> {
        let w = self.win_mut(id).ok_or(Error::WindowGone)?;
        w.destructors.push(f);
        Ok(())
    }

    pub(crate) fn take_destructors(&mut self, id: WindowId) -> Vec<DestructorFn> {
        self.win_mut(id)
            .map(|w| std::mem::take(&mut w.destructors))
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Destruction
    // -------------------------------------------------------------------------

    /// First half of a destroy: unlink `id` from its parent, hand focus to
    /// the highest remaining sibling, and purge the dispatch path queues.
    ///
    /// Returns the doomed windows in destruction order (children first,
    /// `id` last); they stay in the arena so teardown callbacks can still
    /// look at them until [`free_window`](Self::free_window) reaps each one.
    /// `None` means the handle was already stale.
    pub fn begin_destroy(&mut self, id: WindowId, scope: PurgeScope) -> Option<Vec<WindowId>> {
        if !self.contains(id) {
            return None;
        }
        let order = self.subtree_postorder(id);

        let mut doomed: HashSet<WindowId> = HashSet::new();
        match scope {
            PurgeScope::Subtree => doomed.extend(order.iter().copied()),
            PurgeScope::TargetOnly => {
                doomed.insert(id);
            }
        }

        // Queues that may still carry messages for the doomed: the
        // window's own and every ancestor's, collected before unlinking.
        let mut purge_queues = Vec::new();
        if let Some(q) = self.queue(id) {
            purge_queues.push(q);
        }
        for anc in self.ancestors(id) {
            if let Some(q) = self.queue(anc) {
                purge_queues.push(q);
            }
        }

        if let Some(parent) = self.parent(id) {
            self.unlink_child(parent, id, true);
        }

        for q in &purge_queues {
            q.purge(&doomed);
        }

        Some(order)
    }

    /// Remove `child` from `parent`'s child vector, moving focus to the
    /// topmost eligible survivor when the child held it.
    fn unlink_child(&mut self, parent: WindowId, child: WindowId, refocus: bool) {
        let survivors: Option<Vec<WindowId>> = {
            let Some(p) = self.win_mut(parent) else { return };
            p.children.retain(|c| *c != child);
            p.flags |= WindowFlags::NEEDS_REPAINT;
            if p.focus_child == Some(child) {
                p.focus_child = None;
                refocus.then(|| p.children.clone())
            } else {
                None
            }
        };
        if let Some(children) = survivors {
            let replacement = children
                .iter()
                .rev()
                .find(|c| self.win(**c).is_some_and(|w| w.focus_eligible()))
                .copied();
            if let Some(p) = self.win_mut(parent) {
                p.focus_child = replacement;
            }
        }
    }

    /// Reap one window: unlink from any live parent and retire the slot.
    ///
    /// Part two of a destroy; call in the order `begin_destroy` returned.
    pub fn free_window(&mut self, id: WindowId) {
        let Some(w) = self.win(id) else { return };
        let parent = w.parent;
        if let Some(p) = parent {
            if self.contains(p) {
                self.unlink_child(p, id, false);
            }
        }
        let slot = &mut self.slots[id.index as usize];
        slot.generation += 1;
        slot.window = None;
        self.free.push(id.index);
    }

    /// Destroy a subtree in one call, without runtime teardown hooks.
    /// Returns how many windows died.
    pub fn destroy(&mut self, id: WindowId, scope: PurgeScope) -> usize {
        match self.begin_destroy(id, scope) {
            Some(order) => {
                let n = order.len();
                for wid in order {
                    self.free_window(wid);
                }
                n
            }
            None => 0,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{names, Message, Payload};

    const CLASS: ClassId = ClassId::for_tests(0);
    const FULL: Rect = Rect::new(0, 0, 80, 24);

    fn tree() -> WindowTree {
        WindowTree::new(FULL, CLASS)
    }

    #[test]
    fn test_root_is_live() {
        let t = tree();
        assert!(t.contains(t.root()));
        assert_eq!(t.len(), 1);
        assert_eq!(t.z_order(t.root()), Some(0));
    }

    #[test]
    fn test_create_appends_in_z_order() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, Rect::new(0, 0, 10, 5), CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(root, Rect::new(2, 2, 10, 5), CLASS, WindowFlags::empty()).unwrap();
        let c = t.create(root, Rect::new(4, 4, 10, 5), CLASS, WindowFlags::empty()).unwrap();

        assert_eq!(t.children(root), &[a, b, c]);
        assert_eq!(t.z_order(a), Some(0));
        assert_eq!(t.z_order(c), Some(2));
        assert!(t.flags(root).unwrap().contains(WindowFlags::NEEDS_REPAINT));
    }

    #[test]
    fn test_destroy_compacts_z_order() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let c = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();

        t.destroy(b, PurgeScope::Subtree);
        assert_eq!(t.children(root), &[a, c]);
        assert_eq!(t.z_order(c), Some(1));
    }

    #[test]
    fn test_stale_handle_misses_after_destroy() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        t.destroy(a, PurgeScope::Subtree);

        assert!(!t.contains(a));
        assert_eq!(t.bounds(a), None);
        assert_eq!(t.destroy(a, PurgeScope::Subtree), 0);

        // Slot reuse must not resurrect the old handle.
        let b = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        assert_ne!(a, b);
        assert!(!t.contains(a));
        assert!(t.contains(b));
    }

    #[test]
    fn test_destroy_cascades_to_descendants() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let c = t.create(b, FULL, CLASS, WindowFlags::empty()).unwrap();

        assert_eq!(t.destroy(a, PurgeScope::Subtree), 3);
        assert!(!t.contains(b));
        assert!(!t.contains(c));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_subtree_postorder_is_children_first() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let c = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let d = t.create(b, FULL, CLASS, WindowFlags::empty()).unwrap();

        assert_eq!(t.subtree_postorder(a), vec![d, b, c, a]);
    }

    #[test]
    fn test_focus_moves_to_highest_surviving_sibling() {
        let mut t = tree();
        let root = t.root();
        let d = t.create(root, FULL, CLASS, WindowFlags::DIALOG).unwrap();
        let a = t.create(d, FULL, CLASS, WindowFlags::ITEM).unwrap();
        let b = t.create(d, FULL, CLASS, WindowFlags::ITEM).unwrap();
        t.set_focus_child(d, a).unwrap();

        t.destroy(a, PurgeScope::Subtree);
        assert_eq!(t.focus_child(d), Some(b));
        assert!(t.flags(d).unwrap().contains(WindowFlags::NEEDS_REPAINT));
    }

    #[test]
    fn test_focus_replacement_skips_no_focus_windows() {
        let mut t = tree();
        let root = t.root();
        let d = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let a = t.create(d, FULL, CLASS, WindowFlags::empty()).unwrap();
        let deco = t.create(d, FULL, CLASS, WindowFlags::NO_FOCUS).unwrap();
        t.set_focus_child(d, a).unwrap();

        t.destroy(a, PurgeScope::Subtree);
        // `deco` sits higher but cannot take focus.
        assert_eq!(t.focus_child(d), None);
        assert!(t.contains(deco));
    }

    #[test]
    fn test_focus_empties_when_last_child_dies() {
        let mut t = tree();
        let root = t.root();
        let d = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let a = t.create(d, FULL, CLASS, WindowFlags::empty()).unwrap();
        t.set_focus_child(d, a).unwrap();

        t.destroy(a, PurgeScope::Subtree);
        assert_eq!(t.focus_child(d), None);
    }

    #[test]
    fn test_set_focus_rejects_non_child_and_no_focus() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let deco = t.create(root, FULL, CLASS, WindowFlags::NO_FOCUS).unwrap();

        assert!(matches!(t.set_focus_child(root, b), Err(Error::FocusRefused)));
        assert!(matches!(t.set_focus_child(root, deco), Err(Error::FocusRefused)));
        assert!(t.set_focus_child(a, b).is_ok());
    }

    #[test]
    fn test_move_window_shifts_descendant_origins() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, Rect::new(10, 10, 30, 10), CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(a, Rect::new(2, 1, 5, 3), CLASS, WindowFlags::empty()).unwrap();
        assert_eq!(t.screen_rect(b), Some(Rect::new(12, 11, 5, 3)));

        let (old, new) = t.move_window(a, Rect::new(20, 5, 30, 10)).unwrap();
        assert_eq!(old, Rect::new(10, 10, 30, 10));
        assert_eq!(new, Rect::new(20, 5, 30, 10));
        assert_eq!(t.screen_rect(b), Some(Rect::new(22, 6, 5, 3)));
    }

    #[test]
    fn test_paint_order_is_preorder_bottom_to_top() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let a1 = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();

        assert_eq!(t.paint_order(), vec![root, a, a1, b]);
    }

    #[test]
    fn test_paint_order_skips_hidden_subtrees() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::HIDDEN).unwrap();
        let _a1 = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();

        assert_eq!(t.paint_order(), vec![root, b]);
    }

    #[test]
    fn test_is_ancestor_or_self() {
        let mut t = tree();
        let root = t.root();
        let a = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let b = t.create(a, FULL, CLASS, WindowFlags::empty()).unwrap();
        let other = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();

        assert!(t.is_ancestor_or_self(root, b));
        assert!(t.is_ancestor_or_self(a, b));
        assert!(t.is_ancestor_or_self(b, b));
        assert!(!t.is_ancestor_or_self(other, b));
        assert!(!t.is_ancestor_or_self(b, a));
    }

    #[test]
    fn test_destroy_purges_own_and_ancestor_queues() {
        let mut t = tree();
        let root = t.root();
        let mid = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let leaf = t.create(mid, FULL, CLASS, WindowFlags::empty()).unwrap();

        let root_q = t.queue(root).unwrap();
        let mid_q = t.queue(mid).unwrap();
        root_q.push(Message::new(leaf, names::KEYDOWN, Payload::None));
        root_q.push(Message::new(root, names::KEYDOWN, Payload::None));
        mid_q.push(Message::new(leaf, names::KEYDOWN, Payload::None));

        t.destroy(mid, PurgeScope::Subtree);
        // Entries for mid and leaf vanish everywhere; root's own survive.
        assert_eq!(root_q.len(), 1);
        assert_eq!(root_q.pop().unwrap().target, root);
        assert_eq!(mid_q.len(), 0);
    }

    #[test]
    fn test_target_only_purge_keeps_descendant_messages() {
        let mut t = tree();
        let root = t.root();
        let mid = t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        let leaf = t.create(mid, FULL, CLASS, WindowFlags::empty()).unwrap();

        let root_q = t.queue(root).unwrap();
        root_q.push(Message::new(mid, names::KEYDOWN, Payload::None));
        root_q.push(Message::new(leaf, names::KEYDOWN, Payload::None));

        t.destroy(mid, PurgeScope::TargetOnly);
        // The leaf entry stays queued even though the leaf is gone; the
        // dispatcher drops it on arrival.
        assert_eq!(root_q.len(), 1);
        assert_eq!(root_q.pop().unwrap().target, leaf);
    }

    #[test]
    fn test_destroy_root_empties_tree() {
        let mut t = tree();
        let root = t.root();
        t.create(root, FULL, CLASS, WindowFlags::empty()).unwrap();
        assert_eq!(t.destroy(root, PurgeScope::Subtree), 2);
        assert!(t.is_empty());
        assert!(!t.contains(t.root()));
    }
}
