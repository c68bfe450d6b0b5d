//! The runtime: one object owning the tree, classes, screen, and input.
//!
//! Everything stateful funnels through here. The dispatch thread (whoever
//! called [`Runtime::run`]) is the only one that touches the runtime;
//! producer threads see just the routing snapshot and the queues behind
//! it. That split is the whole concurrency story: no locks around the
//! tree, short locks around each queue.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::class::{ClassDef, ClassId, ClassRegistry, Convention, HandlerFn, WindowClass};
use crate::dispatch;
use crate::error::{Error, Result};
use crate::input::keys::KeyTable;
use crate::input::mouse::PointerDevice;
use crate::input::reader::{ByteSource, InputThreads};
use crate::input::route::{HitRegion, InputRoute, RouteTarget};
use crate::message::{names, Message, MsgName, Payload, Retcode};
use crate::queue::MessageQueue;
use crate::screen::Screen;
use crate::terminal::TerminalGuard;
use crate::tree::{DestructorFn, PurgeScope, WindowId, WindowTree};
use crate::types::{Rect, WindowFlags};

// =============================================================================
// Options
// =============================================================================

/// Startup configuration.
pub struct RuntimeOptions {
    /// Screen size used until a terminal is attached, and by headless runs.
    pub size: (u16, u16),
    /// Ask the terminal for X10 mouse reports when attaching.
    pub mouse: bool,
    /// Raw pointer device to read, if any.
    pub mouse_device: Option<PathBuf>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        #[cfg(unix)]
        let mouse_device = Some(PathBuf::from(crate::input::mouse::DEFAULT_DEVICE));
        #[cfg(not(unix))]
        let mouse_device = None;
        Self { size: (80, 24), mouse: true, mouse_device }
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// The kernel instance.
///
/// Created headless; [`attach_terminal`](Self::attach_terminal) and
/// [`start_input`](Self::start_input) opt into a real terminal session.
/// Tests drive the same object by sending messages and running loops.
pub struct Runtime {
    tree: WindowTree,
    classes: ClassRegistry,
    screen: Screen,
    route: Arc<InputRoute>,
    key_table: Arc<KeyTable>,
    /// Nested dispatch loops, outermost first. The last entry is where
    /// focused input routes.
    active: Vec<WindowId>,
    dirty: bool,
    terminal: Option<TerminalGuard>,
    input: Option<InputThreads>,
    mouse: bool,
    mouse_device: Option<PathBuf>,
}

impl Runtime {
    pub fn new(options: RuntimeOptions) -> Self {
        let classes = ClassRegistry::new();
        let base = classes.base();
        let (w, h) = options.size;
        Self {
            tree: WindowTree::new(Rect::new(0, 0, w, h), base),
            classes,
            screen: Screen::new(w, h),
            route: InputRoute::new((w, h)),
            key_table: Arc::new(KeyTable::standard()),
            active: Vec::new(),
            dirty: true,
            terminal: None,
            input: None,
            mouse: options.mouse,
            mouse_device: options.mouse_device,
        }
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// The root window, created with the runtime.
    #[inline]
    pub fn root(&self) -> WindowId {
        self.tree.root()
    }

    /// Read-only tree access. All mutation goes through runtime methods so
    /// repaint batching stays coherent.
    #[inline]
    pub fn tree(&self) -> &WindowTree {
        &self.tree
    }

    #[inline]
    pub(crate) fn tree_mut(&mut self) -> &mut WindowTree {
        &mut self.tree
    }

    #[inline]
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    #[inline]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    #[inline]
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    /// The key table given to the keyboard thread.
    #[inline]
    pub fn key_table(&self) -> Arc<KeyTable> {
        Arc::clone(&self.key_table)
    }

    /// The routing snapshot shared with producers.
    #[inline]
    pub fn route(&self) -> Arc<InputRoute> {
        Arc::clone(&self.route)
    }

    /// Screen-absolute rectangle of a window.
    #[inline]
    pub fn screen_rect(&self, id: WindowId) -> Option<Rect> {
        self.tree.screen_rect(id)
    }

    #[inline]
    pub fn focus_child_of(&self, id: WindowId) -> Option<WindowId> {
        self.tree.focus_child(id)
    }

    /// How many dispatch loops are stacked right now.
    #[inline]
    pub fn loop_depth(&self) -> usize {
        self.active.len()
    }

    /// The window whose loop is innermost, if any.
    #[inline]
    pub fn active_window(&self) -> Option<WindowId> {
        self.active.last().copied()
    }

    // -------------------------------------------------------------------------
    // Classes
    // -------------------------------------------------------------------------

    pub fn register_class(&mut self, class: Arc<dyn WindowClass>) -> Result<ClassId> {
        let id = self.classes.register(class)?;
        log::debug!("registered class {:?}", id);
        Ok(id)
    }

    /// Register a class built from closures: a resolver declaring which
    /// names the class recognizes (and in what handler shape), and the
    /// default action for them. Declined names fall back through `parent`.
    pub fn create_class(
        &mut self,
        name: impl Into<String>,
        parent: ClassId,
        resolver: impl Fn(MsgName) -> Option<Convention> + Send + Sync + 'static,
        default: impl Fn(&mut Runtime, WindowId, &Message) -> Retcode + Send + Sync + 'static,
    ) -> Result<ClassId> {
        self.register_class(Arc::new(ClassDef::new(name, parent, resolver, default)))
    }

    // -------------------------------------------------------------------------
    // Window lifecycle
    // -------------------------------------------------------------------------

    /// Create a window as the topmost child of `parent`.
    pub fn create_window(
        &mut self,
        parent: WindowId,
        bounds: Rect,
        class: ClassId,
        flags: WindowFlags,
    ) -> Result<WindowId> {
        let id = self.tree.create(parent, bounds, class, flags)?;
        self.invalidate();
        Ok(id)
    }

    /// Destroy a window and its whole subtree.
    ///
    /// Unlinks first, purges the dispatch-path queues per `scope`, then
    /// reaps children before parents: each window's teardown callbacks and
    /// class hook run after its children are gone. Stale handles are a
    /// quiet no-op, so destroying twice is safe.
    pub fn destroy_window(&mut self, id: WindowId, scope: PurgeScope) {
        let was_root = self.tree.contains(id) && id == self.tree.root();
        let Some(order) = self.tree.begin_destroy(id, scope) else {
            return;
        };
        for wid in order {
            let destructors = self.tree.take_destructors(wid);
            for f in destructors {
                f(self, wid);
            }
            if let Some(cid) = self.tree.class_of(wid) {
                if let Some(class) = self.classes.get(cid).cloned() {
                    class.destroyed(self, wid);
                }
            }
            self.tree.free_window(wid);
        }
        self.invalidate();
        if was_root {
            log::debug!("root destroyed; shutting down");
            self.shutdown();
        }
    }

    /// Move and/or resize a window. Children keep their relative bounds
    /// and each one is told about the shift.
    pub fn move_window(&mut self, id: WindowId, bounds: Rect) -> Result<()> {
        let (old, new) = self.tree.move_window(id, bounds)?;
        self.invalidate();
        for child in self.tree.children(id).to_vec() {
            self.send(child, names::PARENT_REPOSITIONED, Payload::Reposition { old, new })?;
        }
        Ok(())
    }

    /// Hand a parent's focus to one of its children.
    pub fn set_focus(&mut self, parent: WindowId, child: WindowId) -> Result<()> {
        self.tree.set_focus_child(parent, child)?;
        self.invalidate();
        Ok(())
    }

    /// Adjust window flags, scheduling a repaint.
    pub fn update_window_flags(
        &mut self,
        id: WindowId,
        insert: WindowFlags,
        remove: WindowFlags,
    ) -> Result<()> {
        if !self.tree.contains(id) {
            return Err(Error::WindowGone);
        }
        self.tree.insert_flags(id, insert);
        self.tree.remove_flags(id, remove);
        self.invalidate();
        Ok(())
    }

    /// Register a teardown callback for `id`, run during destroy after the
    /// window's children are gone.
    pub fn on_destroy(
        &mut self,
        id: WindowId,
        f: impl FnOnce(&mut Runtime, WindowId) + 'static,
    ) -> Result<()> {
        self.tree.push_destructor(id, Box::new(f) as DestructorFn)
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    /// Prepend a handler to `id`'s chain for `name`; it runs before every
    /// handler registered earlier.
    ///
    /// The name must resolve through the window's class chain, and the
    /// handler's shape must fit the declared convention (raw fits all).
    pub fn add_handler(&mut self, id: WindowId, name: MsgName, handler: HandlerFn) -> Result<()> {
        self.check_convention(id, name, &handler)?;
        self.tree.push_handler_front(id, name, handler)
    }

    /// Append a handler; it runs after the existing chain, right before
    /// the class default.
    pub fn add_handler_to_end(
        &mut self,
        id: WindowId,
        name: MsgName,
        handler: HandlerFn,
    ) -> Result<()> {
        self.check_convention(id, name, &handler)?;
        self.tree.push_handler_back(id, name, handler)
    }

    /// Remove the most recently prepended handler for `name`.
    pub fn remove_handler(&mut self, id: WindowId, name: MsgName) -> Option<HandlerFn> {
        self.tree.pop_handler_front(id, name)
    }

    fn check_convention(&self, id: WindowId, name: MsgName, handler: &HandlerFn) -> Result<()> {
        let class = self.tree.class_of(id).ok_or(Error::WindowGone)?;
        match self.classes.resolve(class, name) {
            Some((_, convention)) => {
                if handler.fits(convention) {
                    Ok(())
                } else {
                    Err(Error::ConventionMismatch(name))
                }
            }
            None => Err(Error::UnrecognizedMessage(name)),
        }
    }

    // -------------------------------------------------------------------------
    // Messaging
    // -------------------------------------------------------------------------

    /// Queue a message for `target`.
    ///
    /// While a dispatch loop is active and `target` sits in its subtree,
    /// the message rides the loop window's queue; destroying that subtree
    /// can then purge everything in flight. `update-screen` never queues:
    /// it repaints synchronously and returns.
    pub fn send(&mut self, target: WindowId, name: MsgName, payload: Payload) -> Result<()> {
        if name == names::UPDATE_SCREEN {
            dispatch::repaint(self);
            return Ok(());
        }
        if !self.tree.contains(target) {
            return Err(Error::WindowGone);
        }
        let queue = match self.active.last() {
            Some(&active) if self.tree.is_ancestor_or_self(active, target) => {
                self.tree.queue(active)
            }
            _ => self.tree.queue(target),
        };
        match queue {
            Some(q) => {
                q.push(Message::new(target, name, payload));
                Ok(())
            }
            None => Err(Error::WindowGone),
        }
    }

    /// Ask a window to close. Sugar for sending `close`.
    pub fn close(&mut self, id: WindowId) -> Result<()> {
        self.send(id, names::CLOSE, Payload::None)
    }

    /// Dispatch a message immediately, skipping the queues. This is how
    /// defaults forward messages and how tests poke the chain directly.
    pub fn dispatch_now(&mut self, msg: &Message) -> Retcode {
        dispatch::dispatch_message(self, msg)
    }

    /// Synchronous full repaint.
    pub fn update_screen(&mut self) {
        dispatch::repaint(self);
    }

    /// Run a dispatch loop for `window` until it closes. Reentrant: call
    /// it from a handler to make `window` modal over the caller.
    pub fn run(&mut self, window: WindowId) -> Retcode {
        dispatch::run_loop(self, window)
    }

    /// Run the root window's loop, then tear the session down.
    pub fn run_root(&mut self) -> Retcode {
        let ret = self.run(self.root());
        self.shutdown();
        ret
    }

    // -------------------------------------------------------------------------
    // Terminal session
    // -------------------------------------------------------------------------

    /// Take over the terminal and size the root to it.
    pub fn attach_terminal(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        let guard = TerminalGuard::enter(self.mouse)?;
        let size = TerminalGuard::size().unwrap_or(self.screen.size());
        self.screen.resize(size.0, size.1);
        let root = self.root();
        self.move_window(root, Rect::new(0, 0, size.0, size.1))?;
        self.terminal = Some(guard);
        self.invalidate();
        log::info!("terminal attached at {}x{}", size.0, size.1);
        Ok(())
    }

    /// Start the stock input producers: stdin for keys, the configured
    /// pointer device when it opens. A missing pointer device is normal
    /// and only logged.
    #[cfg(unix)]
    pub fn start_input(&mut self) -> Result<()> {
        use crate::input::mouse::Ps2Device;
        use crate::input::reader::StdinSource;

        let pointer: Option<Box<dyn PointerDevice>> = match &self.mouse_device {
            Some(path) => match Ps2Device::open(path) {
                Ok(dev) => Some(Box::new(dev)),
                Err(e) => {
                    log::debug!("pointer device {} unavailable: {e}", path.display());
                    None
                }
            },
            None => None,
        };
        self.start_input_with(Box::new(StdinSource::new()), pointer)
    }

    #[cfg(not(unix))]
    pub fn start_input(&mut self) -> Result<()> {
        log::debug!("stock input producers need unix; use start_input_with");
        Ok(())
    }

    /// Start input producers over caller-supplied sources.
    pub fn start_input_with(
        &mut self,
        keyboard: Box<dyn ByteSource>,
        pointer: Option<Box<dyn PointerDevice>>,
    ) -> Result<()> {
        if self.input.is_some() {
            return Ok(());
        }
        let threads = InputThreads::spawn(
            Arc::clone(&self.route),
            Arc::clone(&self.key_table),
            keyboard,
            pointer,
        )?;
        self.input = Some(threads);
        Ok(())
    }

    /// Stop producers (joining them) and give the terminal back.
    pub fn shutdown(&mut self) {
        if let Some(mut threads) = self.input.take() {
            threads.stop();
        }
        if let Some(mut guard) = self.terminal.take() {
            guard.restore();
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch plumbing
    // -------------------------------------------------------------------------

    /// Schedule a repaint for the next loop iteration.
    #[inline]
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn is_active(&self, id: WindowId) -> bool {
        self.active.contains(&id)
    }

    pub(crate) fn push_active(&mut self, id: WindowId) {
        self.active.push(id);
        self.publish_focus();
    }

    pub(crate) fn pop_active(&mut self) {
        self.active.pop();
        self.publish_focus();
    }

    pub(crate) fn parent_is_dialog(&self, id: WindowId) -> bool {
        self.tree
            .parent(id)
            .and_then(|p| self.tree.flags(p))
            .is_some_and(|f| f.contains(WindowFlags::DIALOG))
    }

    /// Point the route's focus at the innermost live loop window.
    fn publish_focus(&self) {
        let target = self
            .active
            .last()
            .filter(|id| self.tree.contains(**id))
            .and_then(|id| {
                self.tree.queue(*id).map(|queue| RouteTarget { id: *id, queue })
            });
        self.route.set_focus(target);
    }

    /// Ship the buffer when a terminal is attached; headless runs keep the
    /// buffer for inspection instead.
    pub(crate) fn flush_screen(&mut self) {
        if self.terminal.is_some() {
            let mut out = io::stdout();
            if let Err(e) = self.screen.flush_to(&mut out) {
                log::debug!("screen flush failed: {e}");
            }
        }
    }

    /// Rebuild the hit list after a repaint.
    ///
    /// Regions for windows inside the active loop's subtree route to the
    /// loop's queue; everything else routes to its own window.
    pub(crate) fn refresh_route(&mut self) {
        let active = self
            .active
            .last()
            .copied()
            .filter(|a| self.tree.contains(*a));
        let mut hits = Vec::new();
        for id in self.tree.paint_order() {
            let Some(rect) = self.tree.screen_rect(id) else { continue };
            let routed = match active {
                Some(a) if self.tree.is_ancestor_or_self(a, id) => a,
                _ => id,
            };
            let Some(queue) = self.tree.queue(routed) else { continue };
            hits.push(HitRegion { id, rect, queue });
        }
        self.route.publish(hits, self.screen.size());
    }

    /// A window's queue, for tests and diagnostics.
    pub fn queue_of(&self, id: WindowId) -> Option<Arc<MessageQueue>> {
        self.tree.queue(id)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeOptions::default())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::keys::Key;
    use crate::types::CellAttrs;
    use parking_lot::Mutex;

    const PROBE: MsgName = MsgName::from_static("probe");

    /// A class recognizing one raw message, logging everything it does.
    struct ProbeClass {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl WindowClass for ProbeClass {
        fn name(&self) -> &str {
            "probe"
        }
        fn parent(&self) -> Option<ClassId> {
            Some(ClassId::for_tests(0))
        }
        fn recognizes(&self, name: MsgName) -> Option<Convention> {
            (name == PROBE).then_some(Convention::Raw)
        }
        fn default_action(&self, _rt: &mut Runtime, _win: WindowId, msg: &Message) -> Retcode {
            if msg.name == PROBE {
                self.log.lock().push("default".into());
            }
            Retcode::Ok
        }
        fn destroyed(&self, _rt: &mut Runtime, _win: WindowId) {
            self.log.lock().push("class-destroyed".into());
        }
    }

    fn rt() -> Runtime {
        Runtime::new(RuntimeOptions { size: (40, 12), mouse: false, mouse_device: None })
    }

    fn probe_rt() -> (Runtime, ClassId, Arc<Mutex<Vec<String>>>) {
        let mut rt = rt();
        let log = Arc::new(Mutex::new(Vec::new()));
        let class = rt
            .register_class(Arc::new(ProbeClass { log: Arc::clone(&log) }))
            .unwrap();
        (rt, class, log)
    }

    fn logger(log: &Arc<Mutex<Vec<String>>>, tag: &'static str, ret: Retcode) -> HandlerFn {
        let log = Arc::clone(log);
        HandlerFn::raw(move |_, _, _| {
            log.lock().push(tag.into());
            ret
        })
    }

    #[test]
    fn test_send_lands_on_target_queue_without_loop() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 10, 3), base, WindowFlags::empty())
            .unwrap();

        rt.send(win, names::KEYDOWN, Payload::Key(Key::Enter)).unwrap();
        assert_eq!(rt.queue_of(win).unwrap().len(), 1);
        assert_eq!(rt.queue_of(rt.root()).unwrap().len(), 0);
    }

    #[test]
    fn test_send_rides_active_loop_queue() {
        let mut rt = rt();
        let base = rt.classes().base();
        let outer = rt
            .create_window(rt.root(), Rect::new(0, 0, 20, 10), base, WindowFlags::empty())
            .unwrap();
        let inner = rt
            .create_window(outer, Rect::new(1, 1, 5, 3), base, WindowFlags::empty())
            .unwrap();
        let bystander = rt
            .create_window(rt.root(), Rect::new(0, 0, 5, 3), base, WindowFlags::empty())
            .unwrap();

        rt.push_active(outer);
        rt.send(inner, names::KEYDOWN, Payload::Key(Key::Tab)).unwrap();
        rt.send(bystander, names::KEYDOWN, Payload::Key(Key::Tab)).unwrap();
        rt.pop_active();

        // In-subtree rides the loop queue; outsiders keep their own.
        assert_eq!(rt.queue_of(outer).unwrap().len(), 1);
        assert_eq!(rt.queue_of(inner).unwrap().len(), 0);
        assert_eq!(rt.queue_of(bystander).unwrap().len(), 1);
    }

    #[test]
    fn test_send_to_stale_handle_fails() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 4, 2), base, WindowFlags::empty())
            .unwrap();
        rt.destroy_window(win, PurgeScope::Subtree);

        assert!(matches!(
            rt.send(win, names::CLOSE, Payload::None),
            Err(Error::WindowGone)
        ));
    }

    #[test]
    fn test_chain_runs_newest_first_then_default() {
        let (mut rt, class, log) = probe_rt();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 4, 2), class, WindowFlags::empty())
            .unwrap();

        rt.add_handler(win, PROBE, logger(&log, "old", Retcode::Ok)).unwrap();
        rt.add_handler(win, PROBE, logger(&log, "new", Retcode::Ok)).unwrap();
        rt.add_handler_to_end(win, PROBE, logger(&log, "tail", Retcode::Ok)).unwrap();

        let ret = rt.dispatch_now(&Message::new(win, PROBE, Payload::None));
        assert_eq!(ret, Retcode::Ok);
        assert_eq!(*log.lock(), vec!["new", "old", "tail", "default"]);
    }

    #[test]
    fn test_stop_finishes_chain_but_suppresses_default() {
        let (mut rt, class, log) = probe_rt();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 4, 2), class, WindowFlags::empty())
            .unwrap();

        rt.add_handler(win, PROBE, logger(&log, "later", Retcode::Ok)).unwrap();
        rt.add_handler(win, PROBE, logger(&log, "stopper", Retcode::Stop)).unwrap();

        let ret = rt.dispatch_now(&Message::new(win, PROBE, Payload::None));
        assert_eq!(ret, Retcode::Stop);
        assert_eq!(*log.lock(), vec!["stopper", "later"]);
    }

    #[test]
    fn test_exit_short_circuits_chain_and_default() {
        let (mut rt, class, log) = probe_rt();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 4, 2), class, WindowFlags::empty())
            .unwrap();

        rt.add_handler(win, PROBE, logger(&log, "unreached", Retcode::Ok)).unwrap();
        rt.add_handler(win, PROBE, logger(&log, "exiter", Retcode::Exit)).unwrap();

        let ret = rt.dispatch_now(&Message::new(win, PROBE, Payload::None));
        assert_eq!(ret, Retcode::Exit);
        assert_eq!(*log.lock(), vec!["exiter"]);
    }

    #[test]
    fn test_unrecognized_message_drops_quietly() {
        let mut rt = rt();
        let nobody = MsgName::intern("nobody-speaks-this");
        let ret = rt.dispatch_now(&Message::new(rt.root(), nobody, Payload::None));
        assert_eq!(ret, Retcode::Ok);
    }

    #[test]
    fn test_handler_registration_is_convention_checked() {
        let mut rt = rt();
        let root = rt.root();

        assert!(matches!(
            rt.add_handler(root, names::KEYDOWN, HandlerFn::mouse(|_, _, _| Retcode::Ok)),
            Err(Error::ConventionMismatch(_))
        ));
        assert!(matches!(
            rt.add_handler(root, MsgName::intern("made-up"), HandlerFn::plain(|_, _| Retcode::Ok)),
            Err(Error::UnrecognizedMessage(_))
        ));
        // Typed match and raw both pass.
        rt.add_handler(root, names::KEYDOWN, HandlerFn::key(|_, _, _| Retcode::Ok)).unwrap();
        rt.add_handler(root, names::KEYDOWN, HandlerFn::raw(|_, _, _| Retcode::Ok)).unwrap();
    }

    #[test]
    fn test_create_class_builds_a_working_class() {
        let mut rt = rt();
        let ping = MsgName::intern("ping");
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let base = rt.classes().base();
        let cls = rt
            .create_class(
                "pinger",
                base,
                move |n| if n == ping { Some(Convention::Plain) } else { None },
                move |_, _, msg| {
                    sink.lock().push(msg.name.as_str().to_owned());
                    Retcode::Ok
                },
            )
            .unwrap();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 5, 2), cls, WindowFlags::empty())
            .unwrap();

        rt.dispatch_now(&Message::new(win, ping, Payload::None));
        assert_eq!(*log.lock(), vec!["ping"]);
        // Standard names still resolve through the declared parent.
        rt.add_handler(win, names::KEYDOWN, HandlerFn::key(|_, _, _| Retcode::Ok)).unwrap();
    }

    #[test]
    fn test_keydown_default_walks_focus_chain() {
        let mut rt = rt();
        let base = rt.classes().base();
        let parent = rt
            .create_window(rt.root(), Rect::new(0, 0, 20, 10), base, WindowFlags::empty())
            .unwrap();
        let child = rt
            .create_window(parent, Rect::new(1, 1, 5, 3), base, WindowFlags::empty())
            .unwrap();
        rt.set_focus(parent, child).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        rt.add_handler(
            child,
            names::KEYDOWN,
            HandlerFn::key(move |_, _, key| {
                sink.lock().push(key);
                Retcode::Stop
            }),
        )
        .unwrap();

        rt.dispatch_now(&Message::new(parent, names::KEYDOWN, Payload::Key(Key::Char('x'))));
        assert_eq!(*seen.lock(), vec![Key::Char('x')]);
    }

    #[test]
    fn test_update_screen_send_paints_synchronously() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(2, 1, 10, 3), base, WindowFlags::empty())
            .unwrap();
        rt.add_handler(
            win,
            names::DISPLAY,
            HandlerFn::plain(|rt, win| {
                if let Some(r) = rt.screen_rect(win) {
                    rt.screen_mut().put_str(r.x, r.y, "painted", CellAttrs::empty());
                }
                Retcode::Ok
            }),
        )
        .unwrap();

        rt.send(win, names::UPDATE_SCREEN, Payload::None).unwrap();
        assert!(rt.screen().row_text(1).contains("painted"));
        assert_eq!(rt.queue_of(win).unwrap().len(), 0);
        assert_eq!(rt.queue_of(rt.root()).unwrap().len(), 0);
        assert!(!rt.tree().flags(win).unwrap().contains(WindowFlags::NEEDS_REPAINT));
    }

    #[test]
    fn test_destructors_run_children_first() {
        let mut rt = rt();
        let base = rt.classes().base();
        let a = rt
            .create_window(rt.root(), Rect::new(0, 0, 10, 5), base, WindowFlags::empty())
            .unwrap();
        let b = rt.create_window(a, Rect::new(0, 0, 5, 2), base, WindowFlags::empty()).unwrap();
        let c = rt.create_window(b, Rect::new(0, 0, 2, 1), base, WindowFlags::empty()).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for (id, tag) in [(a, "a"), (b, "b"), (c, "c")] {
            let order = Arc::clone(&order);
            rt.on_destroy(id, move |rt, wid| {
                // Children are unlinked before a parent's callback runs.
                assert!(rt.tree().children(wid).is_empty());
                order.lock().push(tag);
            })
            .unwrap();
        }

        rt.destroy_window(a, PurgeScope::Subtree);
        assert_eq!(*order.lock(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_class_destroyed_hook_fires_per_window() {
        let (mut rt, class, log) = probe_rt();
        let a = rt
            .create_window(rt.root(), Rect::new(0, 0, 10, 5), class, WindowFlags::empty())
            .unwrap();
        let _b = rt.create_window(a, Rect::new(0, 0, 5, 2), class, WindowFlags::empty()).unwrap();

        rt.destroy_window(a, PurgeScope::Subtree);
        assert_eq!(
            log.lock().iter().filter(|s| *s == "class-destroyed").count(),
            2
        );
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(0, 0, 4, 2), base, WindowFlags::empty())
            .unwrap();

        rt.destroy_window(win, PurgeScope::Subtree);
        rt.destroy_window(win, PurgeScope::Subtree);
        assert!(!rt.tree().contains(win));
        assert_eq!(rt.tree().len(), 1);
    }

    #[test]
    fn test_destroy_purges_active_dispatch_path() {
        let mut rt = rt();
        let base = rt.classes().base();
        let dialog = rt
            .create_window(rt.root(), Rect::new(0, 0, 20, 10), base, WindowFlags::DIALOG)
            .unwrap();
        let item = rt
            .create_window(dialog, Rect::new(1, 1, 5, 1), base, WindowFlags::ITEM)
            .unwrap();

        rt.push_active(dialog);
        rt.send(item, names::KEYDOWN, Payload::Key(Key::Enter)).unwrap();
        rt.send(dialog, names::KEYDOWN, Payload::Key(Key::Tab)).unwrap();
        assert_eq!(rt.queue_of(dialog).unwrap().len(), 2);

        rt.destroy_window(item, PurgeScope::Subtree);
        rt.pop_active();

        // Only the dialog's own message survives the purge.
        let q = rt.queue_of(dialog).unwrap();
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().unwrap().target, dialog);
    }

    #[test]
    fn test_move_window_notifies_children() {
        let mut rt = rt();
        let base = rt.classes().base();
        let parent = rt
            .create_window(rt.root(), Rect::new(10, 5, 20, 5), base, WindowFlags::empty())
            .unwrap();
        let child = rt
            .create_window(parent, Rect::new(2, 1, 5, 2), base, WindowFlags::empty())
            .unwrap();

        rt.move_window(parent, Rect::new(15, 6, 20, 5)).unwrap();

        let msg = rt.queue_of(child).unwrap().pop().unwrap();
        assert_eq!(msg.name, names::PARENT_REPOSITIONED);
        match msg.payload {
            Payload::Reposition { old, new } => {
                assert_eq!(old, Rect::new(10, 5, 20, 5));
                assert_eq!(new, Rect::new(15, 6, 20, 5));
            }
            other => panic!("expected reposition payload, got {other:?}"),
        }
        // The child's absolute position followed its parent.
        assert_eq!(rt.screen_rect(child), Some(Rect::new(17, 7, 5, 2)));
    }

    #[test]
    fn test_repaint_clears_flags_and_publishes_route() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(5, 2, 10, 4), base, WindowFlags::empty())
            .unwrap();

        rt.update_screen();
        assert!(!rt.tree().flags(rt.root()).unwrap().contains(WindowFlags::NEEDS_REPAINT));

        // The published hit list knows the new window's rectangle.
        let route = rt.route();
        let hit = route.hit_test(6, 3).unwrap();
        assert_eq!(hit.id, win);
    }

    #[test]
    fn test_hidden_window_is_unroutable() {
        let mut rt = rt();
        let base = rt.classes().base();
        let win = rt
            .create_window(rt.root(), Rect::new(5, 2, 10, 4), base, WindowFlags::HIDDEN)
            .unwrap();

        rt.update_screen();
        let route = rt.route();
        assert_eq!(route.hit_test(6, 3).unwrap().id, rt.root());
        let _ = win;
    }
}
