//! Window classes and handler chains.
//!
//! A class is behavior shared by windows of one kind: which message names
//! it recognizes (and in what handler shape), what happens by default, and
//! which class to fall back to. Classes chain through a single parent,
//! giving windows inheritance without objects: resolution walks child to
//! parent until some class recognizes the name.
//!
//! Per-window handler chains refine that behavior. Handlers run newest
//! first, then the class default, unless one of them said [`Retcode::Stop`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::input::keys::Key;
use crate::input::mouse::MouseInfo;
use crate::message::{names, Message, MsgName, Retcode};
use crate::runtime::Runtime;
use crate::tree::WindowId;
use crate::types::Rect;

// =============================================================================
// Identity
// =============================================================================

/// Registry-assigned class handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    #[cfg(test)]
    pub(crate) const fn for_tests(n: usize) -> Self {
        Self(n)
    }
}

/// The shape a handler must have for a given message name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// No payload worth unpacking.
    Plain,
    /// Carries a decoded key.
    Key,
    /// Carries a pointer event.
    Mouse,
    /// Carries old and new screen rectangles.
    Reposition,
    /// Hand over the whole message, payload included.
    Raw,
}

/// The convention of the built-in message vocabulary, if `name` is part
/// of it.
pub fn standard_convention(name: MsgName) -> Option<Convention> {
    if name == names::KEYDOWN {
        Some(Convention::Key)
    } else if name == names::MOUSE_DOWN || name == names::MOUSE_UP || name == names::MOUSE_DOUBLE {
        Some(Convention::Mouse)
    } else if name == names::PARENT_REPOSITIONED {
        Some(Convention::Reposition)
    } else if name == names::DISPLAY
        || name == names::CLOSE
        || name == names::ERASE_BACKGROUND
        || name == names::UPDATE_SCREEN
        || name == names::CHANGE_FOCUS
    {
        Some(Convention::Plain)
    } else {
        None
    }
}

// =============================================================================
// Handlers
// =============================================================================

pub type PlainFn = Arc<dyn Fn(&mut Runtime, WindowId) -> Retcode + Send + Sync>;
pub type KeyFn = Arc<dyn Fn(&mut Runtime, WindowId, Key) -> Retcode + Send + Sync>;
pub type MouseFn = Arc<dyn Fn(&mut Runtime, WindowId, MouseInfo) -> Retcode + Send + Sync>;
pub type RepositionFn = Arc<dyn Fn(&mut Runtime, WindowId, Rect, Rect) -> Retcode + Send + Sync>;
pub type RawFn = Arc<dyn Fn(&mut Runtime, WindowId, &Message) -> Retcode + Send + Sync>;

/// One registered handler, shaped to its message's calling convention.
///
/// The dispatcher unpacks the payload before the call, so a keydown
/// handler takes a [`Key`], not a payload to downcast.
#[derive(Clone)]
pub enum HandlerFn {
    Plain(PlainFn),
    Key(KeyFn),
    Mouse(MouseFn),
    Reposition(RepositionFn),
    Raw(RawFn),
}

impl HandlerFn {
    pub fn plain(f: impl Fn(&mut Runtime, WindowId) -> Retcode + Send + Sync + 'static) -> Self {
        Self::Plain(Arc::new(f))
    }

    pub fn key(f: impl Fn(&mut Runtime, WindowId, Key) -> Retcode + Send + Sync + 'static) -> Self {
        Self::Key(Arc::new(f))
    }

    pub fn mouse(
        f: impl Fn(&mut Runtime, WindowId, MouseInfo) -> Retcode + Send + Sync + 'static,
    ) -> Self {
        Self::Mouse(Arc::new(f))
    }

    pub fn reposition(
        f: impl Fn(&mut Runtime, WindowId, Rect, Rect) -> Retcode + Send + Sync + 'static,
    ) -> Self {
        Self::Reposition(Arc::new(f))
    }

    pub fn raw(
        f: impl Fn(&mut Runtime, WindowId, &Message) -> Retcode + Send + Sync + 'static,
    ) -> Self {
        Self::Raw(Arc::new(f))
    }

    pub fn convention(&self) -> Convention {
        match self {
            Self::Plain(_) => Convention::Plain,
            Self::Key(_) => Convention::Key,
            Self::Mouse(_) => Convention::Mouse,
            Self::Reposition(_) => Convention::Reposition,
            Self::Raw(_) => Convention::Raw,
        }
    }

    /// A raw handler fits any convention; the typed ones must agree.
    pub(crate) fn fits(&self, convention: Convention) -> bool {
        matches!(self, Self::Raw(_)) || self.convention() == convention
    }
}

impl fmt::Debug for HandlerFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerFn::{:?}", self.convention())
    }
}

/// The per-window handler list for one message name.
///
/// Front of the list runs first; registration prepends by default, so the
/// newest handler sees the message before older ones.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<HandlerFn>,
}

impl HandlerChain {
    pub fn push_front(&mut self, f: HandlerFn) {
        self.handlers.insert(0, f);
    }

    pub fn push_back(&mut self, f: HandlerFn) {
        self.handlers.push(f);
    }

    pub fn pop_front(&mut self) -> Option<HandlerFn> {
        if self.handlers.is_empty() {
            None
        } else {
            Some(self.handlers.remove(0))
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Clone the chain in run order, so dispatch can iterate without
    /// holding a borrow on the tree.
    pub(crate) fn snapshot(&self) -> Vec<HandlerFn> {
        self.handlers.clone()
    }
}

// =============================================================================
// Class trait
// =============================================================================

/// Shared behavior for windows of one kind.
pub trait WindowClass {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// The class resolution falls back to when this one does not
    /// recognize a message.
    fn parent(&self) -> Option<ClassId> {
        None
    }

    /// Whether this class understands `name`, and in which handler shape.
    fn recognizes(&self, name: MsgName) -> Option<Convention>;

    /// Built-in behavior for a recognized message. Runs after the
    /// window's handler chain unless a handler returned [`Retcode::Stop`].
    fn default_action(&self, rt: &mut Runtime, win: WindowId, msg: &Message) -> Retcode;

    /// Teardown hook, run once per window during destroy. The window's
    /// children are already gone; the window itself is still addressable.
    fn destroyed(&self, rt: &mut Runtime, win: WindowId) {
        let _ = (rt, win);
    }
}

// =============================================================================
// Closure-built classes
// =============================================================================

pub type ResolverFn = Arc<dyn Fn(MsgName) -> Option<Convention> + Send + Sync>;
pub type DefaultFn = Arc<dyn Fn(&mut Runtime, WindowId, &Message) -> Retcode + Send + Sync>;

/// A [`WindowClass`] assembled from closures.
///
/// Collaborators that want a message vocabulary and a default action
/// without writing a trait impl build one of these. Names the resolver
/// declines fall back through `parent` as usual.
pub struct ClassDef {
    name: String,
    parent: ClassId,
    resolver: ResolverFn,
    default: DefaultFn,
}

impl ClassDef {
    pub fn new(
        name: impl Into<String>,
        parent: ClassId,
        resolver: impl Fn(MsgName) -> Option<Convention> + Send + Sync + 'static,
        default: impl Fn(&mut Runtime, WindowId, &Message) -> Retcode + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            resolver: Arc::new(resolver),
            default: Arc::new(default),
        }
    }
}

impl WindowClass for ClassDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<ClassId> {
        Some(self.parent)
    }

    fn recognizes(&self, name: MsgName) -> Option<Convention> {
        (self.resolver)(name)
    }

    fn default_action(&self, rt: &mut Runtime, win: WindowId, msg: &Message) -> Retcode {
        (self.default)(rt, win, msg)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// All classes known to one runtime.
///
/// Ids are assigned in registration order and parents must already be
/// registered, which keeps the fallback chain acyclic by construction.
pub struct ClassRegistry {
    classes: Vec<Arc<dyn WindowClass>>,
    by_name: HashMap<String, ClassId>,
}

impl ClassRegistry {
    /// A registry holding only the base "window" class.
    pub fn new() -> Self {
        let mut reg = Self { classes: Vec::new(), by_name: HashMap::new() };
        let base: Arc<dyn WindowClass> = Arc::new(BaseClass);
        reg.by_name.insert(base.name().to_owned(), ClassId(0));
        reg.classes.push(base);
        reg
    }

    /// The built-in root of every fallback chain.
    #[inline]
    pub fn base(&self) -> ClassId {
        ClassId(0)
    }

    pub fn register(&mut self, class: Arc<dyn WindowClass>) -> Result<ClassId> {
        let name = class.name().to_owned();
        if self.by_name.contains_key(&name) {
            return Err(Error::ClassExists(name));
        }
        if let Some(parent) = class.parent() {
            if parent.0 >= self.classes.len() {
                return Err(Error::NoSuchClass);
            }
        }
        let id = ClassId(self.classes.len());
        self.by_name.insert(name, id);
        self.classes.push(class);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: ClassId) -> Option<&Arc<dyn WindowClass>> {
        self.classes.get(id.0)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Walk the fallback chain from `class` until some class recognizes
    /// `name`. Returns that class and the convention it declared.
    pub fn resolve(&self, class: ClassId, name: MsgName) -> Option<(ClassId, Convention)> {
        let mut cur = Some(class);
        while let Some(cid) = cur {
            let c = self.get(cid)?;
            if let Some(conv) = c.recognizes(name) {
                return Some((cid, conv));
            }
            cur = c.parent();
        }
        None
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Base class
// =============================================================================

/// The class every fallback chain bottoms out in.
///
/// Recognizes the whole standard vocabulary. Its defaults are the quiet
/// kernel behaviors: erase fills the window with blanks, keydown forwards
/// to the focus child, everything else is accepted and ignored.
pub(crate) struct BaseClass;

impl WindowClass for BaseClass {
    fn name(&self) -> &str {
        "window"
    }

    fn recognizes(&self, name: MsgName) -> Option<Convention> {
        standard_convention(name)
    }

    fn default_action(&self, rt: &mut Runtime, win: WindowId, msg: &Message) -> Retcode {
        if msg.name == names::ERASE_BACKGROUND {
            if let Some(rect) = rt.screen_rect(win) {
                rt.screen_mut().fill_rect(rect, ' ', crate::types::CellAttrs::empty());
            }
            Retcode::Ok
        } else if msg.name == names::KEYDOWN {
            // Route the key down the focus chain.
            let key = match &msg.payload {
                crate::message::Payload::Key(k) => *k,
                _ => return Retcode::Ok,
            };
            match rt.focus_child_of(win) {
                Some(child) if child != win => rt.dispatch_now(&Message::new(
                    child,
                    names::KEYDOWN,
                    crate::message::Payload::Key(key),
                )),
                _ => Retcode::Ok,
            }
        } else {
            Retcode::Ok
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Retcode;

    struct Inert {
        name: &'static str,
        parent: Option<ClassId>,
        recognized: Option<(MsgName, Convention)>,
    }

    impl WindowClass for Inert {
        fn name(&self) -> &str {
            self.name
        }
        fn parent(&self) -> Option<ClassId> {
            self.parent
        }
        fn recognizes(&self, name: MsgName) -> Option<Convention> {
            match self.recognized {
                Some((n, conv)) if n == name => Some(conv),
                _ => None,
            }
        }
        fn default_action(&self, _rt: &mut Runtime, _win: WindowId, _msg: &Message) -> Retcode {
            Retcode::Ok
        }
    }

    #[test]
    fn test_registry_starts_with_base() {
        let reg = ClassRegistry::new();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.lookup("window"), Some(reg.base()));
    }

    #[test]
    fn test_register_rejects_duplicate_name() {
        let mut reg = ClassRegistry::new();
        let c = Arc::new(Inert { name: "editor", parent: None, recognized: None });
        reg.register(c.clone()).unwrap();
        assert!(matches!(reg.register(c), Err(Error::ClassExists(_))));
    }

    #[test]
    fn test_register_rejects_unknown_parent() {
        let mut reg = ClassRegistry::new();
        let c = Arc::new(Inert {
            name: "orphan",
            parent: Some(ClassId(99)),
            recognized: None,
        });
        assert!(matches!(reg.register(c), Err(Error::NoSuchClass)));
    }

    #[test]
    fn test_resolve_walks_to_base() {
        let mut reg = ClassRegistry::new();
        let base = reg.base();
        let mid = reg
            .register(Arc::new(Inert { name: "mid", parent: Some(base), recognized: None }))
            .unwrap();
        let leaf = reg
            .register(Arc::new(Inert { name: "leaf", parent: Some(mid), recognized: None }))
            .unwrap();

        // Neither leaf nor mid recognize keydown; the base does.
        let (owner, conv) = reg.resolve(leaf, names::KEYDOWN).unwrap();
        assert_eq!(owner, base);
        assert_eq!(conv, Convention::Key);
    }

    #[test]
    fn test_resolve_stops_at_first_recognizer() {
        let mut reg = ClassRegistry::new();
        let base = reg.base();
        let custom = MsgName::from_static("editor-save");
        let mid = reg
            .register(Arc::new(Inert {
                name: "mid",
                parent: Some(base),
                recognized: Some((custom, Convention::Raw)),
            }))
            .unwrap();
        let leaf = reg
            .register(Arc::new(Inert { name: "leaf", parent: Some(mid), recognized: None }))
            .unwrap();

        let (owner, conv) = reg.resolve(leaf, custom).unwrap();
        assert_eq!(owner, mid);
        assert_eq!(conv, Convention::Raw);
    }

    #[test]
    fn test_resolve_unrecognized_is_none() {
        let reg = ClassRegistry::new();
        assert!(reg.resolve(reg.base(), MsgName::from_static("no-such")).is_none());
    }

    #[test]
    fn test_class_def_resolves_then_falls_back() {
        let mut reg = ClassRegistry::new();
        let base = reg.base();
        let save = MsgName::from_static("sheet-save");
        let def = ClassDef::new(
            "sheet",
            base,
            move |n| if n == save { Some(Convention::Plain) } else { None },
            |_, _, _| Retcode::Stop,
        );
        let id = reg.register(Arc::new(def)).unwrap();

        assert_eq!(reg.resolve(id, save), Some((id, Convention::Plain)));
        // Names the closure declines still reach the base class.
        let (owner, conv) = reg.resolve(id, names::KEYDOWN).unwrap();
        assert_eq!(owner, base);
        assert_eq!(conv, Convention::Key);
    }

    #[test]
    fn test_chain_front_runs_before_older() {
        let mut chain = HandlerChain::default();
        chain.push_front(HandlerFn::plain(|_, _| Retcode::Ok));
        chain.push_front(HandlerFn::key(|_, _, _| Retcode::Ok));
        chain.push_back(HandlerFn::raw(|_, _, _| Retcode::Ok));

        let order: Vec<Convention> =
            chain.snapshot().iter().map(|h| h.convention()).collect();
        assert_eq!(order, vec![Convention::Key, Convention::Plain, Convention::Raw]);
    }

    #[test]
    fn test_chain_pop_front_removes_newest() {
        let mut chain = HandlerChain::default();
        chain.push_front(HandlerFn::plain(|_, _| Retcode::Ok));
        chain.push_front(HandlerFn::key(|_, _, _| Retcode::Ok));

        let popped = chain.pop_front().unwrap();
        assert_eq!(popped.convention(), Convention::Key);
        assert_eq!(chain.len(), 1);
        assert!(chain.pop_front().is_some());
        assert!(chain.pop_front().is_none());
    }

    #[test]
    fn test_raw_handler_fits_every_convention() {
        let raw = HandlerFn::raw(|_, _, _| Retcode::Ok);
        assert!(raw.fits(Convention::Key));
        assert!(raw.fits(Convention::Plain));

        let key = HandlerFn::key(|_, _, _| Retcode::Ok);
        assert!(key.fits(Convention::Key));
        assert!(!key.fits(Convention::Mouse));
    }

    #[test]
    fn test_standard_convention_map() {
        assert_eq!(standard_convention(names::KEYDOWN), Some(Convention::Key));
        assert_eq!(standard_convention(names::MOUSE_DOUBLE), Some(Convention::Mouse));
        assert_eq!(
            standard_convention(names::PARENT_REPOSITIONED),
            Some(Convention::Reposition)
        );
        assert_eq!(standard_convention(names::CLOSE), Some(Convention::Plain));
        assert_eq!(standard_convention(MsgName::from_static("zzz")), None);
    }
}
