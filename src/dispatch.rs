//! Dispatch: from queued message to handler chain to class default.
//!
//! One thread owns dispatch. A message is resolved against its target's
//! class chain, run through the window's handler chain newest-first, and
//! finished with the recognizing class's default action unless a handler
//! said [`Retcode::Stop`]. [`Retcode::Exit`] is sticky: it unwinds every
//! nested loop.
//!
//! `run` is reentrant by design. A handler opening a dialog calls `run` on
//! it; the nested loop drains the dialog's queue while the outer loop sits
//! in that handler's stack frame. That call stack is the modal stack.

use std::time::Duration;

use crate::class::HandlerFn;
use crate::message::{names, Message, Payload, Retcode};
use crate::runtime::Runtime;
use crate::tree::WindowId;
use crate::types::WindowFlags;

/// Idle sleep while a loop's queue is empty.
const IDLE_WAIT: Duration = Duration::from_millis(5);

// =============================================================================
// Single-message dispatch
// =============================================================================

/// Run one message through its target's chain and class default.
pub(crate) fn dispatch_message(rt: &mut Runtime, msg: &Message) -> Retcode {
    let Some(class) = rt.tree().class_of(msg.target) else {
        // The target died between enqueue and dispatch.
        log::trace!("dropping {} for stale window {:?}", msg.name, msg.target);
        return Retcode::Ok;
    };
    let Some((owner, _convention)) = rt.classes().resolve(class, msg.name) else {
        log::trace!("no class recognizes {} for {:?}", msg.name, msg.target);
        return Retcode::Ok;
    };

    let chain = rt
        .tree()
        .chain(msg.target, msg.name)
        .map(|c| c.snapshot())
        .unwrap_or_default();

    let mut stopped = false;
    for handler in &chain {
        match invoke(rt, handler, msg) {
            Retcode::Ok => {}
            Retcode::Stop => stopped = true,
            Retcode::Exit => return Retcode::Exit,
        }
    }
    if stopped {
        return Retcode::Stop;
    }

    let Some(class) = rt.classes().get(owner).cloned() else {
        return Retcode::Ok;
    };
    class.default_action(rt, msg.target, msg)
}

/// Unpack the payload into the handler's shape.
///
/// Registration already matched shapes against the class convention, so a
/// miss here means a payload that does not belong to its message name.
fn invoke(rt: &mut Runtime, handler: &HandlerFn, msg: &Message) -> Retcode {
    match (handler, &msg.payload) {
        (HandlerFn::Raw(f), _) => f(rt, msg.target, msg),
        (HandlerFn::Plain(f), _) => f(rt, msg.target),
        (HandlerFn::Key(f), Payload::Key(k)) => f(rt, msg.target, *k),
        (HandlerFn::Mouse(f), Payload::Mouse(m)) => f(rt, msg.target, *m),
        (HandlerFn::Reposition(f), Payload::Reposition { old, new }) => {
            f(rt, msg.target, *old, *new)
        }
        (h, p) => {
            log::warn!(
                "{} handler shaped {:?} cannot take payload {:?}",
                msg.name,
                h.convention(),
                p
            );
            Retcode::Ok
        }
    }
}

// =============================================================================
// Repaint
// =============================================================================

/// Synchronous full repaint: erase and display every visible window in
/// paint order, ship the buffer, and republish the input route.
///
/// This is what an `update-screen` send turns into; it never queues.
pub(crate) fn repaint(rt: &mut Runtime) {
    for id in rt.tree().paint_order() {
        let _ = dispatch_message(rt, &Message::new(id, names::ERASE_BACKGROUND, Payload::None));
        let _ = dispatch_message(rt, &Message::new(id, names::DISPLAY, Payload::None));
        rt.tree_mut().remove_flags(id, WindowFlags::NEEDS_REPAINT);
    }
    rt.flush_screen();
    rt.refresh_route();
}

// =============================================================================
// The dispatch loop
// =============================================================================

/// Drive `window`'s queue until the loop ends.
///
/// Ends on an unstopped `close` for the window, on `change-focus` when the
/// window sits inside a modal container (the container decides who runs
/// next), when the window is destroyed out from under the loop, or on
/// `Exit`, which keeps unwinding callers.
pub(crate) fn run_loop(rt: &mut Runtime, window: WindowId) -> Retcode {
    if !rt.tree().contains(window) {
        return Retcode::Ok;
    }
    if rt.is_active(window) {
        log::warn!("window {window:?} already has a running loop");
        return Retcode::Ok;
    }
    rt.push_active(window);
    let ret = drive(rt, window);
    rt.pop_active();
    ret
}

fn drive(rt: &mut Runtime, window: WindowId) -> Retcode {
    let Some(queue) = rt.tree().queue(window) else {
        return Retcode::Ok;
    };

    // A modal container opens by handing focus to its content; its class
    // picks the first item to run.
    if rt
        .tree()
        .flags(window)
        .is_some_and(|f| f.contains(WindowFlags::DIALOG))
        && !rt.tree().children(window).is_empty()
    {
        queue.push(Message::new(window, names::CHANGE_FOCUS, Payload::None));
    }
    rt.invalidate();

    loop {
        if rt.take_dirty() {
            repaint(rt);
        }

        let Some(first) = queue.pop() else {
            std::thread::sleep(IDLE_WAIT);
            continue;
        };

        // Drain the queue in one go; repaints wait for the batch to end.
        let mut msg = first;
        loop {
            let name = msg.name;
            let target = msg.target;
            match dispatch_message(rt, &msg) {
                Retcode::Exit => return Retcode::Exit,
                ret => {
                    if target == window && ret != Retcode::Stop {
                        if name == names::CLOSE {
                            return Retcode::Ok;
                        }
                        if name == names::CHANGE_FOCUS && rt.parent_is_dialog(window) {
                            return Retcode::Ok;
                        }
                    }
                }
            }
            if !rt.tree().contains(window) {
                log::debug!("loop window {window:?} destroyed; unwinding");
                return Retcode::Ok;
            }
            match queue.pop() {
                Some(next) => msg = next,
                None => break,
            }
        }
    }
}
