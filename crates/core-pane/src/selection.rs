//! Window pane: per-window attributes and the selection protocol.
//!
//! A window pane sits near the top of a display stack and answers the
//! `window:*` and `selection:*` families for everything beneath it.
//!
//! Selection contract:
//! * `selection:claim` — the focus pane becomes the owner. A previous
//!   owner is told through `Notify:selection:claimed` so it stops
//!   answering commits. With `num = 1` the claimant installs itself as
//!   the *fallback* owner (typically the document), restored whenever the
//!   current owner discards.
//! * `selection:commit` — the owner is asked, synchronously, to deliver
//!   the selection content to the committer's `comm2` callback before the
//!   commit returns. That synchronous delivery is a contract: callers are
//!   allowed to read what the callback captured as soon as the dispatch
//!   returns.
//! * `selection:discard` — succeeds only for the current owner; ownership
//!   reverts to the fallback.
//!
//! Ownership handles are generational pane ids, so a dead owner reads as
//! stale and silently falls back; no unsubscribe bookkeeping is needed.

use core_comm::{keys, CmdErr, CmdRet};
use tracing::debug;

use crate::comm::EventContext;
use crate::editor::{command, handler_from, Editor};
use crate::pane::PaneId;

/// Private state of a window pane.
struct WindowData {
    sel_owner: Option<PaneId>,
    sel_fallback: Option<PaneId>,
}

/// Create a window pane under `parent` answering `window:*` and
/// `selection:*`.
pub fn attach(ed: &mut Editor, parent: PaneId) -> Option<PaneId> {
    let handler = handler_from(vec![
        (keys::SELECTION_CLAIM, command(claim)),
        (keys::SELECTION_COMMIT, command(commit)),
        (keys::SELECTION_DISCARD, command(discard)),
        ("window:set-attr", command(set_attr)),
        ("window:get-attr", command(get_attr)),
        (keys::WINDOW_REQUEST_PREFIX, command(request)),
        (keys::WINDOW_NOTIFY_PREFIX, command(publish)),
    ]);
    let data = WindowData { sel_owner: None, sel_fallback: None };
    ed.tree.register(parent, 0, Some(handler), Some(Box::new(data)))
}

fn with_data<R>(
    ed: &mut Editor,
    pane: PaneId,
    f: impl FnOnce(&mut Editor, &mut WindowData) -> R,
) -> Option<R> {
    let mut data = ed.take_data::<WindowData>(pane)?;
    let out = f(ed, &mut data);
    ed.put_data(pane, data);
    Some(out)
}

/// Resolve the effective owner, falling back past stale ids.
fn live_owner(ed: &Editor, data: &mut WindowData) -> Option<PaneId> {
    if let Some(o) = data.sel_owner {
        if ed.tree.is_live(o) && !ed.tree.is_closed(o) {
            return Some(o);
        }
        data.sel_owner = None;
    }
    if let Some(f) = data.sel_fallback {
        if ed.tree.is_live(f) && !ed.tree.is_closed(f) {
            data.sel_owner = Some(f);
            return Some(f);
        }
        data.sel_fallback = None;
    }
    None
}

fn claim(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let window = ctx.home;
    let claimant = ctx.focus;
    let fallback = ctx.num == 1;
    with_data(ed, window, |ed, data| {
        let prev = live_owner(ed, data);
        if fallback {
            data.sel_fallback = Some(claimant);
            if prev.is_none() {
                data.sel_owner = Some(claimant);
            }
            debug!(target: "selection", "fallback_installed");
            return CmdRet::success();
        }
        if let Some(prev) = prev {
            if prev != claimant {
                let mut note = EventContext::new(keys::SELECTION_CLAIMED, claimant);
                ed.call_pane(prev, &mut note);
            }
        }
        data.sel_owner = Some(claimant);
        debug!(target: "selection", "claimed");
        CmdRet::success()
    })
    .unwrap_or(CmdRet::Err(CmdErr::Fail))
}

fn commit(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let window = ctx.home;
    let committer = ctx.focus;
    let comm2 = ctx.comm2.clone();
    with_data(ed, window, |ed, data| {
        let Some(owner) = live_owner(ed, data) else {
            return CmdRet::Err(CmdErr::False);
        };
        // Synchronous delivery: the owner publishes through the
        // committer's callback before this dispatch returns.
        let mut ask = EventContext::new(keys::SELECTION_COMMIT_NOTIFY, committer);
        ask.comm2 = comm2;
        ed.call_pane(owner, &mut ask)
    })
    .unwrap_or(CmdRet::Err(CmdErr::Fail))
}

fn discard(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let window = ctx.home;
    let caller = ctx.focus;
    with_data(ed, window, |ed, data| {
        match live_owner(ed, data) {
            Some(owner) if owner == caller => {
                data.sel_owner = data.sel_fallback;
                debug!(target: "selection", "discarded");
                CmdRet::success()
            }
            _ => CmdRet::Err(CmdErr::False),
        }
    })
    .unwrap_or(CmdRet::Err(CmdErr::Fail))
}

fn set_attr(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let (Some(name), Some(value)) = (ctx.str_.clone(), ctx.str2.clone()) else {
        return CmdRet::Err(CmdErr::NoArg);
    };
    match ed.tree.attrs_mut(ctx.home) {
        Some(attrs) => {
            attrs.set(name, value);
            CmdRet::success()
        }
        None => CmdRet::Err(CmdErr::Fail),
    }
}

fn get_attr(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let Some(name) = ctx.str_.clone() else {
        return CmdRet::Err(CmdErr::NoArg);
    };
    let Some(comm2) = ctx.comm2.clone() else {
        return CmdRet::Err(CmdErr::NoArg);
    };
    let value = ed.tree.attrs(ctx.home).and_then(|a| a.get(&name)).map(str::to_owned);
    match value {
        Some(value) => {
            let mut reply = EventContext::new("callback:attr", ctx.focus).with_str(value);
            ed.comm_call(&comm2, &mut reply);
            CmdRet::success()
        }
        None => CmdRet::Err(CmdErr::False),
    }
}

/// `window:request:<name>` subscribes the focus pane to
/// `window:notify:<name>` published by this window.
fn request(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let Some(name) = ctx.key.strip_prefix(keys::WINDOW_REQUEST_PREFIX) else {
        return CmdRet::Err(CmdErr::Inval);
    };
    if name.is_empty() {
        return CmdRet::Err(CmdErr::Inval);
    }
    let topic = format!("{}{}", keys::WINDOW_NOTIFY_PREFIX, name);
    CmdRet::from_bool(ed.add_notify(ctx.focus, ctx.home, &topic))
}

/// `window:notify:<name>` publishes to the window's subscribers.
fn publish(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let window = ctx.home;
    let mut note = ctx.clone();
    ed.notify(window, &mut note)
}
