//! The document contract.
//!
//! A document is a pane whose handler answers the `doc:*` vocabulary.
//! The string keys are the normative interop surface; behind them sits a
//! typed seam, [`DocBackend`], so a concrete document implements a small
//! trait instead of re-decoding contexts. The generic pane handler here
//! owns everything documents share — the mark set, the view table, the
//! attribute set, name and flags — and keeps marks consistent across
//! every edit before `replace` returns.
//!
//! Commands decoded (see each arm for its context conventions):
//! `doc:step`, `doc:char`, `doc:set-ref`, `doc:replace` / `Replace`,
//! `doc:save`, `doc:content`, `doc:add-view`, `doc:del-view`,
//! `doc:attach-view`, `doc:destroy`, `doc:same-file`, `doc:modified`,
//! `doc:get-attr`, `doc:set-attr`, `doc:request:<name>`,
//! `doc:notify:<name>`, and the mark allocation primitives
//! `doc:mark-new`, `doc:mark-dup`, `doc:mark-free`.
//!
//! Results that carry a character use the `code point + 1` encoding so
//! zero stays reserved; an edge-of-document answer is `Efalse`.

use core_attr::AttrSet;
use core_comm::{keys, CmdErr, CmdRet};
use core_mark::{Dir, MarkId, MarkSet};
use core_pane::{command, handler_from, Editor, EventContext, PaneId};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};

/// Published after every applied edit.
pub const NOTIFY_REPLACE: &str = "doc:notify:Replace";
/// Published when a view is torn down (`num` = view index).
pub const NOTIFY_VIEW_CLOSED: &str = "doc:notify:ViewClosed";

/// What a concrete document implements. Refs are opaque `u64` positions
/// ordered by value; the text document uses char offsets.
pub trait DocBackend: 'static {
    /// The ref one past the last position (also the document length).
    fn end_ref(&self) -> u64;
    /// Cross one position: the code point stepped over and the new ref,
    /// or `None` at the document edge.
    fn step(&self, at: u64, forward: bool) -> Option<(char, u64)>;
    /// Replace `[start, end)` with `text`; returns the length of the
    /// insertion in positions.
    fn replace(&mut self, start: u64, end: u64, text: &str) -> u64;
    /// Persist to `path` or the document's own backing file.
    fn save(&mut self, path: Option<&Path>) -> anyhow::Result<()>;
    fn modified(&self) -> bool;
    /// Does `name` refer to the same backing file?
    fn same_file(&self, name: &str) -> bool {
        let _ = name;
        false
    }
    /// Content attribute at a position (renderer hints etc.).
    fn attr_at(&self, at: u64, name: &str) -> Option<String> {
        let _ = (at, name);
        None
    }
    /// Stream content from `at` to the end.
    fn content(&self, at: u64) -> Box<dyn Iterator<Item = char> + '_>;
}

/// State every document pane carries.
pub struct DocState {
    pub marks: MarkSet,
    pub attrs: AttrSet,
    pub name: String,
    pub readonly: bool,
    pub autoclose: bool,
}

/// A backend plus the shared document state: the pane's private data.
pub struct DocData<B> {
    pub state: DocState,
    pub backend: B,
}

/// Register a document pane under `parent`.
pub fn attach<B: DocBackend>(
    ed: &mut Editor,
    parent: PaneId,
    name: &str,
    backend: B,
) -> Option<PaneId> {
    let doc_cmd = command(doc_cmd::<B>);
    let handler = handler_from(vec![
        (keys::DOC_PREFIX, doc_cmd.clone()),
        (keys::REPLACE, doc_cmd),
    ]);
    let data = DocData {
        state: DocState {
            marks: MarkSet::new(),
            attrs: AttrSet::new(),
            name: name.to_string(),
            readonly: false,
            autoclose: false,
        },
        backend,
    };
    let pane = ed.tree.register(parent, 0, Some(handler), Some(Box::new(data)))?;
    debug!(target: "doc", name, "doc_attached");
    Some(pane)
}

/// Run `f` against a document pane's data. The data is absent while one
/// of the document's own handlers holds it.
pub fn with_doc<B: DocBackend, R>(
    ed: &mut Editor,
    doc: PaneId,
    f: impl FnOnce(&mut Editor, &mut DocData<B>) -> R,
) -> Option<R> {
    let mut data = ed.take_data::<DocData<B>>(doc)?;
    let out = f(ed, &mut data);
    ed.put_data(doc, data);
    Some(out)
}

fn doc_cmd<B: DocBackend>(ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
    let home = ctx.home;
    let Some(mut data) = ed.take_data::<DocData<B>>(home) else {
        return CmdRet::Err(CmdErr::Fail);
    };
    let ret = run::<B>(ed, ctx, &mut data);
    ed.put_data(home, data);
    ret
}

fn char_ret(c: Option<char>) -> CmdRet {
    match c {
        Some(c) => CmdRet::Val(c as i32 + 1),
        None => CmdRet::Err(CmdErr::False),
    }
}

/// Decode a `char_ret` result.
pub fn ret_char(ret: CmdRet) -> Option<char> {
    match ret {
        CmdRet::Val(v) if v >= 1 => char::from_u32((v - 1) as u32),
        _ => None,
    }
}

fn run<B: DocBackend>(ed: &mut Editor, ctx: &mut EventContext, data: &mut DocData<B>) -> CmdRet {
    let home = ctx.home;
    let marks = &mut data.state.marks;
    match ctx.key.as_str() {
        "doc:step" | "doc:char" => {
            let Some(mark) = ctx.mark else { return CmdRet::Err(CmdErr::NoArg) };
            let Some(at) = marks.ref_of(mark) else { return CmdRet::Err(CmdErr::Inval) };
            let forward = ctx.num != 0;
            let stepped = data.backend.step(at, forward);
            if ctx.key == "doc:step" && ctx.num2 != 0 {
                if let Some((_, to)) = stepped {
                    marks.move_ref(mark, to, if forward { Dir::Fwd } else { Dir::Bwd });
                }
            }
            char_ret(stepped.map(|(c, _)| c))
        }
        "doc:set-ref" => {
            let Some(mark) = ctx.mark else { return CmdRet::Err(CmdErr::NoArg) };
            if !marks.is_live(mark) {
                return CmdRet::Err(CmdErr::Inval);
            }
            let start = ctx.num == 1;
            let ref_ = if start { 0 } else { data.backend.end_ref() };
            marks.to_end(mark, ref_, !start);
            CmdRet::success()
        }
        "doc:replace" | keys::REPLACE => {
            if data.state.readonly {
                return CmdRet::Err(CmdErr::Fail);
            }
            let (Some(m1), Some(m2)) = (ctx.mark, ctx.mark2) else {
                return CmdRet::Err(CmdErr::NoArg);
            };
            let (Some(r1), Some(r2)) = (marks.ref_of(m1), marks.ref_of(m2)) else {
                return CmdRet::Err(CmdErr::Inval);
            };
            let text = ctx.str_.as_deref().unwrap_or("");
            let (lo, hi) = (r1.min(r2), r1.max(r2));
            let hi_mark = if r1 <= r2 { m2 } else { m1 };
            let inserted = data.backend.replace(lo, hi, text);
            // Mark maintenance completes before replace returns: collapse
            // the deleted range, then split the equal-ref run so the end
            // mark (and everything sequenced after it) tracks the end of
            // the insertion.
            marks.note_delete(lo, hi);
            marks.note_insert(lo, inserted, Some(hi_mark));
            ed.tree.damage(home, core_pane::Damage::CONTENT);
            let mut note = EventContext::new(NOTIFY_REPLACE, home);
            note.mark = Some(m1);
            note.mark2 = Some(m2);
            ed.notify(home, &mut note);
            CmdRet::success()
        }
        "doc:save" => {
            let path = ctx.str_.clone().map(std::path::PathBuf::from);
            match data.backend.save(path.as_deref()) {
                Ok(()) => CmdRet::success(),
                Err(e) => {
                    warn!(target: "doc", name = %data.state.name, error = %e, "save_failed");
                    ed.message(ctx.focus, &format!("save failed: {e}"));
                    CmdRet::Err(CmdErr::Fail)
                }
            }
        }
        "doc:content" => {
            let Some(comm2) = ctx.comm2.clone() else { return CmdRet::Err(CmdErr::NoArg) };
            let from = ctx
                .mark
                .and_then(|m| marks.ref_of(m))
                .unwrap_or(0);
            let mut count = 0usize;
            for c in data.backend.content(from) {
                let mut step = EventContext::new("callback:content", ctx.focus).with_num(c as i32);
                if !ed.comm_call(&comm2, &mut step).is_success() {
                    break;
                }
                count += 1;
            }
            CmdRet::from_len(count)
        }
        "doc:add-view" => {
            let v = marks.add_view(ctx.focus.as_token());
            CmdRet::from_len(v)
        }
        "doc:del-view" => {
            let v = ctx.num as usize;
            match marks.del_view(v, ctx.focus.as_token()) {
                Ok(_) => {
                    let mut note = EventContext::new(NOTIFY_VIEW_CLOSED, home).with_num(ctx.num);
                    ed.notify(home, &mut note);
                    CmdRet::success()
                }
                Err(_) => CmdRet::Err(CmdErr::Inval),
            }
        }
        "doc:attach-view" => {
            let v = marks.add_view(ctx.focus.as_token());
            ed.add_notify(ctx.focus, home, NOTIFY_REPLACE);
            CmdRet::from_len(v)
        }
        "doc:destroy" => {
            if marks.any_view_live() {
                return CmdRet::Err(CmdErr::False);
            }
            ed.pane_close(home);
            CmdRet::success()
        }
        "doc:same-file" => match ctx.str_.as_deref() {
            Some(name) => CmdRet::from_bool(data.backend.same_file(name)),
            None => CmdRet::Err(CmdErr::NoArg),
        },
        "doc:modified" => CmdRet::from_bool(data.backend.modified()),
        "doc:set-attr" => {
            let (Some(name), Some(value)) = (ctx.str_.clone(), ctx.str2.clone()) else {
                return CmdRet::Err(CmdErr::NoArg);
            };
            data.state.attrs.set(name, value);
            CmdRet::success()
        }
        "doc:get-attr" => {
            let Some(name) = ctx.str_.clone() else { return CmdRet::Err(CmdErr::NoArg) };
            let Some(comm2) = ctx.comm2.clone() else { return CmdRet::Err(CmdErr::NoArg) };
            let value = ctx
                .mark
                .and_then(|m| marks.attrs(m).and_then(|a| a.get(&name)).map(str::to_owned))
                .or_else(|| {
                    ctx.mark
                        .and_then(|m| marks.ref_of(m))
                        .and_then(|at| data.backend.attr_at(at, &name))
                })
                .or_else(|| data.state.attrs.get(&name).map(str::to_owned));
            match value {
                Some(value) => {
                    let mut reply = EventContext::new("callback:attr", ctx.focus).with_str(value);
                    ed.comm_call(&comm2, &mut reply);
                    CmdRet::success()
                }
                None => CmdRet::Err(CmdErr::False),
            }
        }
        "doc:mark-new" => {
            let Some(comm2) = ctx.comm2.clone() else { return CmdRet::Err(CmdErr::NoArg) };
            let mark = match ctx.num {
                -2 => Some(marks.add_ungrouped_at(0)),
                -1 => Some(marks.add_point_at(0)),
                v if v >= 0 => marks.add_mark_at(0, v as usize).ok(),
                _ => None,
            };
            let Some(mark) = mark else { return CmdRet::Err(CmdErr::Inval) };
            let mut reply = EventContext::new("callback:mark", ctx.focus).with_mark(mark);
            ed.comm_call(&comm2, &mut reply);
            CmdRet::success()
        }
        "doc:mark-dup" => {
            let (Some(m), Some(comm2)) = (ctx.mark, ctx.comm2.clone()) else {
                return CmdRet::Err(CmdErr::NoArg);
            };
            let Some(dup) = marks.dup(m) else { return CmdRet::Err(CmdErr::Inval) };
            let mut reply = EventContext::new("callback:mark", ctx.focus).with_mark(dup);
            ed.comm_call(&comm2, &mut reply);
            CmdRet::success()
        }
        "doc:mark-free" => match ctx.mark {
            Some(m) => CmdRet::from_bool(marks.free(m)),
            None => CmdRet::Err(CmdErr::NoArg),
        },
        key if key.starts_with(keys::DOC_REQUEST_PREFIX) => {
            let name = &key[keys::DOC_REQUEST_PREFIX.len()..];
            if name.is_empty() {
                return CmdRet::Err(CmdErr::Inval);
            }
            let topic = format!("{}{}", keys::DOC_NOTIFY_PREFIX, name);
            CmdRet::from_bool(ed.add_notify(ctx.focus, home, &topic))
        }
        key if key.starts_with(keys::DOC_NOTIFY_PREFIX) => {
            let mut note = ctx.clone();
            ed.notify(home, &mut note)
        }
        _ => CmdRet::Fallthrough,
    }
}

// -------------------------------------------------------------------------
// Typed client helpers (each one dispatches the string command)
// -------------------------------------------------------------------------

/// Mark grouping for [`mark_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkGroup {
    Ungrouped,
    Point,
    View(usize),
}

impl MarkGroup {
    fn as_num(self) -> i32 {
        match self {
            Self::Ungrouped => -2,
            Self::Point => -1,
            Self::View(v) => v as i32,
        }
    }
}

fn capture_mark() -> (Rc<RefCell<Option<MarkId>>>, core_pane::CommandRef) {
    let slot = Rc::new(RefCell::new(None));
    let sink = slot.clone();
    let cb = command(move |_ed: &mut Editor, ctx: &mut EventContext| {
        *sink.borrow_mut() = ctx.mark;
        CmdRet::success()
    });
    (slot, cb)
}

/// Allocate a mark at the start of the document.
pub fn mark_new(ed: &mut Editor, doc: PaneId, group: MarkGroup) -> Option<MarkId> {
    let (slot, cb) = capture_mark();
    let mut ctx = EventContext::new("doc:mark-new", doc)
        .with_num(group.as_num())
        .with_comm2(cb);
    ed.call(&mut ctx);
    slot.take()
}

/// Duplicate a mark (ungrouped, placed just after the original).
pub fn mark_dup(ed: &mut Editor, doc: PaneId, mark: MarkId) -> Option<MarkId> {
    let (slot, cb) = capture_mark();
    let mut ctx = EventContext::new("doc:mark-dup", doc).with_mark(mark).with_comm2(cb);
    ed.call(&mut ctx);
    slot.take()
}

pub fn mark_free(ed: &mut Editor, doc: PaneId, mark: MarkId) -> bool {
    let mut ctx = EventContext::new("doc:mark-free", doc).with_mark(mark);
    ed.call(&mut ctx).is_success()
}

/// Step a mark over one position; returns the code point crossed.
pub fn step(ed: &mut Editor, doc: PaneId, mark: MarkId, forward: bool, do_move: bool) -> Option<char> {
    let mut ctx = EventContext::new("doc:step", doc)
        .with_mark(mark)
        .with_num(forward as i32)
        .with_num2(do_move as i32);
    ret_char(ed.call(&mut ctx))
}

/// Peek at the character beside a mark without moving it.
pub fn char_at(ed: &mut Editor, doc: PaneId, mark: MarkId, forward: bool) -> Option<char> {
    let mut ctx = EventContext::new("doc:char", doc)
        .with_mark(mark)
        .with_num(forward as i32);
    ret_char(ed.call(&mut ctx))
}

/// Send a mark to the first (`start = true`) or last position.
pub fn set_ref(ed: &mut Editor, doc: PaneId, mark: MarkId, start: bool) -> bool {
    let mut ctx = EventContext::new("doc:set-ref", doc)
        .with_mark(mark)
        .with_num(start as i32);
    ed.call(&mut ctx).is_success()
}

/// Replace the range between two marks.
pub fn replace(ed: &mut Editor, doc: PaneId, from: MarkId, to: MarkId, text: &str) -> CmdRet {
    let mut ctx = EventContext::new("doc:replace", doc)
        .with_mark(from)
        .with_mark2(to)
        .with_str(text);
    ed.call(&mut ctx)
}

/// Collect document content from a mark (or the start) as a string.
pub fn content(ed: &mut Editor, doc: PaneId, from: Option<MarkId>) -> String {
    let out = Rc::new(RefCell::new(String::new()));
    let sink = out.clone();
    let cb = command(move |_ed: &mut Editor, ctx: &mut EventContext| {
        match char::from_u32(ctx.num as u32) {
            Some(c) => {
                sink.borrow_mut().push(c);
                CmdRet::success()
            }
            None => CmdRet::Err(CmdErr::Inval),
        }
    });
    let mut ctx = EventContext::new("doc:content", doc).with_comm2(cb);
    ctx.mark = from;
    ed.call(&mut ctx);
    let collected = out.borrow().clone();
    collected
}

/// Allocate a view owned by `owner`.
pub fn add_view(ed: &mut Editor, doc: PaneId, owner: PaneId) -> Option<usize> {
    let mut ctx = EventContext::new("doc:add-view", owner);
    ed.call_at(doc, &mut ctx).as_len()
}

/// Tear down a view; only `owner` may.
pub fn del_view(ed: &mut Editor, doc: PaneId, owner: PaneId, view: usize) -> CmdRet {
    let mut ctx = EventContext::new("doc:del-view", owner).with_num(view as i32);
    ed.call_at(doc, &mut ctx)
}
