//! Document behavior end to end: marks across edits, the command
//! surface, notifications, and streaming content into the regex engine.

use core_comm::{CmdErr, CmdRet};
use core_doc::{self as doc, FlagScanner, MarkGroup, TextDoc};
use core_mark::MarkId;
use core_pane::{command, handler_from, Editor, EventContext, PaneId};
use rexel::{ParallelMatcher, Rexel};
use std::cell::RefCell;
use std::rc::Rc;

fn setup(content: &str) -> (Editor, PaneId) {
    let mut ed = Editor::new();
    let root = ed.root();
    ed.tree.resize(root, 0, 0, 80, 25);
    let pane = doc::attach(&mut ed, root, "scratch", TextDoc::new(content)).unwrap();
    (ed, pane)
}

fn precedes(ed: &mut Editor, d: PaneId, a: MarkId, b: MarkId) -> bool {
    doc::with_doc::<TextDoc, _>(ed, d, |_ed, data| data.state.marks.precedes(a, b))
        .flatten()
        .unwrap_or(false)
}

fn ref_of(ed: &mut Editor, d: PaneId, m: MarkId) -> Option<u64> {
    doc::with_doc::<TextDoc, _>(ed, d, |_ed, data| data.state.marks.ref_of(m)).flatten()
}

#[test]
fn insert_at_mark_splits_equal_ref_run() {
    // Three marks at position 0 of an empty document; insert at the
    // middle one. The earlier mark keeps the region start, the insert
    // mark and the later mark track the end of the inserted text.
    let (mut ed, d) = setup("");
    let a = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    let b = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    let c = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    assert_eq!(doc::replace(&mut ed, d, b, b, "xyz"), CmdRet::Val(1));
    assert!(precedes(&mut ed, d, a, b));
    assert!(precedes(&mut ed, d, b, c));
    assert_eq!(ref_of(&mut ed, d, a), Some(0));
    assert_eq!(ref_of(&mut ed, d, b), Some(3));
    assert_eq!(ref_of(&mut ed, d, c), Some(3));
    assert_eq!(doc::content(&mut ed, d, None), "xyz");
}

#[test]
fn edit_that_would_reorder_marks_resequences() {
    let (mut ed, d) = setup("abcdef");
    let a = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    let b = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    // Walk b to position 4, a to position 2.
    for _ in 0..4 {
        doc::step(&mut ed, d, b, true, true);
    }
    for _ in 0..2 {
        doc::step(&mut ed, d, a, true, true);
    }
    assert!(precedes(&mut ed, d, a, b));
    // Delete the range [1, 5): both marks collapse onto position 1 and
    // the ordering law still holds.
    let lo = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    let hi = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    doc::step(&mut ed, d, lo, true, true);
    for _ in 0..5 {
        doc::step(&mut ed, d, hi, true, true);
    }
    doc::replace(&mut ed, d, lo, hi, "");
    assert_eq!(ref_of(&mut ed, d, a), Some(1));
    assert_eq!(ref_of(&mut ed, d, b), Some(1));
    assert!(precedes(&mut ed, d, a, b));
    assert_eq!(doc::content(&mut ed, d, None), "af");
}

#[test]
fn step_and_char_walk_content() {
    let (mut ed, d) = setup("héllo");
    let m = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    assert_eq!(doc::char_at(&mut ed, d, m, true), Some('h'));
    assert_eq!(doc::step(&mut ed, d, m, true, true), Some('h'));
    assert_eq!(doc::step(&mut ed, d, m, true, true), Some('é'));
    assert_eq!(doc::char_at(&mut ed, d, m, false), Some('é'));
    // Peeking never moved the mark.
    assert_eq!(ref_of(&mut ed, d, m), Some(2));
    doc::set_ref(&mut ed, d, m, false);
    assert_eq!(ref_of(&mut ed, d, m), Some(5));
    assert_eq!(doc::step(&mut ed, d, m, true, true), None);
    assert_eq!(doc::step(&mut ed, d, m, false, true), Some('o'));
    assert_eq!(ref_of(&mut ed, d, m), Some(4));
}

#[test]
fn views_and_points_over_a_document() {
    let (mut ed, d) = setup("one two three");
    let root = ed.root();
    let owner = ed.tree.register(root, 0, None, None).unwrap();
    let v = doc::add_view(&mut ed, d, owner).unwrap();
    let point = doc::mark_new(&mut ed, d, MarkGroup::Point).unwrap();
    let vm = doc::with_doc::<TextDoc, _>(&mut ed, d, |_ed, data| {
        data.state.marks.add_mark_at(4, v).unwrap()
    })
    .unwrap();
    // Walk the point past the view mark; the per-view thread finds it.
    for _ in 0..8 {
        doc::step(&mut ed, d, point, true, true);
    }
    let found = doc::with_doc::<TextDoc, _>(&mut ed, d, |_ed, data| {
        data.state.marks.vmark_at_or_before(v, point)
    })
    .flatten();
    assert_eq!(found, Some(vm));
    // Only the owner may tear the view down; doing so frees its marks.
    let stranger = ed.tree.register(root, 0, None, None).unwrap();
    assert_eq!(doc::del_view(&mut ed, d, stranger, v), CmdRet::Err(CmdErr::Inval));
    assert_eq!(doc::del_view(&mut ed, d, owner, v), CmdRet::Val(1));
    let vm_alive = doc::with_doc::<TextDoc, _>(&mut ed, d, |_ed, data| {
        data.state.marks.is_live(vm)
    })
    .unwrap();
    assert!(!vm_alive);
}

#[test]
fn replace_publishes_notification() {
    let (mut ed, d) = setup("watchable");
    let root = ed.root();
    let heard = Rc::new(RefCell::new(0));
    let n = heard.clone();
    let watcher = handler_from(vec![(
        doc::NOTIFY_REPLACE,
        command(move |_ed: &mut Editor, _ctx: &mut EventContext| {
            *n.borrow_mut() += 1;
            CmdRet::Fallthrough
        }),
    )]);
    let listener = ed.tree.register(root, 0, Some(watcher), None).unwrap();
    // Subscribe through the normative request command.
    let mut ctx = EventContext::new("doc:request:Replace", listener);
    assert_eq!(ed.call_at(d, &mut ctx), CmdRet::Val(1));
    let m = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    doc::replace(&mut ed, d, m, m, "x");
    doc::replace(&mut ed, d, m, m, "y");
    assert_eq!(*heard.borrow(), 2);
}

#[test]
fn doc_attrs_and_flags() {
    let (mut ed, d) = setup("text");
    let mut ctx = EventContext::new("doc:set-attr", d)
        .with_str("render:default")
        .with_str2("lines");
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
    let got = Rc::new(RefCell::new(None));
    let sink = got.clone();
    let cb = command(move |_ed: &mut Editor, ctx: &mut EventContext| {
        *sink.borrow_mut() = ctx.str_.clone();
        CmdRet::success()
    });
    let mut ctx = EventContext::new("doc:get-attr", d)
        .with_str("render:default")
        .with_comm2(cb);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
    assert_eq!(got.borrow().as_deref(), Some("lines"));

    let mut ctx = EventContext::new("doc:modified", d);
    assert_eq!(ed.call(&mut ctx), CmdRet::Err(CmdErr::False));
    let m = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    doc::replace(&mut ed, d, m, m, "!");
    let mut ctx = EventContext::new("doc:modified", d);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
}

#[test]
fn readonly_document_refuses_edits() {
    let (mut ed, d) = setup("locked");
    doc::with_doc::<TextDoc, _>(&mut ed, d, |_ed, data| data.state.readonly = true);
    let m = doc::mark_new(&mut ed, d, MarkGroup::Ungrouped).unwrap();
    assert_eq!(doc::replace(&mut ed, d, m, m, "nope"), CmdRet::Err(CmdErr::Fail));
    assert_eq!(doc::content(&mut ed, d, None), "locked");
}

#[test]
fn destroy_refused_while_viewed() {
    let (mut ed, d) = setup("");
    let root = ed.root();
    let owner = ed.tree.register(root, 0, None, None).unwrap();
    let v = doc::add_view(&mut ed, d, owner).unwrap();
    let mut ctx = EventContext::new("doc:destroy", d);
    assert_eq!(ed.call(&mut ctx), CmdRet::Err(CmdErr::False));
    doc::del_view(&mut ed, d, owner, v);
    let mut ctx = EventContext::new("doc:destroy", d);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
    assert!(!ed.tree.is_live(d));
}

#[test]
fn streamed_search_over_document_content() {
    // The search path: pull content through doc:content, compute
    // boundary flags, and feed the parallel matcher one step at a time.
    let (mut ed, d) = setup("lines of text\nwith a needle-42 here\nand more\n");
    let text = doc::content(&mut ed, d, None);
    let scanner = FlagScanner::new(&text);
    let chars: Vec<char> = text.chars().collect();
    let rx = Rexel::compile(r"\<needle-[0-9]+\>").unwrap();
    let mut m = ParallelMatcher::new(&rx, false).unwrap();
    let mut result = None;
    for (i, &c) in chars.iter().enumerate() {
        let r = m.step(Some(c), scanner.flags_at(i, None));
        if r.dead {
            result = r.found;
            break;
        }
    }
    let result = result.or_else(|| m.step(None, scanner.flags_at(chars.len(), None)).found);
    let hit = result.expect("needle found");
    let matched: String = chars[hit.start as usize..(hit.start + u64::from(hit.len)) as usize]
        .iter()
        .collect();
    assert_eq!(matched, "needle-42");
}
