//! Dispatch behavior: ancestor ordering, fall-through, close safety,
//! callbacks, refresh.

use core_comm::{keys, CmdErr, CmdRet};
use core_pane::{command, handler_from, Damage, Editor, EventContext, PaneId};
use std::cell::RefCell;
use std::rc::Rc;

fn setup() -> (Editor, PaneId) {
    let mut ed = Editor::new();
    let root = ed.root();
    ed.tree.resize(root, 0, 0, 80, 25);
    (ed, root)
}

fn const_handler(key: &str, ret: CmdRet) -> core_pane::Handler {
    handler_from(vec![(key, command(move |_ed, _ctx| ret))])
}

#[test]
fn fall_through_reaches_upper_handler() {
    // root → a → b; a falls through, root answers 7.
    let (mut ed, root) = setup();
    ed.tree
        .set_handler(root, Some(const_handler("K", CmdRet::Val(7))));
    let a = ed
        .tree
        .register(root, 0, Some(const_handler("K", CmdRet::Fallthrough)), None)
        .unwrap();
    let b = ed.tree.register(a, 0, None, None).unwrap();
    let mut ctx = EventContext::new("K", b);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(7));
}

#[test]
fn nearest_handler_wins() {
    // Handlers at several depths return distinct values; dispatch must
    // pick the one closest to the focus, for every choice of focus.
    let (mut ed, root) = setup();
    ed.tree.set_handler(root, Some(const_handler("K", CmdRet::Val(1))));
    let mut chain = vec![root];
    for depth in 2..=5 {
        let parent = *chain.last().unwrap();
        let p = ed
            .tree
            .register(parent, 0, Some(const_handler("K", CmdRet::Val(depth))), None)
            .unwrap();
        chain.push(p);
    }
    for (i, &focus) in chain.iter().enumerate() {
        let mut ctx = EventContext::new("K", focus);
        assert_eq!(ed.call(&mut ctx), CmdRet::Val((i + 1) as i32), "focus depth {i}");
    }
}

#[test]
fn home_is_rewritten_per_handler() {
    let (mut ed, root) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    ed.tree.set_handler(
        root,
        Some(handler_from(vec![(
            "K",
            command(move |_ed: &mut Editor, ctx: &mut EventContext| {
                log.borrow_mut().push(ctx.home);
                CmdRet::Val(2)
            }),
        )])),
    );
    let log = seen.clone();
    let a = ed
        .tree
        .register(
            root,
            0,
            Some(handler_from(vec![(
                "K",
                command(move |_ed: &mut Editor, ctx: &mut EventContext| {
                    log.borrow_mut().push(ctx.home);
                    CmdRet::Fallthrough
                }),
            )])),
            None,
        )
        .unwrap();
    let mut ctx = EventContext::new("K", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(2));
    assert_eq!(*seen.borrow(), vec![a, root]);
}

#[test]
fn unhandled_key_falls_through_entirely() {
    let (mut ed, root) = setup();
    let a = ed.tree.register(root, 0, None, None).unwrap();
    let mut ctx = EventContext::new("nobody-home", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Fallthrough);
}

#[test]
fn error_result_terminates_dispatch() {
    let (mut ed, root) = setup();
    ed.tree.set_handler(root, Some(const_handler("K", CmdRet::Val(9))));
    let a = ed
        .tree
        .register(root, 0, Some(const_handler("K", CmdRet::Err(CmdErr::NoSup))), None)
        .unwrap();
    let mut ctx = EventContext::new("K", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Err(CmdErr::NoSup));
}

#[test]
fn registry_is_consulted_after_panes() {
    let (mut ed, root) = setup();
    ed.global_set_command("ping", command(|_ed, _ctx| CmdRet::Val(3)));
    let a = ed.tree.register(root, 0, None, None).unwrap();
    let mut ctx = EventContext::new("ping", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(3));
    // A pane handler shadows the registry.
    ed.tree.set_handler(a, Some(const_handler("ping", CmdRet::Val(8))));
    let mut ctx = EventContext::new("ping", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(8));
    // Prefix registration answers a whole family.
    ed.global_set_command("Move-", command(|_ed, _ctx| CmdRet::Val(4)));
    let mut ctx = EventContext::new("Move-Line", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(4));
}

#[test]
fn close_from_inside_own_handler_is_safe() {
    let (mut ed, root) = setup();
    let closer = handler_from(vec![(
        "die",
        command(|ed: &mut Editor, ctx: &mut EventContext| {
            let me = ctx.home;
            ed.pane_close(me);
            // The pane is closed but still readable until dispatch ends.
            assert!(ed.tree.is_closed(me));
            assert!(ed.tree.is_live(me));
            CmdRet::success()
        }),
    )]);
    let a = ed.tree.register(root, 0, Some(closer), None).unwrap();
    let b = ed.tree.register(a, 0, None, None).unwrap();
    let mut ctx = EventContext::new("die", a);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
    // After the outermost dispatch unwound, storage was reclaimed.
    assert!(!ed.tree.is_live(a));
    assert!(!ed.tree.is_live(b));
    assert!(ed.tree.children(root).is_empty());
}

#[test]
fn parent_hears_child_closed() {
    let (mut ed, root) = setup();
    let heard = Rc::new(RefCell::new(0));
    let n = heard.clone();
    let parent_handler = handler_from(vec![(
        keys::CHILD_CLOSED,
        command(move |_ed: &mut Editor, _ctx: &mut EventContext| {
            *n.borrow_mut() += 1;
            CmdRet::success()
        }),
    )]);
    let a = ed.tree.register(root, 0, Some(parent_handler), None).unwrap();
    let b = ed.tree.register(a, 0, None, None).unwrap();
    ed.pane_close(b);
    assert_eq!(*heard.borrow(), 1);
}

#[test]
fn close_recurses_and_notifies_subscribers() {
    let (mut ed, root) = setup();
    let heard = Rc::new(RefCell::new(0));
    let n = heard.clone();
    let watcher = handler_from(vec![(
        keys::NOTIFY_CLOSE,
        command(move |_ed: &mut Editor, _ctx: &mut EventContext| {
            *n.borrow_mut() += 1;
            CmdRet::success()
        }),
    )]);
    let observer = ed.tree.register(root, 0, Some(watcher), None).unwrap();
    let a = ed.tree.register(root, 0, None, None).unwrap();
    let b = ed.tree.register(a, 0, None, None).unwrap();
    ed.add_notify(observer, a, keys::NOTIFY_CLOSE);
    ed.add_notify(observer, b, keys::NOTIFY_CLOSE);
    ed.pane_close(a);
    // Both the pane and its child published their close.
    assert_eq!(*heard.borrow(), 2);
    assert!(!ed.tree.is_live(a));
    assert!(!ed.tree.is_live(b));
}

#[test]
fn comm2_callback_carries_data_back() {
    let (mut ed, root) = setup();
    // Handler answers a query by calling the supplied continuation with a
    // string instead of returning structured data.
    ed.tree.set_handler(
        root,
        Some(handler_from(vec![(
            "query:name",
            command(|ed: &mut Editor, ctx: &mut EventContext| {
                let Some(comm2) = ctx.comm2.clone() else {
                    return CmdRet::Err(CmdErr::NoArg);
                };
                let mut reply = EventContext::new("callback:name", ctx.focus).with_str("scratch");
                ed.comm_call(&comm2, &mut reply);
                CmdRet::success()
            }),
        )])),
    );
    let got = Rc::new(RefCell::new(None));
    let sink = got.clone();
    let cb = command(move |_ed: &mut Editor, ctx: &mut EventContext| {
        *sink.borrow_mut() = ctx.str_.clone();
        CmdRet::success()
    });
    let a = ed.tree.register(root, 0, None, None).unwrap();
    let mut ctx = EventContext::new("query:name", a).with_comm2(cb);
    assert_eq!(ed.call(&mut ctx), CmdRet::Val(1));
    assert_eq!(got.borrow().as_deref(), Some("scratch"));
}

#[test]
fn coordinate_dispatch_targets_leaf_under_point() {
    let (mut ed, root) = setup();
    let under = ed
        .tree
        .register(root, 0, Some(const_handler("M:Click-1", CmdRet::Val(1))), None)
        .unwrap();
    ed.tree.resize(under, 0, 0, 80, 25);
    let over = ed
        .tree
        .register(root, 3, Some(const_handler("M:Click-1", CmdRet::Val(2))), None)
        .unwrap();
    ed.tree.resize(over, 10, 5, 20, 10);
    let mut ctx = EventContext::new("M:Click-1", root).with_xy(12, 7);
    assert_eq!(ed.call_xy(&mut ctx), CmdRet::Val(2));
    assert_eq!(ctx.focus, over);
    assert_eq!((ctx.x, ctx.y), (2, 2));
    let mut ctx = EventContext::new("M:Click-1", root).with_xy(0, 0);
    assert_eq!(ed.call_xy(&mut ctx), CmdRet::Val(1));
    assert_eq!(ctx.focus, under);
}

#[test]
fn refresh_runs_once_per_damaged_pane() {
    let (mut ed, root) = setup();
    let count = Rc::new(RefCell::new(0));
    let n = count.clone();
    let refresher = handler_from(vec![(
        keys::REFRESH,
        command(move |_ed: &mut Editor, _ctx: &mut EventContext| {
            *n.borrow_mut() += 1;
            CmdRet::success()
        }),
    )]);
    let a = ed.tree.register(root, 0, Some(refresher), None).unwrap();
    ed.tree.damage(a, Damage::CONTENT);
    ed.tick();
    assert_eq!(*count.borrow(), 1);
    // No new damage: no further refresh.
    ed.tick();
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn size_damage_reaches_descendants() {
    let (mut ed, root) = setup();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let child_refresher = handler_from(vec![(
        keys::REFRESH,
        command(move |ed: &mut Editor, ctx: &mut EventContext| {
            let d = ed.tree.damage_bits(ctx.home).unwrap_or_default();
            log.borrow_mut().push(d.contains(Damage::SIZE_CHILD));
            CmdRet::success()
        }),
    )]);
    let a = ed.tree.register(root, 0, None, None).unwrap();
    let b = ed.tree.register(a, 0, Some(child_refresher), None).unwrap();
    // Consume the registration-time damage first.
    ed.tick();
    seen.borrow_mut().clear();
    ed.tree.resize(a, 0, 0, 40, 25);
    let _ = b;
    ed.tick();
    assert_eq!(*seen.borrow(), vec![true]);
}
