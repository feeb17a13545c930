//! The editor root: dispatch, lifecycle, refresh, registry.
//!
//! `Editor` owns the pane tree, the process-wide command registry, and the
//! deferred-free queue. The dispatch engine lives here:
//!
//! 1. starting from `ctx.focus`, the nearest pane (walking toward the
//!    root) whose keymap matches `ctx.key` becomes `home` and its entry
//!    runs;
//! 2. a fall-through result resumes the walk from `home`'s parent; any
//!    other result ends the dispatch;
//! 3. when no pane matches, the registry — conceptually a keymap chained
//!    behind the root — is consulted once.
//!
//! Dispatch is synchronous and re-entrant. Closing a pane from inside its
//! own handler is safe: the pane is only marked closed and queued; slots
//! are reclaimed when the outermost dispatch has unwound (or at the next
//! tick), so ids held by live iterations stay readable until then.

use core_comm::{keys, CmdRet};
use core_keymap::Keymap;
use std::any::Any;
use std::rc::Rc;
use tracing::{debug, trace};

use crate::comm::EventContext;
use crate::pane::{Command, CommandRef, Damage, Handler, PaneId, Tree};

/// The single-threaded editor core.
pub struct Editor {
    pub tree: Tree,
    /// Process-wide command registry; the fallback behind every pane.
    registry: Rc<Keymap<CommandRef>>,
    /// Panes closed but not yet reclaimed.
    to_free: Vec<PaneId>,
    dispatch_depth: u32,
    /// Monotonic notification-walk tokens (see `notify`).
    pub(crate) notify_token: u64,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            registry: Rc::new(Keymap::new()),
            to_free: Vec::new(),
            dispatch_depth: 0,
            notify_token: 0,
        }
    }

    /// The root pane.
    pub fn root(&self) -> PaneId {
        self.tree.root()
    }

    // ---------------------------------------------------------------------
    // Global registry
    // ---------------------------------------------------------------------

    /// `global-set-command`: register `cmd` under `key` for the whole
    /// process. Registration chains a fresh map in front of the shared
    /// registry, so handlers already holding the old map are unaffected.
    pub fn global_set_command(&mut self, key: &str, cmd: CommandRef) {
        let mut map = Keymap::new();
        if key.ends_with('-') || key.ends_with(':') {
            // Trailing separator registers a prefix family, matching the
            // `Move-` / `doc:` style namespaces.
            map.add_prefix(key, cmd);
        } else {
            map.add(key, cmd);
        }
        self.registry = Rc::new(map.with_chain(self.registry.clone()));
        debug!(target: "editor", key, "global_set_command");
    }

    /// `global-set-keymap`: chain an entire keymap into the registry.
    pub fn global_set_keymap(&mut self, map: Keymap<CommandRef>) {
        self.registry = Rc::new(map.with_chain(self.registry.clone()));
    }

    /// `global-set-attr`: editor-wide attributes live on the root pane.
    pub fn global_set_attr(&mut self, key: &str, value: &str) {
        let root = self.root();
        if let Some(attrs) = self.tree.attrs_mut(root) {
            attrs.set(key, value);
        }
    }

    pub fn global_attr(&self, key: &str) -> Option<&str> {
        self.tree.attrs(self.root())?.get(key)
    }

    /// Look up a registry entry without dispatching.
    pub fn registry_lookup(&self, key: &str) -> Option<CommandRef> {
        self.registry.lookup(key).cloned()
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Open a dispatch frame: while at least one frame is open, closed
    /// panes stay readable and are only swept when the last frame ends.
    pub(crate) fn begin_dispatch(&mut self) {
        self.dispatch_depth += 1;
    }

    /// Close a dispatch frame, sweeping deferred frees at the outermost.
    pub(crate) fn end_dispatch(&mut self) {
        self.dispatch_depth -= 1;
        if self.dispatch_depth == 0 {
            self.drain_free();
        }
    }

    /// Dispatch `ctx` from `ctx.focus` toward the root.
    pub fn call(&mut self, ctx: &mut EventContext) -> CmdRet {
        let start = ctx.focus;
        self.call_at(start, ctx)
    }

    /// Dispatch `ctx` starting the handler walk at `start` instead of at
    /// `ctx.focus`. `ctx.focus` keeps identifying the caller — the usual
    /// shape for addressing a pane (a document, a window) that is not an
    /// ancestor of the calling pane.
    pub fn call_at(&mut self, start: PaneId, ctx: &mut EventContext) -> CmdRet {
        self.begin_dispatch();
        let ret = self.dispatch(start, ctx);
        self.end_dispatch();
        ret
    }

    /// Coordinate dispatch: descend from `ctx.focus` to the leaf-most
    /// non-occluded pane at `(ctx.x, ctx.y)` (focus-local), then dispatch
    /// from there with translated coordinates.
    pub fn call_xy(&mut self, ctx: &mut EventContext) -> CmdRet {
        self.tree.update_z();
        if let Some((mut leaf, mut lx, mut ly)) = self.tree.leaf_at(ctx.focus, ctx.x, ctx.y) {
            if let Some((ax, ay)) = self.tree.abs_xy(ctx.focus, ctx.x, ctx.y) {
                // Climb out of any leaf that a higher-z sibling occludes at
                // this point.
                while self.tree.masked(leaf, ax, ay) == Some(true) {
                    let Some(parent) = self.tree.parent(leaf) else { break };
                    let (px, py) = self
                        .tree
                        .geometry(leaf)
                        .map(|(x, y, _, _)| (x, y))
                        .unwrap_or((0, 0));
                    lx += px;
                    ly += py;
                    leaf = parent;
                }
            }
            ctx.focus = leaf;
            ctx.x = lx;
            ctx.y = ly;
        }
        self.call(ctx)
    }

    fn dispatch(&mut self, from: PaneId, ctx: &mut EventContext) -> CmdRet {
        let mut start = Some(from);
        while let Some(from) = start {
            let Some((home, cmd)) = self.lookup_from(from, &ctx.key) else {
                break;
            };
            ctx.home = home;
            trace!(target: "dispatch", key = %ctx.key, home = home.index, "handler_enter");
            let ret = cmd.call(self, ctx);
            trace!(target: "dispatch", key = %ctx.key, home = home.index, ret = ret.to_code(), "handler_exit");
            if !ret.is_fallthrough() {
                return ret;
            }
            start = self.tree.parent(home);
        }
        // Registry fallback, conceptually chained behind the root.
        if let Some(cmd) = self.registry.lookup(&ctx.key).cloned() {
            ctx.home = self.root();
            let ret = cmd.call(self, ctx);
            if !ret.is_fallthrough() {
                return ret;
            }
        }
        CmdRet::Fallthrough
    }

    /// Nearest pane at or above `from` whose handler matches `key`.
    fn lookup_from(&self, from: PaneId, key: &str) -> Option<(PaneId, CommandRef)> {
        let mut p = Some(from);
        while let Some(pid) = p {
            if !self.tree.is_closed(pid) {
                if let Some(handler) = self.tree.handler(pid) {
                    if let Some(cmd) = handler.lookup(key) {
                        return Some((pid, cmd.clone()));
                    }
                }
            }
            p = self.tree.parent(pid);
        }
        None
    }

    /// Invoke a callback command (`comm`/`comm2`) with its own context.
    pub fn comm_call(&mut self, comm: &CommandRef, ctx: &mut EventContext) -> CmdRet {
        self.begin_dispatch();
        let ret = comm.call(self, ctx);
        self.end_dispatch();
        ret
    }

    /// Run `key` against one pane's own handler only (no ancestor walk).
    /// Used for lifecycle deliveries like `ChildClosed`.
    pub(crate) fn call_pane(&mut self, pane: PaneId, ctx: &mut EventContext) -> CmdRet {
        if self.tree.is_closed(pane) {
            return CmdRet::Fallthrough;
        }
        let Some(handler) = self.tree.handler(pane) else {
            return CmdRet::Fallthrough;
        };
        let Some(cmd) = handler.lookup(&ctx.key).cloned() else {
            return CmdRet::Fallthrough;
        };
        ctx.home = pane;
        self.begin_dispatch();
        let ret = cmd.call(self, ctx);
        self.end_dispatch();
        ret
    }

    /// Publish `Message` text up the focus chain; failures surface on the
    /// external message line.
    pub fn message(&mut self, focus: PaneId, text: &str) -> CmdRet {
        let mut ctx = EventContext::new(keys::MESSAGE, focus).with_str(text);
        self.call(&mut ctx)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Close a pane: descendants close post-order, subscribers hear
    /// `Notify:Close`, the parent hears `ChildClosed`, and storage is
    /// reclaimed by the deferred sweep.
    pub fn pane_close(&mut self, p: PaneId) -> bool {
        if self.tree.is_closed(p) {
            return false;
        }
        let parent = self.tree.parent(p);
        self.begin_dispatch();
        self.close_rec(p);
        // Detach from the (still live) parent and repair its focus.
        if let Some(parent) = parent {
            if let Some(pidx) = self.tree.resolve(parent) {
                let idx = self.tree.resolve(p).expect("closed pane not yet swept");
                self.tree.pane_mut(pidx).children.retain(|&c| c != idx);
                if self.tree.pane(pidx).focus == Some(idx) {
                    self.tree.pane_mut(pidx).focus = None;
                }
                self.tree.damage(parent, Damage::CHILD);
                let mut ctx = EventContext::new(keys::CHILD_CLOSED, p);
                self.call_pane(parent, &mut ctx);
            }
        }
        self.end_dispatch();
        true
    }

    fn close_rec(&mut self, p: PaneId) {
        for child in self.tree.children(p) {
            if !self.tree.is_closed(child) {
                self.close_rec(child);
            }
        }
        let Some(idx) = self.tree.resolve(p) else { return };
        self.tree.pane_mut(idx).damage |= Damage::CLOSED;
        debug!(target: "pane", pane = idx, "pane_close");
        // Tell subscribers before references go stale.
        let mut ctx = EventContext::new(keys::NOTIFY_CLOSE, p);
        self.notify(p, &mut ctx);
        // Withdraw our own subscriptions from their sources.
        let subs = std::mem::take(&mut self.tree.pane_mut(idx).notifiers);
        for (name, source) in subs {
            self.drop_notify_idx(source, idx, &name);
        }
        self.to_free.push(p);
    }

    fn drain_free(&mut self) {
        while let Some(p) = self.to_free.pop() {
            if let Some(idx) = self.tree.resolve(p) {
                self.tree.release(idx);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Refresh tick
    // ---------------------------------------------------------------------

    /// One cooperative tick: recompute z intervals, walk damage, call each
    /// damaged pane's `Refresh` handler exactly once, then reclaim closed
    /// panes.
    pub fn tick(&mut self) {
        self.tree.update_z();
        self.begin_dispatch();
        self.refresh_rec(self.root(), Damage::empty());
        self.end_dispatch();
    }

    fn refresh_rec(&mut self, p: PaneId, inherited: Damage) {
        let Some(idx) = self.tree.resolve(p) else { return };
        if self.tree.pane(idx).closed() {
            return;
        }
        self.tree.pane_mut(idx).damage |= inherited;
        let d = self.tree.pane(idx).damage;
        if d.is_empty() {
            return;
        }
        // Size and view changes flow to every child through the dedicated
        // child bits.
        let mut pass = Damage::empty();
        if d.intersects(Damage::SIZE | Damage::SIZE_CHILD) {
            pass |= Damage::SIZE_CHILD;
        }
        if d.intersects(Damage::VIEW | Damage::VIEW_CHILD) {
            pass |= Damage::VIEW_CHILD;
        }
        let postorder = d.contains(Damage::POSTORDER);
        // Postorder clears top-down so a handler may re-arm it for the
        // next tick; everything else clears bottom-up after the subtree.
        self.tree.pane_mut(idx).damage -= Damage::POSTORDER;
        if !postorder && d.needs_refresh() {
            let mut ctx = EventContext::new(keys::REFRESH, p).with_num(d.bits() as i32);
            self.call_pane(p, &mut ctx);
        }
        for child in self.tree.children(p) {
            self.refresh_rec(child, pass);
        }
        if postorder {
            let mut ctx = EventContext::new(keys::REFRESH, p).with_num(d.bits() as i32);
            self.call_pane(p, &mut ctx);
        }
        if let Some(idx) = self.tree.resolve(p) {
            let keep = self.tree.pane(idx).damage & Damage::CLOSED;
            self.tree.pane_mut(idx).damage = keep;
        }
    }

    // ---------------------------------------------------------------------
    // Pane data access
    // ---------------------------------------------------------------------

    /// Take a pane's private data for the duration of a handler body; see
    /// `Tree::take_data`. Always pair with [`Editor::put_data`].
    pub fn take_data<T: Any>(&mut self, p: PaneId) -> Option<Box<T>> {
        self.tree.take_data(p)
    }

    pub fn put_data<T: Any>(&mut self, p: PaneId, data: Box<T>) -> bool {
        self.tree.put_data(p, data)
    }
}

/// Convenience: build a [`Handler`] from `(key, command)` pairs; keys
/// ending in `-` or `:` register as prefixes.
pub fn handler_from(entries: Vec<(&str, CommandRef)>) -> Handler {
    let mut map = Keymap::new();
    for (key, cmd) in entries {
        if key.ends_with('-') || key.ends_with(':') || key.is_empty() {
            map.add_prefix(key, cmd);
        } else {
            map.add(key, cmd);
        }
    }
    Rc::new(map)
}

/// Wrap a closure as a [`CommandRef`].
pub fn command<F>(f: F) -> CommandRef
where
    F: Fn(&mut Editor, &mut EventContext) -> CmdRet + 'static,
{
    Rc::new(f)
}
