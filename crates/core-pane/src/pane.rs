//! Pane tree structure.
//!
//! Panes live in a slot arena with generations and a free list; a
//! [`PaneId`] held across mutations reads as `None` once the slot has been
//! reclaimed, which is what makes weak cross-tree references safe without
//! reference counting. Structural operations live here; anything that has
//! to run handlers (close notifications, dispatch, refresh) belongs to
//! `Editor`.
//!
//! Invariants:
//! * a non-root pane has exactly one parent and appears once in that
//!   parent's child list;
//! * the focus child, when set, is a current child;
//! * the cursor, when set, lies within the pane bounds;
//! * after `update_z`, a pane's absolute-z interval contains the absolute
//!   z of every descendant.

use bitflags::bitflags;
use core_attr::AttrSet;
use core_comm::CmdRet;
use core_keymap::Keymap;
use std::any::Any;
use std::rc::Rc;
use tracing::trace;

use crate::editor::Editor;
use crate::EventContext;

/// Handler code attached to a pane.
pub trait Command {
    fn call(&self, ed: &mut Editor, ctx: &mut EventContext) -> CmdRet;
}

impl<F> Command for F
where
    F: Fn(&mut Editor, &mut EventContext) -> CmdRet,
{
    fn call(&self, ed: &mut Editor, ctx: &mut EventContext) -> CmdRet {
        self(ed, ctx)
    }
}

/// Shared handle to a command.
pub type CommandRef = Rc<dyn Command>;

/// A pane's handler: a keymap resolving command keys to commands.
pub type Handler = Rc<Keymap<CommandRef>>;

bitflags! {
    /// Damage bits. `SIZE`/`VIEW` reach descendants through the dedicated
    /// `*_CHILD` bits during the refresh walk; everything else bubbles up
    /// through `CHILD`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Damage: u32 {
        const SIZE      = 1 << 0;
        const VIEW      = 1 << 1;
        const CONTENT   = 1 << 2;
        const CURSOR    = 1 << 3;
        /// Some descendant is damaged.
        const CHILD     = 1 << 4;
        /// Refresh this pane after its children rather than before.
        const POSTORDER = 1 << 5;
        /// The pane is closed and awaiting the deferred sweep.
        const CLOSED    = 1 << 6;
        /// An ancestor was resized.
        const SIZE_CHILD = 1 << 7;
        /// An ancestor's view changed.
        const VIEW_CHILD = 1 << 8;
    }
}

impl Damage {
    /// Bits that warrant a `Refresh` call on the owning pane.
    pub fn needs_refresh(self) -> bool {
        self.intersects(
            Self::SIZE
                | Self::VIEW
                | Self::CONTENT
                | Self::CURSOR
                | Self::SIZE_CHILD
                | Self::VIEW_CHILD,
        )
    }
}

/// Stable generational handle to a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaneId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl PaneId {
    /// Opaque token form, for subsystems (like mark views) that track an
    /// owner without depending on pane types.
    pub fn as_token(self) -> u64 {
        (u64::from(self.index) << 32) | u64::from(self.generation)
    }
}

/// A subscription the pane publishes to (`sink` asked to hear `name`).
#[derive(Debug, Clone)]
pub(crate) struct NotifyLink {
    pub(crate) name: String,
    pub(crate) sink: PaneId,
    /// Highest notification walk that delivered through this link.
    pub(crate) token: u64,
    pub(crate) dead: bool,
}

pub(crate) struct Pane {
    pub(crate) parent: Option<u32>,
    pub(crate) children: Vec<u32>,
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
    pub(crate) z: i32,
    pub(crate) abs_z_lo: i32,
    pub(crate) abs_z_hi: i32,
    pub(crate) cursor: Option<(i32, i32)>,
    pub(crate) damage: Damage,
    pub(crate) handler: Option<Handler>,
    pub(crate) data: Option<Box<dyn Any>>,
    pub(crate) attrs: AttrSet,
    pub(crate) focus: Option<u32>,
    /// Who we publish to.
    pub(crate) notifiees: Vec<NotifyLink>,
    /// Mirror of subscriptions we hold: (name, source index).
    pub(crate) notifiers: Vec<(String, u32)>,
    /// Notification walks currently iterating `notifiees`.
    pub(crate) walks: u32,
}

impl Pane {
    fn new(parent: Option<u32>, z: i32, handler: Option<Handler>, data: Option<Box<dyn Any>>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            z,
            abs_z_lo: 0,
            abs_z_hi: 0,
            cursor: None,
            damage: Damage::SIZE,
            handler,
            data,
            attrs: AttrSet::new(),
            focus: None,
            notifiees: Vec::new(),
            notifiers: Vec::new(),
            walks: 0,
        }
    }

    pub(crate) fn closed(&self) -> bool {
        self.damage.contains(Damage::CLOSED)
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// The pane arena plus structural operations.
pub struct Tree {
    panes: Vec<Option<Pane>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: u32,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let mut tree = Self {
            panes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: 0,
        };
        tree.root = tree.alloc(Pane::new(None, 0, None, None));
        tree
    }

    fn alloc(&mut self, pane: Pane) -> u32 {
        match self.free_list.pop() {
            Some(i) => {
                self.panes[i] = Some(pane);
                i as u32
            }
            None => {
                self.panes.push(Some(pane));
                self.generations.push(0);
                (self.panes.len() - 1) as u32
            }
        }
    }

    pub(crate) fn release(&mut self, idx: u32) {
        let i = idx as usize;
        self.panes[i] = None;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free_list.push(i);
    }

    pub(crate) fn pane(&self, idx: u32) -> &Pane {
        self.panes[idx as usize].as_ref().expect("live pane index")
    }

    pub(crate) fn pane_mut(&mut self, idx: u32) -> &mut Pane {
        self.panes[idx as usize].as_mut().expect("live pane index")
    }

    pub(crate) fn resolve(&self, id: PaneId) -> Option<u32> {
        let i = id.index as usize;
        if i < self.panes.len()
            && self.generations[i] == id.generation
            && self.panes[i].is_some()
        {
            Some(id.index)
        } else {
            None
        }
    }

    pub(crate) fn id_of(&self, idx: u32) -> PaneId {
        PaneId { index: idx, generation: self.generations[idx as usize] }
    }

    /// The root pane.
    pub fn root(&self) -> PaneId {
        self.id_of(self.root)
    }

    /// True while the id names a live (possibly closed, not yet swept)
    /// pane.
    pub fn is_live(&self, p: PaneId) -> bool {
        self.resolve(p).is_some()
    }

    /// True when the pane has been closed (swept or awaiting sweep).
    pub fn is_closed(&self, p: PaneId) -> bool {
        match self.resolve(p) {
            Some(idx) => self.pane(idx).closed(),
            None => true,
        }
    }

    /// Register a new pane under `parent` with the given z, handler and
    /// private data. The child starts with its parent's size and `SIZE`
    /// damage.
    pub fn register(
        &mut self,
        parent: PaneId,
        z: i32,
        handler: Option<Handler>,
        data: Option<Box<dyn Any>>,
    ) -> Option<PaneId> {
        let pidx = self.resolve(parent)?;
        if self.pane(pidx).closed() {
            return None;
        }
        let mut pane = Pane::new(Some(pidx), z, handler, data);
        pane.w = self.pane(pidx).w;
        pane.h = self.pane(pidx).h;
        let idx = self.alloc(pane);
        self.pane_mut(pidx).children.push(idx);
        self.damage_idx(pidx, Damage::CHILD);
        trace!(target: "pane", parent = pidx, pane = idx, z, "pane_register");
        Some(self.id_of(idx))
    }

    pub fn parent(&self, p: PaneId) -> Option<PaneId> {
        let idx = self.resolve(p)?;
        self.pane(idx).parent.map(|i| self.id_of(i))
    }

    /// Children in registration order.
    pub fn children(&self, p: PaneId) -> Vec<PaneId> {
        match self.resolve(p) {
            Some(idx) => self.pane(idx).children.iter().map(|&c| self.id_of(c)).collect(),
            None => Vec::new(),
        }
    }

    /// Children in render order: registration order, then z ascending
    /// (stable, so later registration wins a z tie).
    pub fn children_render_order(&self, p: PaneId) -> Vec<PaneId> {
        let Some(idx) = self.resolve(p) else { return Vec::new() };
        let mut kids: Vec<u32> = self.pane(idx).children.clone();
        kids.sort_by_key(|&c| self.pane(c).z);
        kids.iter().map(|&c| self.id_of(c)).collect()
    }

    /// Move `p` under `new_parent`, keeping geometry and z. Refused when it
    /// would create a cycle or touch a closed pane.
    pub fn reparent(&mut self, p: PaneId, new_parent: PaneId) -> bool {
        let (Some(idx), Some(np)) = (self.resolve(p), self.resolve(new_parent)) else {
            return false;
        };
        if idx == self.root || self.pane(idx).closed() || self.pane(np).closed() {
            return false;
        }
        // Walk up from the new parent; p must not be an ancestor.
        let mut a = Some(np);
        while let Some(i) = a {
            if i == idx {
                return false;
            }
            a = self.pane(i).parent;
        }
        let old = self.pane(idx).parent.expect("non-root has a parent");
        self.pane_mut(old).children.retain(|&c| c != idx);
        if self.pane(old).focus == Some(idx) {
            self.pane_mut(old).focus = None;
        }
        self.pane_mut(np).children.push(idx);
        self.pane_mut(idx).parent = Some(np);
        self.damage_idx(idx, Damage::SIZE);
        true
    }

    /// Set position and size; `SIZE` damage reaches descendants on the
    /// next refresh walk.
    pub fn resize(&mut self, p: PaneId, x: i32, y: i32, w: i32, h: i32) -> bool {
        let Some(idx) = self.resolve(p) else { return false };
        let pane = self.pane_mut(idx);
        pane.x = x;
        pane.y = y;
        pane.w = w.max(0);
        pane.h = h.max(0);
        if let Some((cx, cy)) = pane.cursor {
            pane.cursor = Some((cx.min(pane.w.saturating_sub(1)).max(0), cy.min(pane.h.saturating_sub(1)).max(0)));
        }
        self.damage_idx(idx, Damage::SIZE);
        true
    }

    pub fn geometry(&self, p: PaneId) -> Option<(i32, i32, i32, i32)> {
        let idx = self.resolve(p)?;
        let pane = self.pane(idx);
        Some((pane.x, pane.y, pane.w, pane.h))
    }

    pub fn z_of(&self, p: PaneId) -> Option<i32> {
        self.resolve(p).map(|i| self.pane(i).z)
    }

    /// Set the cursor, clamped into the pane bounds, or clear it.
    pub fn set_cursor(&mut self, p: PaneId, cursor: Option<(i32, i32)>) -> bool {
        let Some(idx) = self.resolve(p) else { return false };
        let pane = self.pane_mut(idx);
        pane.cursor = cursor.map(|(cx, cy)| {
            (
                cx.max(0).min(pane.w.saturating_sub(1).max(0)),
                cy.max(0).min(pane.h.saturating_sub(1).max(0)),
            )
        });
        self.damage_idx(idx, Damage::CURSOR);
        true
    }

    pub fn cursor(&self, p: PaneId) -> Option<(i32, i32)> {
        self.resolve(p).and_then(|i| self.pane(i).cursor)
    }

    pub(crate) fn damage_idx(&mut self, idx: u32, bits: Damage) {
        self.pane_mut(idx).damage |= bits;
        let mut a = self.pane(idx).parent;
        while let Some(i) = a {
            if self.pane(i).damage.contains(Damage::CHILD) {
                break;
            }
            self.pane_mut(i).damage |= Damage::CHILD;
            a = self.pane(i).parent;
        }
    }

    /// Record damage on a pane; ancestors learn through `CHILD`.
    pub fn damage(&mut self, p: PaneId, bits: Damage) -> bool {
        match self.resolve(p) {
            Some(idx) => {
                self.damage_idx(idx, bits);
                true
            }
            None => false,
        }
    }

    pub fn damage_bits(&self, p: PaneId) -> Option<Damage> {
        self.resolve(p).map(|i| self.pane(i).damage)
    }

    /// Point the focus path from the root down at `p`.
    pub fn focus(&mut self, p: PaneId) -> bool {
        let Some(mut idx) = self.resolve(p) else { return false };
        if self.pane(idx).closed() {
            return false;
        }
        while let Some(parent) = self.pane(idx).parent {
            self.pane_mut(parent).focus = Some(idx);
            idx = parent;
        }
        self.damage(p, Damage::CURSOR);
        true
    }

    /// Descend focus children from `p` to the focused leaf.
    pub fn focus_leaf(&self, p: PaneId) -> Option<PaneId> {
        let mut idx = self.resolve(p)?;
        loop {
            match self.pane(idx).focus {
                Some(f) if self.panes[f as usize].is_some() && !self.pane(f).closed() => idx = f,
                _ => return Some(self.id_of(idx)),
            }
        }
    }

    pub fn focus_child(&self, p: PaneId) -> Option<PaneId> {
        let idx = self.resolve(p)?;
        self.pane(idx).focus.map(|f| self.id_of(f))
    }

    pub fn attrs(&self, p: PaneId) -> Option<&AttrSet> {
        self.resolve(p).map(|i| &self.pane(i).attrs)
    }

    pub fn attrs_mut(&mut self, p: PaneId) -> Option<&mut AttrSet> {
        let idx = self.resolve(p)?;
        Some(&mut self.pane_mut(idx).attrs)
    }

    pub fn handler(&self, p: PaneId) -> Option<Handler> {
        self.resolve(p).and_then(|i| self.pane(i).handler.clone())
    }

    pub fn set_handler(&mut self, p: PaneId, handler: Option<Handler>) -> bool {
        match self.resolve(p) {
            Some(idx) => {
                self.pane_mut(idx).handler = handler;
                true
            }
            None => false,
        }
    }

    /// Remove the pane's private data for exclusive use; pair with
    /// [`Tree::put_data`]. Re-entrant takers see `None`.
    pub fn take_data<T: Any>(&mut self, p: PaneId) -> Option<Box<T>> {
        let idx = self.resolve(p)?;
        let data = self.pane_mut(idx).data.take()?;
        match data.downcast::<T>() {
            Ok(d) => Some(d),
            Err(d) => {
                self.pane_mut(idx).data = Some(d);
                None
            }
        }
    }

    pub fn put_data<T: Any>(&mut self, p: PaneId, data: Box<T>) -> bool {
        match self.resolve(p) {
            Some(idx) => {
                self.pane_mut(idx).data = Some(data);
                true
            }
            None => false,
        }
    }

    /// Translate pane-local coordinates to absolute (root) coordinates.
    pub fn abs_xy(&self, p: PaneId, x: i32, y: i32) -> Option<(i32, i32)> {
        let mut idx = self.resolve(p)?;
        let (mut ax, mut ay) = (x, y);
        loop {
            let pane = self.pane(idx);
            ax += pane.x;
            ay += pane.y;
            match pane.parent {
                Some(parent) => idx = parent,
                None => return Some((ax, ay)),
            }
        }
    }

    /// Recompute absolute z intervals for the whole tree.
    pub fn update_z(&mut self) {
        self.update_z_rec(self.root, 0);
    }

    fn update_z_rec(&mut self, idx: u32, base: i32) -> i32 {
        let abs = base + self.pane(idx).z;
        self.pane_mut(idx).abs_z_lo = abs;
        let mut hi = abs;
        let kids = self.pane(idx).children.clone();
        for c in kids {
            hi = hi.max(self.update_z_rec(c, abs));
        }
        self.pane_mut(idx).abs_z_hi = hi;
        hi
    }

    /// Is the absolute point `(ax, ay)` on pane `p` hidden by a sibling
    /// (at any ancestor level) whose z interval sits strictly above?
    /// Assumes a prior [`Tree::update_z`].
    pub fn masked(&self, p: PaneId, ax: i32, ay: i32) -> Option<bool> {
        let mut idx = self.resolve(p)?;
        let z = self.pane(idx).abs_z_lo;
        while let Some(parent) = self.pane(idx).parent {
            let (px, py) = self.abs_xy(self.id_of(parent), 0, 0)?;
            for &sib in &self.pane(parent).children {
                if sib == idx || self.pane(sib).closed() {
                    continue;
                }
                let s = self.pane(sib);
                if s.abs_z_lo > z && s.contains(ax - px, ay - py) {
                    return Some(true);
                }
            }
            idx = parent;
        }
        Some(false)
    }

    /// Descend from `p` to the leaf-most pane containing the (local)
    /// point, preferring higher z and later registration. Returns the pane
    /// and the point translated into its coordinates.
    pub fn leaf_at(&self, p: PaneId, x: i32, y: i32) -> Option<(PaneId, i32, i32)> {
        let mut idx = self.resolve(p)?;
        let (mut lx, mut ly) = (x, y);
        loop {
            let mut best: Option<(u32, i32, usize)> = None;
            for (pos, &c) in self.pane(idx).children.iter().enumerate() {
                let child = self.pane(c);
                if child.closed() || !child.contains(lx, ly) {
                    continue;
                }
                let candidate = (c, child.z, pos);
                best = match best {
                    Some((_, bz, bp)) if (child.z, pos) <= (bz, bp) => best,
                    _ => Some(candidate),
                };
            }
            match best {
                Some((c, _, _)) => {
                    lx -= self.pane(c).x;
                    ly -= self.pane(c).y;
                    idx = c;
                }
                None => return Some((self.id_of(idx), lx, ly)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Tree {
        let mut t = Tree::new();
        let root = t.root();
        t.resize(root, 0, 0, 80, 25);
        t
    }

    #[test]
    fn register_inherits_size() {
        let mut t = tree();
        let root = t.root();
        let a = t.register(root, 0, None, None).unwrap();
        assert_eq!(t.geometry(a), Some((0, 0, 80, 25)));
        assert_eq!(t.parent(a), Some(root));
        assert_eq!(t.children(root), vec![a]);
    }

    #[test]
    fn stale_ids_after_release() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        let idx = t.resolve(a).unwrap();
        t.pane_mut(t.resolve(t.root()).unwrap()).children.clear();
        t.release(idx);
        assert!(!t.is_live(a));
        let b = t.register(t.root(), 0, None, None).unwrap();
        // Slot reuse must not resurrect the old id.
        assert!(!t.is_live(a));
        assert!(t.is_live(b));
    }

    #[test]
    fn reparent_refuses_cycles() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        let b = t.register(a, 0, None, None).unwrap();
        assert!(!t.reparent(a, b));
        let c = t.register(t.root(), 0, None, None).unwrap();
        assert!(t.reparent(b, c));
        assert_eq!(t.parent(b), Some(c));
        assert_eq!(t.children(a), vec![]);
    }

    #[test]
    fn damage_bubbles_child_bit() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        let b = t.register(a, 0, None, None).unwrap();
        t.damage(b, Damage::CONTENT);
        assert!(t.damage_bits(a).unwrap().contains(Damage::CHILD));
        assert!(t.damage_bits(t.root()).unwrap().contains(Damage::CHILD));
        assert!(t.damage_bits(b).unwrap().contains(Damage::CONTENT));
    }

    #[test]
    fn focus_path_and_leaf() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        let b = t.register(a, 0, None, None).unwrap();
        let c = t.register(a, 0, None, None).unwrap();
        t.focus(b);
        assert_eq!(t.focus_leaf(t.root()), Some(b));
        t.focus(c);
        assert_eq!(t.focus_leaf(t.root()), Some(c));
    }

    #[test]
    fn cursor_clamps_to_bounds() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        t.resize(a, 0, 0, 10, 5);
        t.set_cursor(a, Some((50, 50)));
        assert_eq!(t.cursor(a), Some((9, 4)));
        t.set_cursor(a, None);
        assert_eq!(t.cursor(a), None);
    }

    #[test]
    fn abs_xy_accumulates_offsets() {
        let mut t = tree();
        let a = t.register(t.root(), 0, None, None).unwrap();
        t.resize(a, 5, 3, 40, 20);
        let b = t.register(a, 0, None, None).unwrap();
        t.resize(b, 2, 1, 10, 10);
        assert_eq!(t.abs_xy(b, 4, 4), Some((11, 8)));
    }

    #[test]
    fn z_intervals_cover_descendants() {
        let mut t = tree();
        let a = t.register(t.root(), 1, None, None).unwrap();
        let b = t.register(a, 3, None, None).unwrap();
        t.update_z();
        let (ai, bi) = (t.resolve(a).unwrap(), t.resolve(b).unwrap());
        assert_eq!(t.pane(ai).abs_z_lo, 1);
        assert_eq!(t.pane(bi).abs_z_lo, 4);
        assert_eq!(t.pane(ai).abs_z_hi, 4);
        let ri = t.resolve(t.root()).unwrap();
        assert_eq!(t.pane(ri).abs_z_hi, 4);
    }

    #[test]
    fn masking_by_higher_z_sibling() {
        let mut t = tree();
        let low = t.register(t.root(), 0, None, None).unwrap();
        t.resize(low, 0, 0, 80, 25);
        let popup = t.register(t.root(), 5, None, None).unwrap();
        t.resize(popup, 10, 5, 20, 10);
        t.update_z();
        assert_eq!(t.masked(low, 15, 8), Some(true));
        assert_eq!(t.masked(low, 0, 0), Some(false));
        assert_eq!(t.masked(popup, 15, 8), Some(false));
    }

    #[test]
    fn render_order_is_z_then_registration() {
        let mut t = tree();
        let a = t.register(t.root(), 2, None, None).unwrap();
        let b = t.register(t.root(), 0, None, None).unwrap();
        let c = t.register(t.root(), 2, None, None).unwrap();
        assert_eq!(t.children(t.root()), vec![a, b, c]);
        assert_eq!(t.children_render_order(t.root()), vec![b, a, c]);
    }

    #[test]
    fn leaf_at_prefers_higher_z_then_later_child() {
        let mut t = tree();
        let under = t.register(t.root(), 0, None, None).unwrap();
        t.resize(under, 0, 0, 80, 25);
        let over = t.register(t.root(), 2, None, None).unwrap();
        t.resize(over, 10, 5, 20, 10);
        let (hit, lx, ly) = t.leaf_at(t.root(), 12, 6).unwrap();
        assert_eq!(hit, over);
        assert_eq!((lx, ly), (2, 1));
        let (hit, ..) = t.leaf_at(t.root(), 0, 0).unwrap();
        assert_eq!(hit, under);
    }
}
