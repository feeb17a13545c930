//! core-mark: ordered position markers grouped by view.
//!
//! A document owns one [`MarkSet`]. Every mark in the set carries:
//! * `ref` — an opaque `u64` location payload. Only the owning document
//!   interprets it; the set requires that for one document, payloads are
//!   totally ordered by `u64` comparison and equal payloads mean the same
//!   position (the text document uses char offsets).
//! * `seq` — assigned on insertion and maintained so that sequence numbers
//!   strictly increase along the global list. This gives the O(1) order
//!   test; moving a mark between two neighbours re-sequences it, and when
//!   gaps run out the whole list is renumbered with fresh gaps.
//! * a group: ungrouped, a numbered view, or "point".
//!
//! List structure:
//! * one global doubly-linked list of all marks, kept in ref-order;
//! * per view, a sub-list containing that view's marks *and every point*.
//!   A view mark's links are embedded; a point carries one link pair per
//!   view, so each point is threaded into every view's list at its current
//!   position. That thread is what makes "the nearest view mark at or
//!   before the point" O(distance-to-that-mark) instead of a scan of the
//!   whole document.
//!
//! Storage is a slot arena with generations and a free list; a stale
//! [`MarkId`] simply reads as `None`. Freeing is immediate here — deferred
//! reclamation is the editor root's business.
//!
//! Invariants:
//! * `seq` strictly increases along the global list.
//! * refs are non-decreasing along the global list.
//! * each view list is the ordered projection of the global list onto
//!   {marks of that view} ∪ {points}.
//! * point `plinks[v]` is `Some` exactly for live views `v`.

use core_attr::AttrSet;
use tracing::{debug, trace};

/// Spacing between sequence numbers after a renumber; the gap new
/// insertions bisect.
const SEQ_STRIDE: u64 = 16;

/// Stable handle to a mark; survives arbitrary other mutations and reads
/// as dead after free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkId {
    index: u32,
    generation: u32,
}

/// Grouping of a mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewNum {
    /// Plain mark, in the global list only.
    Ungrouped,
    /// A point: threaded through every view's list.
    Point,
    /// Member of the numbered view.
    View(usize),
}

/// Direction of a relocation, deciding which side of an equal-ref run the
/// mark lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Fwd,
    Bwd,
}

/// View bookkeeping failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("no such view")]
    NoSuchView,
    #[error("view owned by another pane")]
    NotOwner,
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug)]
struct MarkNode {
    ref_: u64,
    seq: u64,
    view: ViewNum,
    attrs: AttrSet,
    /// Global list links.
    main: Links,
    /// View-list links for a `View(v)` mark.
    vlink: Links,
    /// Per-view links for a point; index = view number.
    plinks: Vec<Option<Links>>,
}

#[derive(Debug)]
struct ViewSlot {
    owner: u64,
    head: Option<u32>,
    tail: Option<u32>,
}

/// All marks of one document.
#[derive(Debug, Default)]
pub struct MarkSet {
    marks: Vec<Option<MarkNode>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    head: Option<u32>,
    tail: Option<u32>,
    /// View slots; indices are monotonic, freed slots are never reused.
    views: Vec<Option<ViewSlot>>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of live marks.
    pub fn len(&self) -> usize {
        self.marks.iter().filter(|m| m.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    // ---------------------------------------------------------------------
    // Arena plumbing
    // ---------------------------------------------------------------------

    fn node(&self, idx: u32) -> &MarkNode {
        self.marks[idx as usize].as_ref().expect("live mark index")
    }

    fn node_mut(&mut self, idx: u32) -> &mut MarkNode {
        self.marks[idx as usize].as_mut().expect("live mark index")
    }

    fn resolve(&self, id: MarkId) -> Option<u32> {
        let i = id.index as usize;
        if i < self.marks.len()
            && self.generations[i] == id.generation
            && self.marks[i].is_some()
        {
            Some(id.index)
        } else {
            None
        }
    }

    fn id_of(&self, idx: u32) -> MarkId {
        MarkId { index: idx, generation: self.generations[idx as usize] }
    }

    fn alloc(&mut self, node: MarkNode) -> u32 {
        match self.free_list.pop() {
            Some(i) => {
                self.marks[i] = Some(node);
                i as u32
            }
            None => {
                self.marks.push(Some(node));
                self.generations.push(0);
                (self.marks.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, idx: u32) {
        let i = idx as usize;
        self.marks[i] = None;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free_list.push(i);
    }

    // ---------------------------------------------------------------------
    // List plumbing
    // ---------------------------------------------------------------------

    /// True when mark `idx` participates in view `v`'s list.
    fn in_view_list(&self, v: usize, idx: u32) -> bool {
        match self.node(idx).view {
            ViewNum::View(x) => x == v,
            ViewNum::Point => true,
            ViewNum::Ungrouped => false,
        }
    }

    fn view_links(&self, v: usize, idx: u32) -> Links {
        match self.node(idx).view {
            ViewNum::View(x) if x == v => self.node(idx).vlink,
            ViewNum::Point => self.node(idx).plinks[v].unwrap_or_default(),
            _ => unreachable!("mark not in view list"),
        }
    }

    fn set_view_links(&mut self, v: usize, idx: u32, links: Links) {
        match self.node(idx).view {
            ViewNum::View(x) if x == v => self.node_mut(idx).vlink = links,
            ViewNum::Point => self.node_mut(idx).plinks[v] = Some(links),
            _ => unreachable!("mark not in view list"),
        }
    }

    /// Splice `idx` out of view `v`'s list.
    fn view_unlink(&mut self, v: usize, idx: u32) {
        let links = self.view_links(v, idx);
        match links.prev {
            Some(p) => {
                let mut l = self.view_links(v, p);
                l.next = links.next;
                self.set_view_links(v, p, l);
            }
            None => self.views[v].as_mut().expect("live view").head = links.next,
        }
        match links.next {
            Some(n) => {
                let mut l = self.view_links(v, n);
                l.prev = links.prev;
                self.set_view_links(v, n, l);
            }
            None => self.views[v].as_mut().expect("live view").tail = links.prev,
        }
        self.set_view_links(v, idx, Links::default());
    }

    /// Thread `idx` into view `v`'s list using its global-list position:
    /// insert after the nearest preceding global member of that list.
    fn view_link_by_position(&mut self, v: usize, idx: u32) {
        let mut scan = self.node(idx).main.prev;
        let after = loop {
            match scan {
                Some(p) if self.in_view_list(v, p) => break Some(p),
                Some(p) => scan = self.node(p).main.prev,
                None => break None,
            }
        };
        let next = match after {
            Some(a) => {
                let mut l = self.view_links(v, a);
                let next = l.next;
                l.next = Some(idx);
                self.set_view_links(v, a, l);
                next
            }
            None => {
                let slot = self.views[v].as_mut().expect("live view");
                let next = slot.head;
                slot.head = Some(idx);
                next
            }
        };
        match next {
            Some(n) => {
                let mut l = self.view_links(v, n);
                l.prev = Some(idx);
                self.set_view_links(v, n, l);
            }
            None => self.views[v].as_mut().expect("live view").tail = Some(idx),
        }
        self.set_view_links(v, idx, Links { prev: after, next });
    }

    fn live_views(&self) -> Vec<usize> {
        (0..self.views.len()).filter(|&v| self.views[v].is_some()).collect()
    }

    /// Thread `idx` into every list its group requires, based on its
    /// (already linked) global position.
    fn thread_views(&mut self, idx: u32) {
        match self.node(idx).view {
            ViewNum::Ungrouped => {}
            ViewNum::View(v) => self.view_link_by_position(v, idx),
            ViewNum::Point => {
                let nviews = self.views.len();
                self.node_mut(idx).plinks.resize(nviews, None);
                for v in self.live_views() {
                    self.node_mut(idx).plinks[v] = Some(Links::default());
                    self.view_link_by_position(v, idx);
                }
            }
        }
    }

    /// Remove `idx` from every list (global and view/point threads).
    fn unlink(&mut self, idx: u32) {
        match self.node(idx).view {
            ViewNum::Ungrouped => {}
            ViewNum::View(v) => self.view_unlink(v, idx),
            ViewNum::Point => {
                for v in self.live_views() {
                    if self.node(idx).plinks[v].is_some() {
                        self.view_unlink(v, idx);
                    }
                }
            }
        }
        let main = self.node(idx).main;
        match main.prev {
            Some(p) => self.node_mut(p).main.next = main.next,
            None => self.head = main.next,
        }
        match main.next {
            Some(n) => self.node_mut(n).main.prev = main.prev,
            None => self.tail = main.prev,
        }
        self.node_mut(idx).main = Links::default();
    }

    /// Link `idx` into the global list after `after` (None = head), then
    /// assign a sequence number and thread view lists.
    fn link_global_after(&mut self, idx: u32, after: Option<u32>) {
        let next = match after {
            Some(a) => {
                let next = self.node(a).main.next;
                self.node_mut(a).main.next = Some(idx);
                next
            }
            None => {
                let next = self.head;
                self.head = Some(idx);
                next
            }
        };
        match next {
            Some(n) => self.node_mut(n).main.prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.node_mut(idx).main = Links { prev: after, next };
        self.assign_seq(idx);
        self.thread_views(idx);
    }

    /// Pick a sequence number between the neighbours, renumbering the whole
    /// list when the gap is exhausted.
    fn assign_seq(&mut self, idx: u32) {
        let main = self.node(idx).main;
        let lo = main.prev.map(|p| self.node(p).seq);
        let hi = main.next.map(|n| self.node(n).seq);
        let seq = match (lo, hi) {
            (None, None) => SEQ_STRIDE,
            (Some(lo), None) => lo.saturating_add(SEQ_STRIDE),
            (None, Some(hi)) if hi > 1 => hi / 2,
            (Some(lo), Some(hi)) if hi - lo > 1 => lo + (hi - lo) / 2,
            _ => {
                self.renumber();
                return self.assign_seq(idx);
            }
        };
        self.node_mut(idx).seq = seq;
    }

    /// Rewrite every sequence number with a fresh stride. Amortised O(1)
    /// per insertion. The walk includes any node mid-insertion; its caller
    /// re-derives the final midpoint afterwards.
    fn renumber(&mut self) {
        debug!(target: "mark", marks = self.len(), "seq_renumber");
        let mut seq = SEQ_STRIDE;
        let mut cur = self.head;
        while let Some(i) = cur {
            self.node_mut(i).seq = seq;
            seq += SEQ_STRIDE;
            cur = self.node(i).main.next;
        }
    }

    /// Global-list position after which a mark arriving at `ref_` should be
    /// linked. `Fwd` lands after an equal-ref run, `Bwd` before it.
    fn position_for(&self, ref_: u64, dir: Dir) -> Option<u32> {
        // Walk from the tail: appends and forward motion dominate.
        let mut cur = self.tail;
        while let Some(i) = cur {
            let r = self.node(i).ref_;
            let fits = match dir {
                Dir::Fwd => r <= ref_,
                Dir::Bwd => r < ref_,
            };
            if fits {
                return Some(i);
            }
            cur = self.node(i).main.prev;
        }
        None
    }

    // ---------------------------------------------------------------------
    // Mark lifecycle
    // ---------------------------------------------------------------------

    fn add_at(&mut self, ref_: u64, view: ViewNum) -> u32 {
        let idx = self.alloc(MarkNode {
            ref_,
            seq: 0,
            view,
            attrs: AttrSet::new(),
            main: Links::default(),
            vlink: Links::default(),
            plinks: Vec::new(),
        });
        let after = self.position_for(ref_, Dir::Fwd);
        self.link_global_after(idx, after);
        trace!(target: "mark", idx, ref_, ?view, "mark_new");
        idx
    }

    /// New ungrouped mark at `ref_`, after any marks already there.
    pub fn add_ungrouped_at(&mut self, ref_: u64) -> MarkId {
        let idx = self.add_at(ref_, ViewNum::Ungrouped);
        self.id_of(idx)
    }

    /// New mark in view `view` at `ref_`.
    pub fn add_mark_at(&mut self, ref_: u64, view: usize) -> Result<MarkId, ViewError> {
        if !self.view_live(view) {
            return Err(ViewError::NoSuchView);
        }
        let idx = self.add_at(ref_, ViewNum::View(view));
        Ok(self.id_of(idx))
    }

    /// New point at `ref_`, threaded through every live view.
    pub fn add_point_at(&mut self, ref_: u64) -> MarkId {
        let idx = self.add_at(ref_, ViewNum::Point);
        self.id_of(idx)
    }

    /// Duplicate as an ungrouped mark placed immediately after the
    /// original (same ref, later seq).
    pub fn dup(&mut self, m: MarkId) -> Option<MarkId> {
        let orig = self.resolve(m)?;
        let ref_ = self.node(orig).ref_;
        let idx = self.alloc(MarkNode {
            ref_,
            seq: 0,
            view: ViewNum::Ungrouped,
            attrs: self.node(orig).attrs.clone(),
            main: Links::default(),
            vlink: Links::default(),
            plinks: Vec::new(),
        });
        self.link_global_after(idx, Some(orig));
        Some(self.id_of(idx))
    }

    /// Free a mark. Returns false for a stale id.
    pub fn free(&mut self, m: MarkId) -> bool {
        match self.resolve(m) {
            Some(idx) => {
                self.unlink(idx);
                self.release(idx);
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// True when the id still names a live mark.
    pub fn is_live(&self, m: MarkId) -> bool {
        self.resolve(m).is_some()
    }

    pub fn ref_of(&self, m: MarkId) -> Option<u64> {
        self.resolve(m).map(|i| self.node(i).ref_)
    }

    pub fn seq_of(&self, m: MarkId) -> Option<u64> {
        self.resolve(m).map(|i| self.node(i).seq)
    }

    pub fn view_of(&self, m: MarkId) -> Option<ViewNum> {
        self.resolve(m).map(|i| self.node(i).view)
    }

    pub fn attrs(&self, m: MarkId) -> Option<&AttrSet> {
        self.resolve(m).map(|i| &self.node(i).attrs)
    }

    pub fn attrs_mut(&mut self, m: MarkId) -> Option<&mut AttrSet> {
        let idx = self.resolve(m)?;
        Some(&mut self.node_mut(idx).attrs)
    }

    /// Same-position test (ref equality).
    pub fn same_ref(&self, a: MarkId, b: MarkId) -> Option<bool> {
        Some(self.ref_of(a)? == self.ref_of(b)?)
    }

    /// O(1) order test: true when `a` is at or before `b` in document
    /// order and `a != b`.
    pub fn precedes(&self, a: MarkId, b: MarkId) -> Option<bool> {
        Some(self.seq_of(a)? < self.seq_of(b)?)
    }

    pub fn first(&self) -> Option<MarkId> {
        self.head.map(|i| self.id_of(i))
    }

    pub fn last(&self) -> Option<MarkId> {
        self.tail.map(|i| self.id_of(i))
    }

    pub fn next(&self, m: MarkId) -> Option<MarkId> {
        let idx = self.resolve(m)?;
        self.node(idx).main.next.map(|i| self.id_of(i))
    }

    pub fn prev(&self, m: MarkId) -> Option<MarkId> {
        let idx = self.resolve(m)?;
        self.node(idx).main.prev.map(|i| self.id_of(i))
    }

    /// All marks in document order.
    pub fn iter(&self) -> impl Iterator<Item = MarkId> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let i = cur?;
            cur = self.node(i).main.next;
            Some(self.id_of(i))
        })
    }

    // ---------------------------------------------------------------------
    // Relocation
    // ---------------------------------------------------------------------

    fn relocate(&mut self, idx: u32, ref_: u64, dir: Dir) {
        self.unlink(idx);
        self.node_mut(idx).ref_ = ref_;
        let after = self.position_for(ref_, dir);
        self.link_global_after(idx, after);
    }

    /// Move a mark to a new location. `Fwd` lands after marks already at
    /// `ref_`, `Bwd` before them; a point's view threads all follow.
    pub fn move_ref(&mut self, m: MarkId, ref_: u64, dir: Dir) -> bool {
        match self.resolve(m) {
            Some(idx) => {
                self.relocate(idx, ref_, dir);
                true
            }
            None => false,
        }
    }

    /// Move `m` to `target`'s position, immediately after it.
    pub fn to_mark(&mut self, m: MarkId, target: MarkId) -> bool {
        let (Some(idx), Some(t)) = (self.resolve(m), self.resolve(target)) else {
            return false;
        };
        if idx == t {
            return true;
        }
        self.unlink(idx);
        self.node_mut(idx).ref_ = self.node(t).ref_;
        self.link_global_after(idx, Some(t));
        true
    }

    /// Move `m` to the document boundary: `ref_` is the document's first or
    /// last position, `at_end` picks which side of everything it lands on.
    pub fn to_end(&mut self, m: MarkId, ref_: u64, at_end: bool) -> bool {
        self.move_ref(m, ref_, if at_end { Dir::Fwd } else { Dir::Bwd })
    }

    // ---------------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------------

    /// Allocate a view slot for `owner` (an opaque pane token). Every
    /// existing point is threaded into the new view's list.
    pub fn add_view(&mut self, owner: u64) -> usize {
        let v = self.views.len();
        self.views.push(Some(ViewSlot { owner, head: None, tail: None }));
        let mut cur = self.head;
        while let Some(i) = cur {
            if matches!(self.node(i).view, ViewNum::Point) {
                self.node_mut(i).plinks.resize(v + 1, None);
                self.node_mut(i).plinks[v] = Some(Links::default());
                self.view_link_by_position(v, i);
            }
            cur = self.node(i).main.next;
        }
        debug!(target: "mark", view = v, owner, "view_added");
        v
    }

    /// Tear down a view: frees every surviving mark in it and unthreads
    /// points. Only the owner may free a view.
    pub fn del_view(&mut self, v: usize, owner: u64) -> Result<usize, ViewError> {
        let slot = self
            .views
            .get(v)
            .and_then(|s| s.as_ref())
            .ok_or(ViewError::NoSuchView)?;
        if slot.owner != owner {
            return Err(ViewError::NotOwner);
        }
        // Collect first: freeing view marks splices neighbours, and a point
        // whose thread was already dropped must not be touched again.
        let members: Vec<u32> = {
            let mut out = Vec::new();
            let mut cur = slot.head;
            while let Some(i) = cur {
                out.push(i);
                cur = self.view_links(v, i).next;
            }
            out
        };
        // Free view marks while point threads are still intact, then drop
        // the point threads.
        let mut freed = 0usize;
        for &i in &members {
            if matches!(self.node(i).view, ViewNum::View(_)) {
                self.unlink(i);
                self.release(i);
                freed += 1;
            }
        }
        for &i in &members {
            if matches!(self.node(i).view, ViewNum::Point) {
                self.node_mut(i).plinks[v] = None;
            }
        }
        self.views[v] = None;
        debug!(target: "mark", view = v, freed, "view_deleted");
        Ok(freed)
    }

    /// True when the numbered view is live.
    pub fn view_live(&self, v: usize) -> bool {
        self.views.get(v).is_some_and(|s| s.is_some())
    }

    /// True when any view is still allocated.
    pub fn any_view_live(&self) -> bool {
        self.views.iter().any(|s| s.is_some())
    }

    fn view_scan(&self, v: usize, mut cur: Option<u32>, fwd: bool) -> Option<u32> {
        while let Some(i) = cur {
            if matches!(self.node(i).view, ViewNum::View(_)) {
                return Some(i);
            }
            let l = self.view_links(v, i);
            cur = if fwd { l.next } else { l.prev };
        }
        None
    }

    /// First mark of view `v` (points skipped).
    pub fn view_first(&self, v: usize) -> Option<MarkId> {
        let head = self.views.get(v)?.as_ref()?.head;
        self.view_scan(v, head, true).map(|i| self.id_of(i))
    }

    /// Last mark of view `v` (points skipped).
    pub fn view_last(&self, v: usize) -> Option<MarkId> {
        let tail = self.views.get(v)?.as_ref()?.tail;
        self.view_scan(v, tail, false).map(|i| self.id_of(i))
    }

    /// Next view-`v` mark after `m`, where `m` is a view-`v` mark or a
    /// point.
    pub fn view_next(&self, v: usize, m: MarkId) -> Option<MarkId> {
        let idx = self.resolve(m)?;
        if !self.in_view_list(v, idx) {
            return None;
        }
        self.view_scan(v, self.view_links(v, idx).next, true)
            .map(|i| self.id_of(i))
    }

    /// Previous view-`v` mark before `m`.
    pub fn view_prev(&self, v: usize, m: MarkId) -> Option<MarkId> {
        let idx = self.resolve(m)?;
        if !self.in_view_list(v, idx) {
            return None;
        }
        self.view_scan(v, self.view_links(v, idx).prev, false)
            .map(|i| self.id_of(i))
    }

    /// Marks of view `v` in document order.
    pub fn iter_view(&self, v: usize) -> impl Iterator<Item = MarkId> + '_ {
        let mut cur = self
            .views
            .get(v)
            .and_then(|s| s.as_ref())
            .and_then(|s| self.view_scan(v, s.head, true));
        std::iter::from_fn(move || {
            let i = cur?;
            cur = self.view_scan(v, self.view_links(v, i).next, true);
            Some(self.id_of(i))
        })
    }

    /// The nearest view-`v` mark at or before `m`. For a point this uses
    /// its thread in `v`'s list; for a view-`v` mark it is the mark itself;
    /// otherwise the global list is walked backwards.
    pub fn vmark_at_or_before(&self, v: usize, m: MarkId) -> Option<MarkId> {
        let idx = self.resolve(m)?;
        if !self.view_live(v) {
            return None;
        }
        match self.node(idx).view {
            ViewNum::View(x) if x == v => Some(self.id_of(idx)),
            _ if self.in_view_list(v, idx) => self
                .view_scan(v, self.view_links(v, idx).prev, false)
                .map(|i| self.id_of(i)),
            _ => {
                let mut cur = self.node(idx).main.prev;
                while let Some(i) = cur {
                    if matches!(self.node(i).view, ViewNum::View(x) if x == v) {
                        return Some(self.id_of(i));
                    }
                    cur = self.node(i).main.prev;
                }
                None
            }
        }
    }

    // ---------------------------------------------------------------------
    // Bulk ref maintenance (document edits, hiding)
    // ---------------------------------------------------------------------

    /// Collapse every mark with `lo < ref < hi` onto one edge of the range.
    pub fn clip(&mut self, lo: u64, hi: u64, toward_end: bool) {
        let inside: Vec<u32> = {
            let mut v = Vec::new();
            let mut cur = self.head;
            while let Some(i) = cur {
                let r = self.node(i).ref_;
                if r > lo && r < hi {
                    v.push(i);
                }
                cur = self.node(i).main.next;
            }
            v
        };
        for i in inside {
            // In-place ref rewrite: the affected marks form a contiguous
            // run, and either edge keeps them between the lo-run and the
            // hi-run, so list order and seq stay valid.
            self.node_mut(i).ref_ = if toward_end { hi } else { lo };
        }
    }

    /// Document inserted `len` positions at `at`. Marks after `at` shift;
    /// marks exactly at `at` split around `at_mark`: the mark itself and
    /// everything sequenced after it move to the end of the inserted
    /// region, earlier ones keep the region start.
    pub fn note_insert(&mut self, at: u64, len: u64, at_mark: Option<MarkId>) {
        if len == 0 {
            return;
        }
        let pivot_seq = at_mark
            .and_then(|m| self.resolve(m))
            .filter(|&i| self.node(i).ref_ == at)
            .map(|i| self.node(i).seq);
        let mut cur = self.head;
        while let Some(i) = cur {
            let n = self.node(i);
            let r = n.ref_;
            let bump = if r > at {
                true
            } else if r == at {
                match pivot_seq {
                    Some(p) => n.seq >= p,
                    None => false,
                }
            } else {
                false
            };
            if bump {
                self.node_mut(i).ref_ = r + len;
            }
            cur = self.node(i).main.next;
        }
        // Relative order is unchanged (a suffix of the equal-ref run moved
        // forward together), so no re-sequencing is required.
    }

    /// Document deleted the range `[from, to)`. Marks inside collapse to
    /// `from`; marks at or past `to` shift back.
    pub fn note_delete(&mut self, from: u64, to: u64) {
        if to <= from {
            return;
        }
        let len = to - from;
        let mut cur = self.head;
        while let Some(i) = cur {
            let r = self.node(i).ref_;
            if r > from {
                self.node_mut(i).ref_ = if r < to { from } else { r - len };
            }
            cur = self.node(i).main.next;
        }
    }

}
