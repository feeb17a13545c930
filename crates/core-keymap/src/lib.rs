//! core-keymap: string-key → handler lookup.
//!
//! A keymap maps command keys to handlers. Two entry forms coexist:
//! * exact keys — the handler fires only for that key;
//! * prefix keys — the handler fires for any key beginning with the prefix
//!   (an empty prefix is a catch-all).
//!
//! Lookup tries exact, then the longest matching prefix, then the fallback
//! chain. Entries are immutable once inserted: `add` refuses to replace an
//! existing entry (traced, not an error), and the only way to extend a map
//! that has been shared is to chain a new map in front of it.
//!
//! The map is a byte trie with small inline edge vectors — command keys are
//! short ASCII strings, so traversal touches a handful of cache lines and
//! prefix terminals fall out of the walk for free. The handler type is
//! generic; this crate knows nothing about panes or dispatch.

use smallvec::SmallVec;
use std::rc::Rc;
use tracing::trace;

#[derive(Debug, Clone)]
struct Edge {
    byte: u8,
    next: usize,
}

#[derive(Debug, Clone)]
struct Node {
    /// Handler index for a key ending exactly here.
    exact: Option<usize>,
    /// Handler index for a prefix entry ending here.
    prefix: Option<usize>,
    edges: SmallVec<[Edge; 4]>,
}

impl Node {
    fn new() -> Self {
        Self { exact: None, prefix: None, edges: SmallVec::new() }
    }

    fn step(&self, byte: u8) -> Option<usize> {
        self.edges.iter().find(|e| e.byte == byte).map(|e| e.next)
    }
}

/// String-key → handler map with prefix entries and a fallback chain.
#[derive(Debug, Clone)]
pub struct Keymap<H> {
    nodes: Vec<Node>,
    handlers: Vec<H>,
    chain: Option<Rc<Keymap<H>>>,
}

impl<H> Default for Keymap<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Keymap<H> {
    /// An empty map with no chain.
    pub fn new() -> Self {
        Self { nodes: vec![Node::new()], handlers: Vec::new(), chain: None }
    }

    /// A map holding a single exact entry; the usual building block for
    /// chained registration.
    pub fn single(key: &str, handler: H) -> Self {
        let mut map = Self::new();
        map.add(key, handler);
        map
    }

    /// Set the fallback consulted when this map has no match.
    pub fn with_chain(mut self, chain: Rc<Keymap<H>>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// The current fallback map, if any.
    pub fn chain(&self) -> Option<&Rc<Keymap<H>>> {
        self.chain.as_ref()
    }

    fn walk_to(&mut self, key: &str) -> usize {
        let mut cur = 0usize;
        for &b in key.as_bytes() {
            cur = match self.nodes[cur].step(b) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::new());
                    self.nodes[cur].edges.push(Edge { byte: b, next });
                    next
                }
            };
        }
        cur
    }

    /// Insert an exact entry. An existing entry for the same key wins;
    /// the insertion is dropped with a trace.
    pub fn add(&mut self, key: &str, handler: H) -> bool {
        let node = self.walk_to(key);
        if self.nodes[node].exact.is_some() {
            trace!(target: "keymap", key, "exact_entry_exists_insert_dropped");
            return false;
        }
        self.nodes[node].exact = Some(self.handlers.len());
        self.handlers.push(handler);
        true
    }

    /// Insert a prefix entry matching every key that begins with `prefix`.
    pub fn add_prefix(&mut self, prefix: &str, handler: H) -> bool {
        let node = self.walk_to(prefix);
        if self.nodes[node].prefix.is_some() {
            trace!(target: "keymap", prefix, "prefix_entry_exists_insert_dropped");
            return false;
        }
        self.nodes[node].prefix = Some(self.handlers.len());
        self.handlers.push(handler);
        true
    }

    /// Resolve `key`: exact match, else longest prefix, else the chain.
    pub fn lookup(&self, key: &str) -> Option<&H> {
        let mut cur = 0usize;
        let mut best_prefix = self.nodes[0].prefix;
        let mut complete = true;
        for &b in key.as_bytes() {
            match self.nodes[cur].step(b) {
                Some(next) => {
                    cur = next;
                    if let Some(p) = self.nodes[cur].prefix {
                        best_prefix = Some(p);
                    }
                }
                None => {
                    complete = false;
                    break;
                }
            }
        }
        let hit = if complete {
            self.nodes[cur].exact.or(best_prefix)
        } else {
            best_prefix
        };
        match hit {
            Some(i) => Some(&self.handlers[i]),
            None => self.chain.as_deref().and_then(|c| c.lookup(key)),
        }
    }

    /// Number of entries in this map (excluding the chain).
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when this map (excluding the chain) has no entries.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, i32)], prefixes: &[(&str, i32)]) -> Keymap<i32> {
        let mut m = Keymap::new();
        for (k, v) in entries {
            m.add(k, *v);
        }
        for (k, v) in prefixes {
            m.add_prefix(k, *v);
        }
        m
    }

    #[test]
    fn exact_beats_prefix() {
        let m = map(&[("doc:step", 1)], &[("doc:", 2)]);
        assert_eq!(m.lookup("doc:step"), Some(&1));
        assert_eq!(m.lookup("doc:char"), Some(&2));
    }

    #[test]
    fn longest_prefix_wins() {
        let m = map(&[], &[("doc:", 1), ("doc:notify:", 2)]);
        assert_eq!(m.lookup("doc:notify:edit"), Some(&2));
        assert_eq!(m.lookup("doc:step"), Some(&1));
        assert_eq!(m.lookup("window:close"), None);
    }

    #[test]
    fn empty_prefix_is_catch_all() {
        let m = map(&[("Close", 1)], &[("", 9)]);
        assert_eq!(m.lookup("Close"), Some(&1));
        assert_eq!(m.lookup("anything-else"), Some(&9));
    }

    #[test]
    fn chain_consulted_after_miss() {
        let base = Rc::new(map(&[("Refresh", 5)], &[("Move-", 6)]));
        let front = map(&[("Refresh", 1)], &[]).with_chain(base);
        assert_eq!(front.lookup("Refresh"), Some(&1));
        assert_eq!(front.lookup("Move-Line"), Some(&6));
        assert_eq!(front.lookup("unknown"), None);
    }

    #[test]
    fn entries_are_immutable_once_inserted() {
        let mut m = map(&[("K", 1)], &[("P-", 3)]);
        assert!(!m.add("K", 2));
        assert!(!m.add_prefix("P-", 4));
        assert_eq!(m.lookup("K"), Some(&1));
        assert_eq!(m.lookup("P-x"), Some(&3));
        // A distinct exact entry under an existing prefix is fine.
        assert!(m.add("P-x", 7));
        assert_eq!(m.lookup("P-x"), Some(&7));
        assert_eq!(m.lookup("P-y"), Some(&3));
    }

    #[test]
    fn chained_registration_shadows() {
        let shared = Rc::new(map(&[("cmd", 1)], &[]));
        let replacement = Keymap::single("cmd", 2).with_chain(shared.clone());
        assert_eq!(replacement.lookup("cmd"), Some(&2));
        assert_eq!(shared.lookup("cmd"), Some(&1));
    }
}
