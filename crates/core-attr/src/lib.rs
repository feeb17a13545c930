//! Ordered attribute sets.
//!
//! An `AttrSet` is a small key→value map of owned strings attached to panes,
//! marks, and documents. Consumers rely on two access patterns:
//! * exact lookup / insert-or-replace / delete;
//! * ordered prefix iteration ("every key starting with `render:`") and
//!   find-next-with-prefix, used by config application and renderers walking
//!   structured attribute families.
//!
//! Representation is a vector sorted ascending by key. Sets are tiny in
//! practice (a handful of entries), so binary search + contiguous scan beats
//! a tree or hash map and keeps prefix iteration a plain slice walk.
//!
//! Invariants:
//! * `entries` is strictly sorted by key (no duplicates).
//! * Values are stored verbatim; no normalization is applied.

/// Ordered key→string attribute container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrSet {
    entries: Vec<(String, String)>,
}

impl AttrSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no attributes are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }

    /// Look up the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key)
            .ok()
            .map(|i| self.entries[i].1.as_str())
    }

    /// Insert `key = value`, replacing any previous value. Returns the old
    /// value when one was replaced.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            Err(i) => {
                self.entries.insert(i, (key, value));
                None
            }
        }
    }

    /// Remove `key`, returning its value if it was present.
    pub fn del(&mut self, key: &str) -> Option<String> {
        match self.position(key) {
            Ok(i) => Some(self.entries.remove(i).1),
            Err(_) => None,
        }
    }

    /// Remove every attribute.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate all `(key, value)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate the contiguous run of entries whose key starts with `prefix`,
    /// in ascending key order.
    pub fn iter_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        let start = self.entries.partition_point(|(k, _)| k.as_str() < prefix);
        self.entries[start..]
            .iter()
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// First key strictly after `after` that starts with `prefix`, together
    /// with its value. `after = None` returns the first matching key.
    pub fn next_with_prefix<'a>(&'a self, prefix: &'a str, after: Option<&str>) -> Option<(&'a str, &'a str)> {
        self.iter_prefix(prefix)
            .find(|&(k, _)| after.is_none_or(|a| k > a))
    }
}

impl FromIterator<(String, String)> for AttrSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> AttrSet {
        let mut a = AttrSet::new();
        a.set("render:lines", "40");
        a.set("doc-name", "scratch");
        a.set("render:cols", "80");
        a.set("readonly", "yes");
        a
    }

    #[test]
    fn set_get_replace() {
        let mut a = sample();
        assert_eq!(a.get("doc-name"), Some("scratch"));
        assert_eq!(a.set("doc-name", "main.rs"), Some("scratch".to_string()));
        assert_eq!(a.get("doc-name"), Some("main.rs"));
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn del_removes() {
        let mut a = sample();
        assert_eq!(a.del("readonly"), Some("yes".to_string()));
        assert_eq!(a.del("readonly"), None);
        assert_eq!(a.get("readonly"), None);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn iteration_is_sorted() {
        let a = sample();
        let keys: Vec<&str> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["doc-name", "readonly", "render:cols", "render:lines"]);
    }

    #[test]
    fn prefix_iteration() {
        let a = sample();
        let got: Vec<(&str, &str)> = a.iter_prefix("render:").collect();
        assert_eq!(got, vec![("render:cols", "80"), ("render:lines", "40")]);
        assert!(a.iter_prefix("zzz").next().is_none());
    }

    #[test]
    fn next_with_prefix_steps_through_family() {
        let a = sample();
        let (k1, _) = a.next_with_prefix("render:", None).unwrap();
        assert_eq!(k1, "render:cols");
        let (k2, v2) = a.next_with_prefix("render:", Some(k1)).unwrap();
        assert_eq!((k2, v2), ("render:lines", "40"));
        assert_eq!(a.next_with_prefix("render:", Some(k2)), None);
    }

    #[test]
    fn next_with_prefix_ignores_unrelated_after() {
        let a = sample();
        // `after` below the family start behaves like None.
        let (k, _) = a.next_with_prefix("render:", Some("doc-name")).unwrap();
        assert_eq!(k, "render:cols");
    }
}
