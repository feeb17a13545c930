//! Rope-backed text document.
//!
//! The reference [`DocBackend`]: refs are char offsets into a
//! `ropey::Rope`, so stepping, slicing and editing are all O(log n) and
//! mark payloads order naturally.

use anyhow::{anyhow, Context, Result};
use ropey::Rope;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::contract::DocBackend;

pub struct TextDoc {
    rope: Rope,
    filename: Option<PathBuf>,
    modified: bool,
}

impl TextDoc {
    /// An in-memory document (no backing file).
    pub fn new(content: &str) -> Self {
        Self { rope: Rope::from_str(content), filename: None, modified: false }
    }

    /// Load a document from disk.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Self {
            rope: Rope::from_str(&content),
            filename: Some(path),
            modified: false,
        })
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// Whole content as a string (tests, small documents).
    pub fn to_string_lossless(&self) -> String {
        self.rope.to_string()
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }
}

impl DocBackend for TextDoc {
    fn end_ref(&self) -> u64 {
        self.rope.len_chars() as u64
    }

    fn step(&self, at: u64, forward: bool) -> Option<(char, u64)> {
        let at = at as usize;
        if forward {
            if at < self.rope.len_chars() {
                Some((self.rope.char(at), at as u64 + 1))
            } else {
                None
            }
        } else if at > 0 {
            Some((self.rope.char(at - 1), at as u64 - 1))
        } else {
            None
        }
    }

    fn replace(&mut self, start: u64, end: u64, text: &str) -> u64 {
        let len = self.rope.len_chars();
        let start = (start as usize).min(len);
        let end = (end as usize).min(len).max(start);
        self.rope.remove(start..end);
        self.rope.insert(start, text);
        self.modified = true;
        text.chars().count() as u64
    }

    fn save(&mut self, path: Option<&Path>) -> Result<()> {
        let target = path
            .map(Path::to_path_buf)
            .or_else(|| self.filename.clone())
            .ok_or_else(|| anyhow!("document has no backing file"))?;
        fs::write(&target, self.rope.to_string())
            .with_context(|| format!("writing {}", target.display()))?;
        if path.is_some() {
            self.filename = Some(target.clone());
        }
        self.modified = false;
        info!(target: "doc", path = %target.display(), "saved");
        Ok(())
    }

    fn modified(&self) -> bool {
        self.modified
    }

    fn same_file(&self, name: &str) -> bool {
        let Some(own) = self.filename.as_deref() else { return false };
        let other = Path::new(name);
        match (own.canonicalize(), other.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => own == other,
        }
    }

    fn content(&self, at: u64) -> Box<dyn Iterator<Item = char> + '_> {
        let at = (at as usize).min(self.rope.len_chars());
        Box::new(self.rope.chars_at(at))
    }
}
