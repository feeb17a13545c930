//! Boundary flags for search callers.
//!
//! The regex engine takes a bitmask of zero-width assertions with every
//! step; something has to know where lines, words and the document
//! begin and end. For in-memory text this module computes that mask per
//! position, using UAX-29 word segmentation for the word edges (a word
//! for this purpose is a segment containing an alphanumeric, so
//! punctuation runs do not count as words the way the plain
//! alphanumeric rule would miscount them).

use rexel::Assert;
use unicode_segmentation::UnicodeSegmentation;

/// Per-position assertion masks for a text snapshot.
pub struct FlagScanner {
    /// Offsets (in chars) where a word starts / ends.
    word_starts: Vec<usize>,
    word_ends: Vec<usize>,
    len: usize,
    newlines: Vec<usize>,
}

impl FlagScanner {
    pub fn new(text: &str) -> Self {
        let mut word_starts = Vec::new();
        let mut word_ends = Vec::new();
        // unicode-segmentation hands back byte offsets; re-express them
        // in chars, which is what marks and the matchers count in.
        let mut byte_to_char = vec![0usize; text.len() + 1];
        for (ci, (bi, _)) in text.char_indices().enumerate() {
            byte_to_char[bi] = ci;
        }
        byte_to_char[text.len()] = text.chars().count();
        for (bi, seg) in text.split_word_bound_indices() {
            if seg.chars().any(|c| c.is_alphanumeric() || c == '_') {
                word_starts.push(byte_to_char[bi]);
                word_ends.push(byte_to_char[bi + seg.len()]);
            }
        }
        let newlines = text
            .chars()
            .enumerate()
            .filter(|&(_, c)| c == '\n')
            .map(|(i, _)| i)
            .collect();
        Self {
            word_starts,
            word_ends,
            len: text.chars().count(),
            newlines,
        }
    }

    /// The assertion mask for the boundary before char `i`
    /// (`i == len` is the end of the text). `point` marks the focus
    /// point for the `\@` assertion.
    pub fn flags_at(&self, i: usize, point: Option<usize>) -> Assert {
        let mut f = Assert::empty();
        if i == 0 {
            f |= Assert::SOD | Assert::SOL;
        } else if self.newlines.binary_search(&(i - 1)).is_ok() {
            f |= Assert::SOL;
        }
        if i == self.len {
            f |= Assert::EOD | Assert::EOL;
        } else if self.newlines.binary_search(&i).is_ok() {
            f |= Assert::EOL;
        }
        let sow = self.word_starts.binary_search(&i).is_ok();
        let eow = self.word_ends.binary_search(&i).is_ok();
        if sow {
            f |= Assert::SOW | Assert::WBRK;
        }
        if eow {
            f |= Assert::EOW | Assert::WBRK;
        }
        if !sow && !eow {
            f |= Assert::NOWBRK;
        }
        if point == Some(i) {
            f |= Assert::POINT;
        }
        f
    }

    /// Number of chars scanned.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_edges_follow_uax29() {
        let s = FlagScanner::new("can't stop");
        // The apostrophe stays inside the word under UAX-29.
        assert!(s.flags_at(0, None).contains(Assert::SOW));
        assert!(s.flags_at(5, None).contains(Assert::EOW));
        assert!(!s.flags_at(3, None).contains(Assert::WBRK));
        assert!(s.flags_at(6, None).contains(Assert::SOW));
        assert!(s.flags_at(10, None).contains(Assert::EOW));
    }

    #[test]
    fn punctuation_runs_are_not_words() {
        let s = FlagScanner::new("a ... b");
        assert!(s.flags_at(2, None).contains(Assert::NOWBRK));
        assert!(s.flags_at(5, None).contains(Assert::NOWBRK));
    }

    #[test]
    fn line_and_document_edges() {
        let s = FlagScanner::new("ab\ncd");
        assert!(s.flags_at(0, None).contains(Assert::SOD | Assert::SOL));
        assert!(s.flags_at(2, None).contains(Assert::EOL));
        assert!(s.flags_at(3, None).contains(Assert::SOL));
        assert!(s.flags_at(5, None).contains(Assert::EOD | Assert::EOL));
    }

    #[test]
    fn multibyte_offsets_are_char_based() {
        let s = FlagScanner::new("héllo wörld");
        assert!(s.flags_at(5, None).contains(Assert::EOW));
        assert!(s.flags_at(6, None).contains(Assert::SOW));
        assert_eq!(s.len(), 11);
    }
}
