//! Non-backtracking parallel executor.
//!
//! Matcher state is the pair of threaded arrays the compiled form calls
//! for: `link[i]` chains the active waiting positions together and
//! `len[i]` holds the longest match length that has reached position `i`
//! (the sentinel `ABSENT` means "not live this tick"). Both arrays are
//! allocated once at construction and reset per step.
//!
//! One step consumes a code point together with the zero-width assertion
//! bits for the boundary before it, or a bare assertion bitmask (end of
//! input, or a boundary the caller wants to assert without consuming).
//! Within a step:
//! 1. the live chain is epsilon-closed under the supplied assertions —
//!    forks expand into both targets, satisfied assertions pass threads
//!    through, terminal states record a candidate match;
//! 2. each surviving waiting position is advanced over the code point
//!    into the next chain with `len + 1`;
//! 3. the next chain is eagerly closed through everything that needs no
//!    assertion knowledge, so a terminal reached right after a consumed
//!    character reports in the same step.
//!
//! Matches are retained leftmost-longest. Unless anchored, a fresh
//! zero-length thread is injected each step until a match is known; once
//! one is known, threads that could only produce a later start are
//! pruned, and the step after the last live thread dies reports a dead
//! end so callers can stop feeding early.

use crate::program::{decode, fold, lax_dash, lax_space, Assert, Fixed, Op, Rexel, RexelCaps};
use crate::Error;

const NO_LINK: u16 = u16::MAX;
const ABSENT: u32 = u32::MAX;

/// A reported match: start offset (in code points fed) and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPos {
    pub start: u64,
    pub len: u32,
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Best match known so far (leftmost-longest).
    pub found: Option<MatchPos>,
    /// More input might find, lengthen, or improve a match.
    pub can_extend: bool,
    /// No further match is possible; the caller can stop feeding.
    pub dead: bool,
}

/// One threaded array pair: a chain of waiting positions.
struct Chain {
    link: Vec<u16>,
    len: Vec<u32>,
    head: u16,
    tail: u16,
}

impl Chain {
    fn new(n: usize) -> Self {
        Self { link: vec![NO_LINK; n], len: vec![ABSENT; n], head: NO_LINK, tail: NO_LINK }
    }

    fn clear(&mut self) {
        self.link.fill(NO_LINK);
        self.len.fill(ABSENT);
        self.head = NO_LINK;
        self.tail = NO_LINK;
    }

    fn is_empty(&self) -> bool {
        self.head == NO_LINK
    }

    fn append(&mut self, pos: u16) {
        if self.tail == NO_LINK {
            self.head = pos;
        } else {
            self.link[self.tail as usize] = pos;
        }
        self.tail = pos;
    }

    fn members(&self) -> Vec<(u16, u32)> {
        let mut out = Vec::new();
        let mut p = self.head;
        while p != NO_LINK {
            out.push((p, self.len[p as usize]));
            p = self.link[p as usize];
        }
        out
    }
}

/// Streaming matcher over a compiled pattern without back-references.
pub struct ParallelMatcher<'r> {
    rx: &'r Rexel,
    anchored: bool,
    cur: Chain,
    nxt: Chain,
    act: Chain,
    consumed: u64,
    best: Option<MatchPos>,
    started: bool,
}

impl<'r> ParallelMatcher<'r> {
    /// Build a matcher. Patterns with back-references are refused; the
    /// caller must fall back to the backtracking executor.
    pub fn new(rx: &'r Rexel, anchored: bool) -> Result<Self, Error> {
        if rx.capabilities().contains(RexelCaps::NEEDS_BACKTRACK) {
            return Err(Error::NeedsBacktrack);
        }
        let n = rx.prog_len();
        Ok(Self {
            rx,
            anchored,
            cur: Chain::new(n),
            nxt: Chain::new(n),
            act: Chain::new(n),
            consumed: 0,
            best: None,
            started: false,
        })
    }

    /// Reset to the pre-input state, reusing the allocations.
    pub fn reset(&mut self) {
        self.cur.clear();
        self.nxt.clear();
        self.act.clear();
        self.consumed = 0;
        self.best = None;
        self.started = false;
    }

    /// Best match found so far.
    pub fn best(&self) -> Option<MatchPos> {
        self.best
    }

    /// Feed one code point (with the assertion bits of the boundary
    /// before it) or a bare assertion bitmask.
    pub fn step(&mut self, ch: Option<char>, flags: Assert) -> StepReport {
        let inject = if self.anchored { !self.started } else { self.best.is_none() };
        self.started = true;

        let mut sources = self.cur.members();
        if inject {
            sources.push((0, 0));
        }
        // Longest-length sources first, so first-wins marking leaves
        // every position with the longest length that reaches it.
        sources.sort_by(|a, b| b.1.cmp(&a.1));

        self.act.clear();
        for (pos, len) in sources {
            add(
                self.rx,
                &mut self.act,
                &mut self.best,
                self.consumed,
                pos,
                len,
                Some(flags),
            );
        }

        match ch {
            Some(c) => {
                self.nxt.clear();
                self.consumed += 1;
                let waiting = self.act.members();
                for (pos, len) in waiting {
                    if op_consumes(self.rx, pos as usize, c) {
                        add(
                            self.rx,
                            &mut self.nxt,
                            &mut self.best,
                            self.consumed,
                            pos + 1,
                            len + 1,
                            None,
                        );
                    }
                }
                std::mem::swap(&mut self.cur, &mut self.nxt);
            }
            None => {
                std::mem::swap(&mut self.cur, &mut self.act);
            }
        }

        let alive = !self.cur.is_empty();
        let can_extend = alive || (!self.anchored && self.best.is_none());
        StepReport { found: self.best, can_extend, dead: !can_extend }
    }

    /// Convenience: run the whole of `s`, computing boundary flags from
    /// the text itself, and return the best match in code points.
    pub fn match_str(&mut self, s: &str) -> Option<MatchPos> {
        let chars: Vec<char> = s.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            let r = self.step(Some(c), crate::flags_at(&chars, i, None));
            if r.dead {
                return r.found;
            }
        }
        self.step(None, crate::flags_at(&chars, chars.len(), None)).found
    }
}

/// Epsilon-closing insertion. `flags = None` defers assertions (they stay
/// in the chain awaiting the next boundary); `Some` resolves them now.
#[allow(clippy::too_many_arguments)]
fn add(
    rx: &Rexel,
    chain: &mut Chain,
    best: &mut Option<MatchPos>,
    boundary: u64,
    pos: u16,
    len: u32,
    flags: Option<Assert>,
) {
    // A thread that would start after a known match cannot improve on it.
    if let Some(b) = *best {
        if boundary - u64::from(len) > b.start {
            return;
        }
    }
    let idx = pos as usize;
    let prev = chain.len[idx];
    if prev != ABSENT && prev >= len {
        return;
    }
    let first_visit = prev == ABSENT;
    chain.len[idx] = len;
    match decode(rx.prog(idx)) {
        Op::Lit(_) | Op::Set(_) => {
            if first_visit {
                chain.append(pos);
            }
        }
        Op::Fixed(f) => match f {
            Fixed::Any | Fixed::AnyNl | Fixed::LaxSpace | Fixed::LaxDash => {
                if first_visit {
                    chain.append(pos);
                }
            }
            Fixed::None => {}
            Fixed::Match => record(best, boundary, len),
            Fixed::IgnCaseOn | Fixed::IgnCaseOff | Fixed::LaxOn | Fixed::LaxOff => {
                add(rx, chain, best, boundary, pos + 1, len, flags);
            }
            assert_op => match flags {
                Some(f) => {
                    if assert_holds(assert_op, f) {
                        add(rx, chain, best, boundary, pos + 1, len, flags);
                    }
                }
                None => {
                    if first_visit {
                        chain.append(pos);
                    }
                }
            },
        },
        Op::ForkFirst(t) => {
            add(rx, chain, best, boundary, t, len, flags);
            add(rx, chain, best, boundary, pos + 1, len, flags);
        }
        Op::ForkLast(t) => {
            add(rx, chain, best, boundary, pos + 1, len, flags);
            add(rx, chain, best, boundary, t, len, flags);
        }
        Op::CapStart(_) | Op::CapEnd(_) => {
            add(rx, chain, best, boundary, pos + 1, len, flags);
        }
        Op::Backref(_) => {
            // Unreachable: construction refused backref patterns.
            debug_assert!(false, "backref in parallel executor");
        }
    }
}

fn record(best: &mut Option<MatchPos>, boundary: u64, len: u32) {
    let start = boundary - u64::from(len);
    let better = match *best {
        None => true,
        Some(b) => start < b.start || (start == b.start && len > b.len),
    };
    if better {
        *best = Some(MatchPos { start, len });
    }
}

fn op_consumes(rx: &Rexel, pos: usize, c: char) -> bool {
    let mode = rx.mode(pos);
    match decode(rx.prog(pos)) {
        Op::Lit(l) => {
            let l = char::from_u32(l as u32).expect("literal below surrogate range");
            c == l || (mode.icase && fold(c) == fold(l))
        }
        Op::Set(off) => rx.set_matches(off, c, mode.icase),
        Op::Fixed(Fixed::Any) => c != '\n',
        Op::Fixed(Fixed::AnyNl) => true,
        Op::Fixed(Fixed::LaxSpace) => lax_space(c),
        Op::Fixed(Fixed::LaxDash) => lax_dash(c),
        _ => false,
    }
}

/// A waiting assertion holds when its bit (or a subsuming one) is set.
pub(crate) fn assert_holds(op: Fixed, flags: Assert) -> bool {
    match op {
        Fixed::Sol => flags.contains(Assert::SOL),
        Fixed::Eol => flags.contains(Assert::EOL),
        Fixed::Sow => flags.contains(Assert::SOW),
        Fixed::Eow => flags.contains(Assert::EOW),
        Fixed::Wbrk => flags.intersects(Assert::WBRK | Assert::SOW | Assert::EOW),
        Fixed::NoWbrk => flags.contains(Assert::NOWBRK),
        Fixed::Sod => flags.contains(Assert::SOD),
        Fixed::Eod => flags.contains(Assert::EOD),
        Fixed::Point => flags.contains(Assert::POINT),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rexel;

    fn matcher(pattern: &str) -> (Rexel, bool) {
        (Rexel::compile(pattern).expect("pattern compiles"), false)
    }

    fn find(pattern: &str, input: &str) -> Option<(u64, u32)> {
        let (rx, anchored) = matcher(pattern);
        let mut m = ParallelMatcher::new(&rx, anchored).unwrap();
        m.match_str(input).map(|p| (p.start, p.len))
    }

    #[test]
    fn star_then_literal_streams_and_dies() {
        let rx = Rexel::compile("a*b").unwrap();
        let mut m = ParallelMatcher::new(&rx, false).unwrap();
        let chars: Vec<char> = "aaab".chars().collect();
        let mut last = None;
        for (i, &c) in chars.iter().enumerate() {
            last = Some(m.step(Some(c), crate::flags_at(&chars, i, None)));
        }
        let after_b = last.unwrap();
        assert_eq!(after_b.found, Some(MatchPos { start: 0, len: 4 }));
        // One more character: dead end.
        let r = m.step(Some('x'), Assert::NOWBRK);
        assert!(r.dead);
        assert_eq!(r.found, Some(MatchPos { start: 0, len: 4 }));
    }

    #[test]
    fn leftmost_longest_retained() {
        assert_eq!(find("a+", "xxaaa"), Some((2, 3)));
        assert_eq!(find("a|ab", "ab"), Some((0, 2)));
        assert_eq!(find("ab|cd", "zcdz"), Some((1, 2)));
    }

    #[test]
    fn anchored_matcher_only_tries_origin() {
        let rx = Rexel::compile("ab").unwrap();
        let mut m = ParallelMatcher::new(&rx, true).unwrap();
        assert!(m.match_str("zab").is_none());
        m.reset();
        assert_eq!(m.match_str("ab"), Some(MatchPos { start: 0, len: 2 }));
    }

    #[test]
    fn line_anchors_from_computed_flags() {
        assert_eq!(find("^b.*$", "a\nbcd\ne"), Some((2, 3)));
        assert_eq!(find("^a", "ba"), None);
        assert_eq!(find("d$", "d\nx"), Some((0, 1)));
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(find(r"\bfox\b", "the fox jumps"), Some((4, 3)));
        assert_eq!(find(r"\bfox\b", "foxes"), None);
        assert_eq!(find(r"\<cat", "a catalog"), Some((2, 3)));
    }

    #[test]
    fn document_edges() {
        assert_eq!(find(r"\Ahey", "hey there"), Some((0, 3)));
        assert_eq!(find(r"\Ahey", "say hey"), None);
        assert_eq!(find(r"end\z", "the end"), Some((4, 3)));
    }

    #[test]
    fn point_assertion_is_caller_supplied() {
        let rx = Rexel::compile(r"a\@b").unwrap();
        let mut m = ParallelMatcher::new(&rx, false).unwrap();
        let chars: Vec<char> = "ab".chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            m.step(Some(c), crate::flags_at(&chars, i, Some(1)));
        }
        let r = m.step(None, crate::flags_at(&chars, 2, Some(1)));
        assert_eq!(r.found, Some(MatchPos { start: 0, len: 2 }));
        // Without the point flag the same pattern cannot match.
        m.reset();
        assert_eq!(m.match_str("ab"), None);
    }

    #[test]
    fn classes_and_case_folding() {
        assert_eq!(find("[0-9]+", "ab123cd"), Some((2, 3)));
        assert_eq!(find("(?i:rust)", "it is RuSt"), Some((6, 4)));
        assert_eq!(find("[^a-z]+", "abcDEF"), Some((3, 3)));
    }

    #[test]
    fn empty_matchable_loop_terminates() {
        // Nested empty-capable stars exercise the epsilon dedup.
        assert_eq!(find("(a*)*b", "aab"), Some((0, 3)));
        assert_eq!(find("(a*)*", "b"), Some((0, 0)));
    }

    #[test]
    fn counted_repeats() {
        assert_eq!(find("a{2,3}", "aaaa"), Some((0, 3)));
        assert_eq!(find("a{3}", "aa"), None);
        assert_eq!(find("(ab){2,}", "ababab"), Some((0, 6)));
    }

    #[test]
    fn non_greedy_does_not_change_parallel_semantics() {
        // The parallel executor reports leftmost-longest regardless of
        // fork priority; greediness matters to the backtracking engine.
        assert_eq!(find("a*?b", "aab"), Some((0, 3)));
    }

    #[test]
    fn dotall_flag() {
        assert_eq!(find("a.c", "a\nc"), None);
        assert_eq!(find("(?s:a.c)", "a\nc"), Some((0, 3)));
    }

    #[test]
    fn backref_pattern_is_refused() {
        let rx = Rexel::compile(r"(a)\1").unwrap();
        assert!(matches!(ParallelMatcher::new(&rx, false), Err(Error::NeedsBacktrack)));
    }
}
