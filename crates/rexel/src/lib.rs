//! rexel: the regex engine behind search commands.
//!
//! A pattern compiles to a flat array of 16-bit elements (program region
//! plus deduplicated character-set region) and runs on one of two
//! executors over the same program:
//! * [`ParallelMatcher`] — a non-backtracking threaded-NFA that consumes
//!   one code point (or assertion bitmask) per step, built for
//!   incremental matching against streamed document content; it reports
//!   match-known / may-extend / dead-end per step so a search caller can
//!   stop feeding early;
//! * [`BacktrackMatcher`] — an explicit-stack walker over the same
//!   program supporting back-references, capture enumeration and
//!   replacement-template interpolation.
//!
//! Back-references (`\N`, `$N`) compile everywhere but set
//! [`RexelCaps::NEEDS_BACKTRACK`]; constructing a parallel matcher for
//! such a pattern is refused so callers opt into backtracking knowingly.
//!
//! The engine is deliberately free of any pane or document coupling:
//! zero-width assertions about lines, words, document edges and the
//! focus point arrive from the caller as [`Assert`] bits with each step
//! ([`flags_at`] computes them for in-memory char slices).

pub mod backtrack;
mod compile;
mod parse;
pub mod parallel;
mod program;

pub use backtrack::{interpolate, BacktrackMatcher, BtMatch, Captures};
pub use parallel::{MatchPos, ParallelMatcher, StepReport};
pub use program::{Assert, Rexel, RexelCaps};

/// Upper bound on `{m,n}` counted repetition (emitted by duplication).
pub(crate) const MAX_COUNTED_REPEAT: u32 = 255;
/// Upper bound on capture groups, from the 10-bit capture operand.
pub(crate) const MAX_GROUPS: u16 = 0x3FF;

/// Pattern compilation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("unbalanced bracket in character class")]
    UnbalancedBracket,
    #[error("malformed repetition")]
    BadRepeat,
    #[error("counted repetition too large")]
    RepeatTooLarge,
    #[error("malformed character class")]
    BadClass,
    #[error("unknown escape \\{0}")]
    BadEscape(char),
    #[error("trailing backslash")]
    TrailingBackslash,
    #[error("too many capture groups")]
    TooManyGroups,
    #[error("compiled program too large")]
    TooLarge,
    #[error("pattern needs the backtracking executor")]
    NeedsBacktrack,
}

/// Compilation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOpts {
    /// Emit capture ops (group 0 wraps the whole pattern).
    pub capture: bool,
    /// Start in case-folding mode.
    pub icase: bool,
    /// Start in lax mode (spaces and dashes match their families).
    pub lax: bool,
    /// Start in single-line mode (`.` matches newline).
    pub sline: bool,
}

impl Default for CompileOpts {
    fn default() -> Self {
        Self { capture: true, icase: false, lax: false, sline: false }
    }
}

impl Rexel {
    /// Compile with default options (captures on).
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        compile::compile(pattern, &CompileOpts::default())
    }

    /// Compile with explicit options.
    pub fn compile_with(pattern: &str, opts: &CompileOpts) -> Result<Self, Error> {
        compile::compile(pattern, opts)
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Assertion bits for the boundary before `chars[i]` (with `i == len`
/// meaning end of input). Word edges use the alphanumeric-or-underscore
/// rule; richer segmentation lives with the document layer.
pub fn flags_at(chars: &[char], i: usize, point: Option<usize>) -> Assert {
    let mut f = Assert::empty();
    if i == 0 {
        f |= Assert::SOD | Assert::SOL;
    } else if chars[i - 1] == '\n' {
        f |= Assert::SOL;
    }
    if i == chars.len() {
        f |= Assert::EOD | Assert::EOL;
    } else if chars[i] == '\n' {
        f |= Assert::EOL;
    }
    let w_prev = i > 0 && is_word(chars[i - 1]);
    let w_next = i < chars.len() && is_word(chars[i]);
    if !w_prev && w_next {
        f |= Assert::SOW | Assert::WBRK;
    } else if w_prev && !w_next {
        f |= Assert::EOW | Assert::WBRK;
    } else {
        f |= Assert::NOWBRK;
    }
    if point == Some(i) {
        f |= Assert::POINT;
    }
    f
}
