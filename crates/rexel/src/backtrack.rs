//! Backtracking executor.
//!
//! Runs the same flat program as the parallel executor but walks it
//! depth-first with an explicit stack of fork records. Each record is the
//! `(program position, buffer position)` of a fork whose other side is
//! still unexplored; flipping records on failure reconstructs the exact
//! path of the current attempt, which is what back-references and capture
//! enumeration need.
//!
//! Back-references resolve their bounds by replaying the program along
//! the current record stack; captures of a finished match are enumerated
//! the same way, noting every capture start/end crossed. Exploration
//! continues past the first accepting path and keeps the longest match
//! (first found in priority order among equal lengths), so both
//! executors agree on start and length for patterns either can run.
//!
//! A visited-state memo bounds the search on back-reference-free
//! patterns; with back-references the memo is unsound (capture state
//! differentiates visits), so a step budget bounds the walk instead.

use std::collections::HashSet;

use crate::program::{decode, fold, lax_dash, lax_space, Fixed, Op, Rexel, RexelCaps};

const MAX_STEPS: u64 = 1 << 22;

/// Capture spans of one match, indexed by group (0 = whole match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captures {
    spans: Vec<Option<(u32, u32)>>,
}

impl Captures {
    /// Bounds of group `n` as char offsets into the input.
    pub fn get(&self, n: usize) -> Option<(usize, usize)> {
        let (s, e) = (*self.spans.get(n)?)?;
        Some((s as usize, e as usize))
    }

    /// Text of group `n`.
    pub fn text(&self, n: usize, chars: &[char]) -> Option<String> {
        let (s, e) = self.get(n)?;
        Some(chars[s..e].iter().collect())
    }

    /// Number of groups (including group 0).
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// A completed backtracking match.
#[derive(Debug, Clone)]
pub struct BtMatch {
    /// Match length in chars.
    pub len: u32,
    pub captures: Captures,
}

#[derive(Debug, Clone, Copy)]
struct Rec {
    fork_pos: u16,
    buf: u32,
    /// True once the lower-priority side is the one being explored.
    second: bool,
}

/// Backtracking matcher; handles every compiled pattern, including
/// back-references.
pub struct BacktrackMatcher<'r> {
    rx: &'r Rexel,
}

impl<'r> BacktrackMatcher<'r> {
    pub fn new(rx: &'r Rexel) -> Self {
        Self { rx }
    }

    /// Match anchored at char offset `at`. `point` is the focus-point
    /// offset for the `\@` assertion.
    pub fn match_at(&self, chars: &[char], at: usize, point: Option<usize>) -> Option<BtMatch> {
        let (len, trail) = self.run(chars, at, point)?;
        let captures = self.replay_captures(&trail, chars, at, None);
        Some(BtMatch { len, captures })
    }

    /// Scan forward from `from` for the first offset that matches.
    pub fn search(
        &self,
        chars: &[char],
        from: usize,
        point: Option<usize>,
    ) -> Option<(usize, BtMatch)> {
        for at in from..=chars.len() {
            if let Some(m) = self.match_at(chars, at, point) {
                return Some((at, m));
            }
        }
        None
    }

    fn run(&self, chars: &[char], at: usize, point: Option<usize>) -> Option<(u32, Vec<Rec>)> {
        let use_memo = !self.rx.capabilities().contains(RexelCaps::NEEDS_BACKTRACK);
        let mut memo: HashSet<(u16, u32)> = HashSet::new();
        let mut trail: Vec<Rec> = Vec::new();
        let mut best: Option<(u32, Vec<Rec>)> = None;
        let mut pos: usize = 0;
        let mut buf: usize = at;
        let mut steps: u64 = 0;
        loop {
            steps += 1;
            if steps > MAX_STEPS {
                break;
            }
            let mut fail = use_memo && !memo.insert((pos as u16, buf as u32));
            if !fail {
                match decode(self.rx.prog(pos)) {
                    Op::Lit(_) | Op::Set(_) => match chars.get(buf) {
                        Some(&c) if self.consumes(pos, c) => {
                            buf += 1;
                            pos += 1;
                        }
                        _ => fail = true,
                    },
                    Op::Fixed(f) => match f {
                        Fixed::Any | Fixed::AnyNl | Fixed::LaxSpace | Fixed::LaxDash => {
                            match chars.get(buf) {
                                Some(&c) if self.consumes(pos, c) => {
                                    buf += 1;
                                    pos += 1;
                                }
                                _ => fail = true,
                            }
                        }
                        Fixed::None => fail = true,
                        Fixed::Match => {
                            let len = (buf - at) as u32;
                            if best.as_ref().is_none_or(|(l, _)| len > *l) {
                                best = Some((len, trail.clone()));
                            }
                            // Keep exploring for a longer match.
                            fail = true;
                        }
                        Fixed::IgnCaseOn
                        | Fixed::IgnCaseOff
                        | Fixed::LaxOn
                        | Fixed::LaxOff => pos += 1,
                        assert_op => {
                            let flags = crate::flags_at(chars, buf, point);
                            if crate::parallel::assert_holds(assert_op, flags) {
                                pos += 1;
                            } else {
                                fail = true;
                            }
                        }
                    },
                    Op::ForkFirst(t) => {
                        trail.push(Rec { fork_pos: pos as u16, buf: buf as u32, second: false });
                        pos = t as usize;
                    }
                    Op::ForkLast(_) => {
                        trail.push(Rec { fork_pos: pos as u16, buf: buf as u32, second: false });
                        pos += 1;
                    }
                    Op::CapStart(_) | Op::CapEnd(_) => pos += 1,
                    Op::Backref(n) => {
                        let caps = self.replay_captures(
                            &trail,
                            chars,
                            at,
                            Some((pos as u16, buf as u32)),
                        );
                        let icase = self.rx.mode(pos).icase;
                        match backref_len(&caps, n as usize, chars, buf, icase) {
                            Some(blen) => {
                                buf += blen;
                                pos += 1;
                            }
                            None => fail = true,
                        }
                    }
                }
            }
            if fail {
                let resumed = loop {
                    match trail.pop() {
                        None => break false,
                        Some(rec) if rec.second => continue,
                        Some(rec) => {
                            let other = match decode(self.rx.prog(rec.fork_pos as usize)) {
                                Op::ForkFirst(_) => rec.fork_pos as usize + 1,
                                Op::ForkLast(t) => t as usize,
                                _ => unreachable!("trail records are forks"),
                            };
                            trail.push(Rec { second: true, ..rec });
                            pos = other;
                            buf = rec.buf as usize;
                            break true;
                        }
                    }
                };
                if !resumed {
                    break;
                }
            }
        }
        best
    }

    fn consumes(&self, pos: usize, c: char) -> bool {
        let mode = self.rx.mode(pos);
        match decode(self.rx.prog(pos)) {
            Op::Lit(l) => {
                let l = char::from_u32(l as u32).expect("literal below surrogate range");
                c == l || (mode.icase && fold(c) == fold(l))
            }
            Op::Set(off) => self.rx.set_matches(off, c, mode.icase),
            Op::Fixed(Fixed::Any) => c != '\n',
            Op::Fixed(Fixed::AnyNl) => true,
            Op::Fixed(Fixed::LaxSpace) => lax_space(c),
            Op::Fixed(Fixed::LaxDash) => lax_dash(c),
            _ => false,
        }
    }

    /// Re-execute the program along `trail`, recording capture marks.
    /// With `stop` set, replay halts at that (program, buffer) state and
    /// yields the captures in force there (back-reference resolution);
    /// otherwise replay runs to the terminal op.
    fn replay_captures(
        &self,
        trail: &[Rec],
        chars: &[char],
        at: usize,
        stop: Option<(u16, u32)>,
    ) -> Captures {
        let ncap = self.rx.ncaptures().max(1) as usize;
        let mut starts: Vec<Option<u32>> = vec![None; ncap];
        let mut spans: Vec<Option<(u32, u32)>> = vec![None; ncap];
        let mut next_rec = 0usize;
        let mut pos: usize = 0;
        let mut buf: usize = at;
        loop {
            if stop == Some((pos as u16, buf as u32)) {
                break;
            }
            match decode(self.rx.prog(pos)) {
                Op::Lit(_) | Op::Set(_) => {
                    buf += 1;
                    pos += 1;
                }
                Op::Fixed(f) => match f {
                    Fixed::Any | Fixed::AnyNl | Fixed::LaxSpace | Fixed::LaxDash => {
                        buf += 1;
                        pos += 1;
                    }
                    Fixed::Match => break,
                    Fixed::None => unreachable!("replayed path died"),
                    _ => pos += 1,
                },
                Op::ForkFirst(t) | Op::ForkLast(t) => {
                    let rec = trail[next_rec];
                    debug_assert_eq!(rec.fork_pos as usize, pos, "trail out of sync");
                    next_rec += 1;
                    // A first-priority fork explores its target first, a
                    // last-priority fork its continuation; `second` means
                    // the other side was taken.
                    let target_first = matches!(decode(self.rx.prog(pos)), Op::ForkFirst(_));
                    pos = if target_first != rec.second { t as usize } else { pos + 1 };
                }
                Op::CapStart(n) => {
                    if let Some(slot) = starts.get_mut(n as usize) {
                        *slot = Some(buf as u32);
                    }
                    pos += 1;
                }
                Op::CapEnd(n) => {
                    let n = n as usize;
                    if let Some(start) = starts.get(n).copied().flatten() {
                        if let Some(slot) = spans.get_mut(n) {
                            *slot = Some((start, buf as u32));
                        }
                    }
                    pos += 1;
                }
                Op::Backref(n) => {
                    let caps = Captures { spans: spans.clone() };
                    let icase = self.rx.mode(pos).icase;
                    let blen = backref_len(&caps, n as usize, chars, buf, icase)
                        .expect("replayed backref matched before");
                    buf += blen;
                    pos += 1;
                }
            }
        }
        Captures { spans }
    }
}

/// Length consumed by back-reference `n` at `buf`, or `None` on
/// mismatch. An unset group matches the empty string.
fn backref_len(
    caps: &Captures,
    n: usize,
    chars: &[char],
    buf: usize,
    icase: bool,
) -> Option<usize> {
    let Some((s, e)) = caps.get(n) else { return Some(0) };
    let want = &chars[s..e];
    let have = chars.get(buf..buf + want.len())?;
    let eq = want
        .iter()
        .zip(have)
        .all(|(a, b)| a == b || (icase && fold(*a) == fold(*b)));
    eq.then_some(want.len())
}

/// Substitute `\N` and `\:N:M` capture references in a replacement
/// template; `\:N:M` truncates group `N` to at most `M` chars. `\\`
/// escapes a literal backslash.
pub fn interpolate(template: &str, chars: &[char], caps: &Captures) -> String {
    let mut out = String::new();
    let tchars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < tchars.len() {
        if tchars[i] != '\\' || i + 1 == tchars.len() {
            out.push(tchars[i]);
            i += 1;
            continue;
        }
        match tchars[i + 1] {
            '\\' => {
                out.push('\\');
                i += 2;
            }
            d @ '0'..='9' => {
                if let Some(text) = caps.text(d as usize - '0' as usize, chars) {
                    out.push_str(&text);
                }
                i += 2;
            }
            ':' => {
                // \:N:M
                let mut j = i + 2;
                let mut n = 0usize;
                let mut saw_n = false;
                while j < tchars.len() && tchars[j].is_ascii_digit() {
                    n = n * 10 + (tchars[j] as usize - '0' as usize);
                    saw_n = true;
                    j += 1;
                }
                if saw_n && j < tchars.len() && tchars[j] == ':' {
                    j += 1;
                    let mut m = 0usize;
                    let mut saw_m = false;
                    while j < tchars.len() && tchars[j].is_ascii_digit() {
                        m = m * 10 + (tchars[j] as usize - '0' as usize);
                        saw_m = true;
                        j += 1;
                    }
                    if saw_m {
                        if let Some(text) = caps.text(n, chars) {
                            out.extend(text.chars().take(m));
                        }
                        i = j;
                        continue;
                    }
                }
                // Malformed: emit verbatim.
                out.push('\\');
                i += 1;
            }
            c => {
                out.push(c);
                i += 2;
            }
        }
    }
    out
}
