//! Emission of the flat program.
//!
//! The sizing pass of the original two-pass scheme collapses into vector
//! growth; fork targets are emitted as placeholders and patched once the
//! destination is known. Repetition is laid down by duplicating the
//! operand: counted forms emit `min` mandatory copies plus optional
//! copies forking to a shared exit, unbounded forms close with a loop
//! fork whose priority bit encodes greediness. An unconditional transfer
//! (end of an alternation branch) is a priority fork whose continuation
//! is the never-matching op.
//!
//! After emission a linear scan of the toggle opcodes derives the
//! per-position match mode consulted by both executors; scopes are
//! contiguous in the program, so program order is scan order.

use tracing::trace;

use crate::parse::{self, AssertOp, ClassItem, ClassSpec, Flags, Node};
use crate::program::{
    ClassBits, Fixed, Mode, Rexel, RexelCaps, BACKREF, CAP_END, CAP_START, FIXED, FORK_FIRST,
    FORK_LAST, FORK_TARGET_MASK, LIT_MAX, SET, SET_NEGATE, SET_OFF_MASK,
};
use crate::{CompileOpts, Error};

pub(crate) fn compile(pattern: &str, opts: &CompileOpts) -> Result<Rexel, Error> {
    let initial = Flags {
        icase: opts.icase,
        lax: opts.lax,
        sline: opts.sline,
        nocap: !opts.capture,
    };
    let parsed = parse::parse(pattern, initial)?;
    let mut e = Emitter { prog: Vec::new(), sets: Vec::new() };
    if opts.capture {
        e.push(CAP_START)?;
    }
    e.emit(&parsed.node)?;
    if opts.capture {
        e.push(CAP_END)?;
    }
    e.push(FIXED | Fixed::Match as u16)?;
    if e.sets.len() > SET_OFF_MASK as usize {
        return Err(Error::TooLarge);
    }

    let prog_len = e.prog.len();
    let modes = derive_modes(&e.prog, opts.icase);
    let mut elems = Vec::with_capacity(1 + prog_len + e.sets.len());
    elems.push(prog_len as u16);
    elems.extend_from_slice(&e.prog);
    elems.extend_from_slice(&e.sets);

    let mut caps = RexelCaps::empty();
    if parsed.has_backref {
        caps |= RexelCaps::NEEDS_BACKTRACK;
    }
    if opts.capture {
        caps |= RexelCaps::CAPTURES;
    }
    let ncaptures = if opts.capture { parsed.groups + 1 } else { 0 };
    trace!(target: "rexel", pattern, prog_len, sets = elems.len() - 1 - prog_len, ncaptures, "compiled");
    Ok(Rexel { elems, modes, ncaptures, caps })
}

struct Emitter {
    prog: Vec<u16>,
    sets: Vec<u16>,
}

impl Emitter {
    fn push(&mut self, word: u16) -> Result<usize, Error> {
        if self.prog.len() > FORK_TARGET_MASK as usize {
            return Err(Error::TooLarge);
        }
        self.prog.push(word);
        Ok(self.prog.len() - 1)
    }

    fn here(&self) -> usize {
        self.prog.len()
    }

    /// Emit a fork with a placeholder target; patch later.
    fn fork(&mut self, first: bool) -> Result<usize, Error> {
        self.push(if first { FORK_FIRST } else { FORK_LAST })
    }

    fn patch(&mut self, at: usize, target: usize) -> Result<(), Error> {
        if target > FORK_TARGET_MASK as usize {
            return Err(Error::TooLarge);
        }
        self.prog[at] |= target as u16;
        Ok(())
    }

    /// Unconditional transfer: a priority fork whose continuation dies.
    fn jump(&mut self) -> Result<usize, Error> {
        let at = self.fork(true)?;
        self.push(FIXED | Fixed::None as u16)?;
        Ok(at)
    }

    fn emit(&mut self, node: &Node) -> Result<(), Error> {
        match node {
            Node::Empty => Ok(()),
            Node::Char(c) => self.emit_char(*c),
            Node::Any { nl } => {
                self.push(FIXED | if *nl { Fixed::AnyNl } else { Fixed::Any } as u16)?;
                Ok(())
            }
            Node::Class(spec) => {
                let off = self.intern_set(spec)?;
                self.push(SET | off)?;
                Ok(())
            }
            Node::Assert(op) => {
                let fixed = match op {
                    AssertOp::Sol => Fixed::Sol,
                    AssertOp::Eol => Fixed::Eol,
                    AssertOp::Sow => Fixed::Sow,
                    AssertOp::Eow => Fixed::Eow,
                    AssertOp::Wbrk => Fixed::Wbrk,
                    AssertOp::NoWbrk => Fixed::NoWbrk,
                    AssertOp::Sod => Fixed::Sod,
                    AssertOp::Eod => Fixed::Eod,
                    AssertOp::Point => Fixed::Point,
                };
                self.push(FIXED | fixed as u16)?;
                Ok(())
            }
            Node::LaxSpace => {
                self.push(FIXED | Fixed::LaxSpace as u16)?;
                Ok(())
            }
            Node::LaxDash => {
                self.push(FIXED | Fixed::LaxDash as u16)?;
                Ok(())
            }
            Node::IgnCase(on) => {
                self.push(FIXED | if *on { Fixed::IgnCaseOn } else { Fixed::IgnCaseOff } as u16)?;
                Ok(())
            }
            Node::Lax(on) => {
                self.push(FIXED | if *on { Fixed::LaxOn } else { Fixed::LaxOff } as u16)?;
                Ok(())
            }
            Node::Seq(items) => {
                for item in items {
                    self.emit(item)?;
                }
                Ok(())
            }
            Node::Alt(branches) => self.emit_alt(branches),
            Node::Repeat { node, min, max, greedy } => self.emit_repeat(node, *min, *max, *greedy),
            Node::Capture { group, node } => {
                self.push(CAP_START | group)?;
                self.emit(node)?;
                self.push(CAP_END | group)?;
                Ok(())
            }
            Node::Backref(n) => {
                self.push(BACKREF | n)?;
                Ok(())
            }
        }
    }

    fn emit_char(&mut self, c: char) -> Result<(), Error> {
        if (c as u32) <= LIT_MAX as u32 {
            self.push(c as u16)?;
        } else {
            // Beyond the direct range: a one-member set.
            let spec = ClassSpec { negate: false, items: vec![ClassItem::Char(c)] };
            let off = self.intern_set(&spec)?;
            self.push(SET | off)?;
        }
        Ok(())
    }

    fn emit_alt(&mut self, branches: &[Node]) -> Result<(), Error> {
        let mut exits = Vec::new();
        let mut pending_fork: Option<usize> = None;
        for (i, branch) in branches.iter().enumerate() {
            if let Some(f) = pending_fork.take() {
                let here = self.here();
                self.patch(f, here)?;
            }
            let last = i + 1 == branches.len();
            if !last {
                // Try this branch now, the rest later.
                pending_fork = Some(self.fork(false)?);
            }
            self.emit(branch)?;
            if !last {
                exits.push(self.jump()?);
            }
        }
        let end = self.here();
        for at in exits {
            self.patch(at, end)?;
        }
        Ok(())
    }

    fn emit_repeat(
        &mut self,
        node: &Node,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<(), Error> {
        for _ in 0..min {
            self.emit(node)?;
        }
        match max {
            Some(n) => {
                // Optional copies all escape to a shared exit.
                let mut outs = Vec::new();
                for _ in min..n {
                    outs.push(self.fork(!greedy)?);
                    self.emit(node)?;
                }
                let end = self.here();
                for at in outs {
                    self.patch(at, end)?;
                }
            }
            None => {
                // Loop head skips, loop tail returns.
                let head = self.fork(!greedy)?;
                self.emit(node)?;
                let tail = self.fork(greedy)?;
                self.patch(tail, head)?;
                let end = self.here();
                self.patch(head, end)?;
            }
        }
        Ok(())
    }

    /// Build the word encoding of a class and deduplicate against the set
    /// region. Returns the region offset.
    fn intern_set(&mut self, spec: &ClassSpec) -> Result<u16, Error> {
        let words = encode_set(spec)?;
        // Dedup: look for an existing identical encoding.
        let mut i = 0usize;
        while i < self.sets.len() {
            let len = set_len(&self.sets[i..]);
            if self.sets[i..i + len] == words[..] {
                return Ok(i as u16);
            }
            i += len;
        }
        let off = self.sets.len();
        if off + words.len() > SET_OFF_MASK as usize + 1 {
            return Err(Error::TooLarge);
        }
        self.sets.extend_from_slice(&words);
        Ok(off as u16)
    }
}

/// Length in words of the set starting at `words[0]`.
fn set_len(words: &[u16]) -> usize {
    let nplanes = words[1] as usize;
    let mut len = 2;
    for _ in 0..nplanes {
        let npairs = words[len + 1] as usize;
        len += 2 + npairs * 2;
    }
    len
}

fn encode_set(spec: &ClassSpec) -> Result<Vec<u16>, Error> {
    let mut classes = ClassBits::empty();
    // Collect ranges as (plane, lo, hi) triples, then sort and merge per
    // plane so the stored arrays are strictly sorted and disjoint.
    let mut ranges: Vec<(u16, u16, u16)> = Vec::new();
    let mut add_range = |lo: u32, hi: u32, ranges: &mut Vec<(u16, u16, u16)>| {
        let (mut lo, hi) = (lo, hi);
        while lo <= hi {
            let plane = lo >> 16;
            let plane_end = (plane << 16) | 0xFFFF;
            let seg_hi = hi.min(plane_end);
            ranges.push((plane as u16, (lo & 0xFFFF) as u16, (seg_hi & 0xFFFF) as u16));
            if seg_hi == hi {
                break;
            }
            lo = seg_hi + 1;
        }
    };
    for item in &spec.items {
        match item {
            ClassItem::Char(c) => add_range(*c as u32, *c as u32, &mut ranges),
            ClassItem::Range(lo, hi) => add_range(*lo as u32, *hi as u32, &mut ranges),
            ClassItem::Class(bits) => classes |= *bits,
        }
    }
    ranges.sort_unstable();
    let mut merged: Vec<(u16, u16, u16)> = Vec::new();
    for (p, lo, hi) in ranges {
        match merged.last_mut() {
            Some((mp, _, mhi)) if *mp == p && lo <= mhi.saturating_add(1) => {
                *mhi = (*mhi).max(hi);
            }
            _ => merged.push((p, lo, hi)),
        }
    }
    let mut words = vec![
        classes.bits() | if spec.negate { SET_NEGATE } else { 0 },
        0,
    ];
    let mut nplanes = 0u16;
    let mut i = 0;
    while i < merged.len() {
        let plane = merged[i].0;
        let start = i;
        while i < merged.len() && merged[i].0 == plane {
            i += 1;
        }
        words.push(plane);
        words.push((i - start) as u16);
        for &(_, lo, hi) in &merged[start..i] {
            words.push(lo);
            words.push(hi);
        }
        nplanes += 1;
    }
    words[1] = nplanes;
    Ok(words)
}

/// Walk the program once, tracking toggle state into the per-position
/// mode table. A position's mode is the state in force before it runs.
fn derive_modes(prog: &[u16], icase0: bool) -> Vec<Mode> {
    let mut modes = Vec::with_capacity(prog.len());
    let mut icase = icase0;
    for &word in prog {
        modes.push(Mode { icase });
        match crate::program::decode(word) {
            crate::program::Op::Fixed(Fixed::IgnCaseOn) => icase = true,
            crate::program::Op::Fixed(Fixed::IgnCaseOff) => icase = false,
            _ => {}
        }
    }
    modes
}
