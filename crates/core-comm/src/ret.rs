//! Command return values.
//!
//! Every handler invoked through dispatch finishes by returning a code; no
//! handler unwinds. The integer encoding is reserved for interop (handlers
//! written against the wire-level convention), while in-process code deals
//! in [`CmdRet`] so the interesting cases are spelled out.
//!
//! Integer convention:
//! * `0` — fall-through: the handler chose not to act; dispatch continues
//!   up the tree and the dispatcher consumes this value.
//! * `>= 1` — success. Plain success is `1`; counts and enums use small
//!   positive values; a match length `n` is reported as `n + 1` so zero
//!   stays unambiguous.
//! * `<= -1000` — error kinds, one code per [`CmdErr`] variant.

/// Error kinds a handler may report. Ordering matches the reserved integer
/// codes starting at `-1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CmdErr {
    /// A required argument (mark, string, number) was absent.
    #[error("missing argument")]
    NoArg,
    /// The caller passed something malformed; a caller bug.
    #[error("invalid argument")]
    Inval,
    /// The operation is recognised but not supported here.
    #[error("unsupported operation")]
    NoSup,
    /// Runtime failure (e.g. file not found).
    #[error("operation failed")]
    Fail,
    /// The operation answered "no" non-fatally.
    #[error("negative result")]
    False,
    /// The value offered was not used by any handler.
    #[error("unused")]
    Unused,
}

/// Result of invoking a command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdRet {
    /// The handler declined; dispatch continues with the next candidate.
    Fallthrough,
    /// Success carrying a small positive payload (count, enum, length+1).
    /// Constructors keep the payload `>= 1`.
    Val(i32),
    /// Terminal failure, returned to the original caller.
    Err(CmdErr),
}

const ERR_BASE: i32 = -1000;

impl CmdRet {
    /// Generic success.
    pub fn success() -> Self {
        Self::Val(1)
    }

    /// Encode a boolean answer: `true` is success, `false` is the
    /// non-fatal [`CmdErr::False`].
    pub fn from_bool(b: bool) -> Self {
        if b { Self::success() } else { Self::Err(CmdErr::False) }
    }

    /// Encode a length result using the `length + 1` convention.
    pub fn from_len(len: usize) -> Self {
        Self::Val(i32::try_from(len).unwrap_or(i32::MAX - 1).saturating_add(1))
    }

    /// Decode a `length + 1` success back into a length.
    pub fn as_len(self) -> Option<usize> {
        match self {
            Self::Val(v) if v >= 1 => Some((v - 1) as usize),
            _ => None,
        }
    }

    /// True for any `Val`.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Val(_))
    }

    /// True for `Fallthrough`.
    pub fn is_fallthrough(self) -> bool {
        matches!(self, Self::Fallthrough)
    }

    /// The reserved integer encoding.
    pub fn to_code(self) -> i32 {
        match self {
            Self::Fallthrough => 0,
            Self::Val(v) => v.max(1),
            Self::Err(e) => ERR_BASE - e as i32,
        }
    }

    /// Decode a reserved integer. Codes in `(ERR_BASE - 5, 0)` exclusive of
    /// known errors have no meaning; they are mapped to [`CmdErr::Inval`]
    /// so a confused caller fails loudly rather than silently succeeding.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Fallthrough,
            v if v >= 1 => Self::Val(v),
            v => match ERR_BASE - v {
                0 => Self::Err(CmdErr::NoArg),
                1 => Self::Err(CmdErr::Inval),
                2 => Self::Err(CmdErr::NoSup),
                3 => Self::Err(CmdErr::Fail),
                4 => Self::Err(CmdErr::False),
                5 => Self::Err(CmdErr::Unused),
                _ => Self::Err(CmdErr::Inval),
            },
        }
    }
}

impl From<CmdErr> for CmdRet {
    fn from(e: CmdErr) -> Self {
        Self::Err(e)
    }
}
