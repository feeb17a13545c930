//! core-doc: documents as panes.
//!
//! A document is a pane whose handler answers the `doc:*` command
//! vocabulary: stepping marks over content, reading characters,
//! replacing ranges (with mark maintenance completing before the edit
//! returns), saving, streaming content to a callback, and managing the
//! per-document view table. The pieces:
//! * [`contract`] — the [`contract::DocBackend`] trait, the shared
//!   document state, the generic pane handler decoding the vocabulary,
//!   and typed client helpers that speak it;
//! * [`text`] — the rope-backed reference document;
//! * [`utf8`] — code-point codec and boundary rounding for byte-oriented
//!   backends;
//! * [`words`] — assertion-flag scanning that feeds the regex engine's
//!   zero-width word/line/document assertions from document content.

pub mod contract;
pub mod text;
pub mod utf8;
pub mod words;

pub use contract::{
    add_view, attach, char_at, content, del_view, mark_dup, mark_free, mark_new, replace,
    set_ref, step, with_doc, DocBackend, DocData, DocState, MarkGroup, NOTIFY_REPLACE,
    NOTIFY_VIEW_CLOSED,
};
pub use text::TextDoc;
pub use words::FlagScanner;
