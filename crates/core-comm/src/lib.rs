//! Shared command vocabulary for the pane/command runtime.
//!
//! This crate is the dependency-light hub the rest of the workspace speaks
//! through:
//! * [`ret`] — typed command results mirroring the reserved integer codes
//!   every handler returns through dispatch;
//! * [`keys`] — the reserved key namespaces that make string-keyed commands
//!   interoperable between unrelated panes;
//! * [`keyname`] — the normative encoding of key and mouse events as
//!   command-key strings.
//!
//! Nothing here knows about panes, marks or documents; those crates depend
//! on this one, never the reverse.

pub mod keyname;
pub mod keys;
pub mod ret;

pub use keyname::{KeyName, KeyNameError, MouseAction, NamedKey};
pub use ret::{CmdErr, CmdRet};
