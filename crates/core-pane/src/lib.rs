//! core-pane: the pane tree and the command runtime built on it.
//!
//! Everything the editor does travels as a named command through a tree of
//! panes. This crate provides:
//! * [`pane`] — the generational pane arena: geometry, z-order and
//!   occlusion, damage bits, focus paths, private data and attributes;
//! * [`comm`] — the fixed-shape context block every command invocation
//!   threads through its handlers;
//! * [`editor`] — the root object: dispatch (ancestor walk with
//!   fall-through), the process-wide command registry, pane lifecycle
//!   with deferred reclamation, and the per-tick refresh walk;
//! * [`notify`] — publish/subscribe between panes with visit-token
//!   iteration;
//! * [`selection`] — the window pane answering `window:*` and the
//!   selection claim/commit/discard protocol.
//!
//! The core is single-threaded and cooperative: handlers are `Rc`-shared,
//! never run concurrently, and must not block. Long-running work belongs
//! to an external event loop that calls back in with ordinary commands.

pub mod comm;
pub mod editor;
pub mod notify;
pub mod pane;
pub mod selection;

pub use comm::EventContext;
pub use editor::{command, handler_from, Editor};
pub use pane::{Command, CommandRef, Damage, Handler, PaneId, Tree};
