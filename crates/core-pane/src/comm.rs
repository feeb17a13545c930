//! The command context.
//!
//! Every dispatch threads one fixed-shape parameter block through the
//! handlers it visits. Fields are deliberately generic — two numbers, two
//! marks, two strings, a coordinate pair, and up to two command references
//! — because the same block serves movement, rendering, editing, queries
//! and notifications alike. `comm2` is the continuation slot: a handler
//! that must return structured data calls back into the caller through it
//! instead of encoding the data in the return value.

use core_mark::MarkId;

use crate::pane::{CommandRef, PaneId};

/// Parameter block for one command invocation.
#[derive(Clone)]
pub struct EventContext {
    /// The command key being dispatched.
    pub key: String,
    /// Pane whose handler is currently running. Set by the dispatcher.
    pub home: PaneId,
    /// Pane the caller addressed.
    pub focus: PaneId,
    pub num: i32,
    pub num2: i32,
    pub mark: Option<MarkId>,
    pub mark2: Option<MarkId>,
    pub str_: Option<String>,
    pub str2: Option<String>,
    pub x: i32,
    pub y: i32,
    /// The command being invoked, for chained handlers.
    pub comm: Option<CommandRef>,
    /// Caller-supplied callback continuation.
    pub comm2: Option<CommandRef>,
}

impl EventContext {
    /// A fresh context addressing `focus`. `home` starts equal to `focus`
    /// and is rewritten by the dispatcher for each handler it runs.
    pub fn new(key: impl Into<String>, focus: PaneId) -> Self {
        Self {
            key: key.into(),
            home: focus,
            focus,
            num: 0,
            num2: 0,
            mark: None,
            mark2: None,
            str_: None,
            str2: None,
            x: 0,
            y: 0,
            comm: None,
            comm2: None,
        }
    }

    pub fn with_num(mut self, num: i32) -> Self {
        self.num = num;
        self
    }

    pub fn with_num2(mut self, num2: i32) -> Self {
        self.num2 = num2;
        self
    }

    pub fn with_mark(mut self, mark: MarkId) -> Self {
        self.mark = Some(mark);
        self
    }

    pub fn with_mark2(mut self, mark2: MarkId) -> Self {
        self.mark2 = Some(mark2);
        self
    }

    pub fn with_str(mut self, s: impl Into<String>) -> Self {
        self.str_ = Some(s.into());
        self
    }

    pub fn with_str2(mut self, s: impl Into<String>) -> Self {
        self.str2 = Some(s.into());
        self
    }

    pub fn with_xy(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_comm2(mut self, comm2: CommandRef) -> Self {
        self.comm2 = Some(comm2);
        self
    }
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("key", &self.key)
            .field("home", &self.home)
            .field("focus", &self.focus)
            .field("num", &self.num)
            .field("num2", &self.num2)
            .field("mark", &self.mark)
            .field("mark2", &self.mark2)
            .field("str_", &self.str_)
            .field("str2", &self.str2)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("comm", &self.comm.as_ref().map(|_| ".."))
            .field("comm2", &self.comm2.as_ref().map(|_| ".."))
            .finish()
    }
}
