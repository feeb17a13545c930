//! Reserved command-key namespaces.
//!
//! Keys are plain ASCII strings; these constants pin down the namespaces
//! that make independently-written panes interoperable. Everything outside
//! these prefixes is free for private use between cooperating panes.

/// Operations every document pane must implement.
pub const DOC_PREFIX: &str = "doc:";
/// Events a document publishes; subscribed via [`DOC_REQUEST_PREFIX`].
pub const DOC_NOTIFY_PREFIX: &str = "doc:notify:";
/// Subscribe to a document notification: `doc:request:<name>`.
pub const DOC_REQUEST_PREFIX: &str = "doc:request:";
/// Events published between arbitrary panes.
pub const NOTIFY_PREFIX: &str = "Notify:";
/// Per-window attribute and selection surface.
pub const WINDOW_PREFIX: &str = "window:";
/// Subscribe to a window notification: `window:request:<name>`.
pub const WINDOW_REQUEST_PREFIX: &str = "window:request:";
/// Publish a window notification: `window:notify:<name>`.
pub const WINDOW_NOTIFY_PREFIX: &str = "window:notify:";

/// Claim ownership of the selection (num=1 installs a fallback owner).
pub const SELECTION_CLAIM: &str = "selection:claim";
/// Ask the owner to publish the selection content to the committer.
pub const SELECTION_COMMIT: &str = "selection:commit";
/// Release the selection; succeeds only for the current owner.
pub const SELECTION_DISCARD: &str = "selection:discard";
/// Notification delivered to a displaced selection owner.
pub const SELECTION_CLAIMED: &str = "Notify:selection:claimed";
/// Notification asking the owner to deliver content through `comm2`.
pub const SELECTION_COMMIT_NOTIFY: &str = "Notify:selection:commit";

/// Movement command family.
pub const MOVE_PREFIX: &str = "Move-";
/// Drawing command family.
pub const DRAW_PREFIX: &str = "Draw:";
/// Apply an edit between two marks.
pub const REPLACE: &str = "Replace";
/// Cooperative cancellation; handlers stop outstanding work on receipt.
pub const ABORT: &str = "Abort";
/// Surface text on the message line via the focus chain.
pub const MESSAGE: &str = "Message";
/// Per-tick refresh delivered during the damage walk.
pub const REFRESH: &str = "Refresh";
/// Delivered to a parent when one of its children closed.
pub const CHILD_CLOSED: &str = "ChildClosed";
/// Notification delivered to subscribers of a closing pane.
pub const NOTIFY_CLOSE: &str = "Notify:Close";

/// Register a command in the process-wide registry.
pub const GLOBAL_SET_COMMAND: &str = "global-set-command";
/// Chain a keymap into the process-wide registry.
pub const GLOBAL_SET_KEYMAP: &str = "global-set-keymap";
/// Set an editor-wide attribute.
pub const GLOBAL_SET_ATTR: &str = "global-set-attr";
