//! The notification bus.
//!
//! A pane publishes named events to the panes that subscribed to it.
//! Links live on the publisher (`notifiees`) with a mirror entry on the
//! subscriber (`notifiers`) so either side's close can withdraw them.
//!
//! Delivery rules:
//! * subscribers are visited in registration order;
//! * a success result consumes the notification and stops the walk;
//! * fall-through and error results let the walk continue (the last error
//!   is reported if nobody consumed);
//! * a subscriber that has closed is skipped, its link marked dead and
//!   reaped by a later walk once no walk is iterating the list.
//!
//! Re-entrancy: each walk draws a fresh token from a monotonic counter and
//! stamps every link it delivers through. A link is only delivered when
//! its stamp is below the walk's token, so a re-entrant walk over the same
//! publisher neither repeats a delivery another walk already made nor
//! skips a link no walk has reached; links added mid-walk carry stamp zero
//! and are picked up exactly once.

use core_comm::CmdRet;
use tracing::{debug, trace};

use crate::comm::EventContext;
use crate::editor::Editor;
use crate::pane::{NotifyLink, PaneId};

impl Editor {
    /// Subscribe `sink` to notifications named `name` published by
    /// `source`. Duplicate subscriptions collapse to one link.
    pub fn add_notify(&mut self, sink: PaneId, source: PaneId, name: &str) -> bool {
        let (Some(sidx), Some(kidx)) = (self.tree.resolve(source), self.tree.resolve(sink)) else {
            return false;
        };
        if self.tree.pane(sidx).closed() || self.tree.pane(kidx).closed() {
            return false;
        }
        let exists = self
            .tree
            .pane(sidx)
            .notifiees
            .iter()
            .any(|l| !l.dead && l.name == name && self.tree.resolve(l.sink) == Some(kidx));
        if exists {
            return true;
        }
        let sink_id = self.tree.id_of(kidx);
        self.tree.pane_mut(sidx).notifiees.push(NotifyLink {
            name: name.to_string(),
            sink: sink_id,
            token: 0,
            dead: false,
        });
        self.tree.pane_mut(kidx).notifiers.push((name.to_string(), sidx));
        debug!(target: "notify", source = sidx, sink = kidx, name, "subscribe");
        true
    }

    /// Withdraw a subscription.
    pub fn drop_notify(&mut self, sink: PaneId, source: PaneId, name: &str) {
        let (Some(sidx), Some(kidx)) = (self.tree.resolve(source), self.tree.resolve(sink)) else {
            return;
        };
        self.drop_notify_idx(sidx, kidx, name);
        self.tree
            .pane_mut(kidx)
            .notifiers
            .retain(|(n, s)| !(n == name && *s == sidx));
    }

    /// Mark the matching publisher-side link dead; reaped lazily.
    pub(crate) fn drop_notify_idx(&mut self, source_idx: u32, sink_idx: u32, name: &str) {
        let sink_live = self.tree.id_of(sink_idx);
        for link in &mut self.tree.pane_mut(source_idx).notifiees {
            if link.name == name && link.sink == sink_live {
                link.dead = true;
            }
        }
    }

    /// Number of live subscriptions `source` publishes to (diagnostic).
    pub fn notifiee_count(&self, source: PaneId) -> usize {
        match self.tree.resolve(source) {
            Some(idx) => self.tree.pane(idx).notifiees.iter().filter(|l| !l.dead).count(),
            None => 0,
        }
    }

    /// Publish `ctx.key` from `source` to its subscribers.
    pub fn notify(&mut self, source: PaneId, ctx: &mut EventContext) -> CmdRet {
        let Some(sidx) = self.tree.resolve(source) else {
            return CmdRet::Fallthrough;
        };
        // Hold a dispatch frame for the whole walk so a subscriber closing
        // the publisher cannot trigger the sweep mid-iteration.
        self.begin_dispatch();
        // Reap dead links only when no walk is mid-iteration.
        if self.tree.pane(sidx).walks == 0 {
            self.tree.pane_mut(sidx).notifiees.retain(|l| !l.dead);
        }
        self.notify_token += 1;
        let walk = self.notify_token;
        self.tree.pane_mut(sidx).walks += 1;
        let mut last_err: Option<CmdRet> = None;
        let mut consumed: Option<CmdRet> = None;
        loop {
            // Rescan each round: handlers may add or drop links mid-walk.
            let next = self.tree.pane(sidx).notifiees.iter().position(|l| {
                !l.dead && l.token < walk && l.name == ctx.key
            });
            let Some(pos) = next else { break };
            self.tree.pane_mut(sidx).notifiees[pos].token = walk;
            let link = self.tree.pane_mut(sidx).notifiees[pos].clone();
            let Some(kidx) = self.tree.resolve(link.sink) else {
                self.tree.pane_mut(sidx).notifiees[pos].dead = true;
                continue;
            };
            if self.tree.pane(kidx).closed() {
                self.tree.pane_mut(sidx).notifiees[pos].dead = true;
                continue;
            }
            trace!(target: "notify", source = sidx, sink = kidx, key = %ctx.key, "deliver");
            let mut delivery = ctx.clone();
            delivery.focus = source;
            let ret = self.call_pane(link.sink, &mut delivery);
            match ret {
                CmdRet::Val(_) => {
                    consumed = Some(ret);
                    break;
                }
                CmdRet::Err(_) => last_err = Some(ret),
                CmdRet::Fallthrough => {}
            }
        }
        if let Some(sidx) = self.tree.resolve(source) {
            self.tree.pane_mut(sidx).walks -= 1;
        }
        self.end_dispatch();
        consumed.or(last_err).unwrap_or(CmdRet::Fallthrough)
    }
}
