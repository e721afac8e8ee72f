//! Capture-side tracking of in-flight rays.
//!
//! Each broadcast capture is tracked by `request_id` together with the
//! connections it reached that have not answered yet. A reply clears its
//! own connection; a display that goes away clears itself only from the
//! captures it was still expected to answer. An entry is retired when
//! nobody is left to answer or its deadline passes. Expiry only retires
//! the entry: nothing is ever resent.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use crate::network::ConnectionId;

/// A broadcast capture awaiting replies.
#[derive(Debug, Clone)]
pub struct PendingCapture {
    pub target_id: String,
    pub sent_at: Instant,
    /// Optional deadline; `None` means no timeout.
    pub deadline: Option<Duration>,
    /// Connections the capture reached that still owe a reply.
    pub awaiting: BTreeSet<ConnectionId>,
    pub replies: usize,
}

impl PendingCapture {
    /// Returns `true` if this capture has exceeded its deadline.
    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(d) => self.sent_at.elapsed() > d,
            None => false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.sent_at.elapsed()
    }

    /// Replies received plus replies still owed.
    pub fn expected_replies(&self) -> usize {
        self.replies + self.awaiting.len()
    }
}

/// How an incoming reply relates to the tracked captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMatch {
    pub target_id: String,
    /// 1-based position of this reply among replies to the same capture.
    pub reply_index: usize,
    pub expected_replies: usize,
    /// Round-trip time since the capture was broadcast.
    pub elapsed: Duration,
}

impl ReplyMatch {
    pub fn is_last(&self) -> bool {
        self.reply_index >= self.expected_replies
    }
}

#[derive(Debug, Default)]
pub struct PendingCaptures {
    requests: HashMap<u64, PendingCapture>,
    default_timeout: Option<Duration>,
}

impl PendingCaptures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            default_timeout: Some(timeout),
        }
    }

    /// Track a capture about to be sent to `reached`.
    /// A capture that reaches nobody is not tracked.
    pub fn track(
        &mut self,
        request_id: u64,
        target_id: impl Into<String>,
        reached: impl IntoIterator<Item = ConnectionId>,
    ) {
        let awaiting: BTreeSet<ConnectionId> = reached.into_iter().collect();
        if awaiting.is_empty() {
            return;
        }
        self.requests.insert(
            request_id,
            PendingCapture {
                target_id: target_id.into(),
                sent_at: Instant::now(),
                deadline: self.default_timeout,
                awaiting,
                replies: 0,
            },
        );
    }

    /// Narrow a capture to the connections it was actually delivered to.
    ///
    /// Captures are tracked before sending so a fast reply cannot beat
    /// the bookkeeping; connections that already answered stay answered.
    pub fn settle(&mut self, request_id: u64, delivered: &[ConnectionId]) {
        let done = match self.requests.get_mut(&request_id) {
            Some(p) => {
                p.awaiting.retain(|id| delivered.contains(id));
                p.awaiting.is_empty()
            }
            None => false,
        };
        if done {
            self.requests.remove(&request_id);
        }
    }

    /// Count a reply to `request_id` arriving on connection `from`.
    ///
    /// Returns `None` for unknown or retired ids, and for connections the
    /// capture is not waiting on (including a second reply from the same
    /// connection). The entry is retired once nobody owes a reply.
    pub fn record_reply(&mut self, request_id: u64, from: ConnectionId) -> Option<ReplyMatch> {
        let pending = self.requests.get_mut(&request_id)?;
        if !pending.awaiting.remove(&from) {
            return None;
        }
        pending.replies += 1;
        let matched = ReplyMatch {
            target_id: pending.target_id.clone(),
            reply_index: pending.replies,
            expected_replies: pending.expected_replies(),
            elapsed: pending.elapsed(),
        };
        if pending.awaiting.is_empty() {
            self.requests.remove(&request_id);
        }
        Some(matched)
    }

    /// Connection `id` went away. Captures still waiting on it stop doing
    /// so; those left waiting on nobody are retired. Returns how many
    /// captures were retired.
    pub fn forget_display(&mut self, id: ConnectionId) -> usize {
        let before = self.requests.len();
        self.requests
            .retain(|_, p| !p.awaiting.remove(&id) || !p.awaiting.is_empty());
        before - self.requests.len()
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    pub fn is_pending(&self, request_id: u64) -> bool {
        self.requests.contains_key(&request_id)
    }

    pub fn get(&self, request_id: u64) -> Option<&PendingCapture> {
        self.requests.get(&request_id)
    }

    /// Returns all request IDs whose deadlines have expired, without
    /// removing them.
    pub fn check_timeouts(&self) -> Vec<u64> {
        self.requests
            .iter()
            .filter(|(_, p)| p.is_expired())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Remove and return all expired captures.
    pub fn drain_expired(&mut self) -> Vec<(u64, PendingCapture)> {
        let expired_ids = self.check_timeouts();
        expired_ids
            .into_iter()
            .filter_map(|id| self.requests.remove(&id).map(|p| (id, p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conns(ids: &[u64]) -> Vec<ConnectionId> {
        ids.iter().copied().map(ConnectionId::from_raw).collect()
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::from_raw(id)
    }

    #[test]
    fn retires_after_all_replies() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "poster", conns(&[1, 2]));
        assert!(pending.is_pending(1));

        let first = pending.record_reply(1, conn(1)).unwrap();
        assert_eq!(first.reply_index, 1);
        assert_eq!(first.expected_replies, 2);
        assert!(!first.is_last());
        assert!(pending.is_pending(1));

        let second = pending.record_reply(1, conn(2)).unwrap();
        assert!(second.is_last());
        assert_eq!(second.target_id, "poster");
        assert!(!pending.is_pending(1));

        assert!(pending.record_reply(1, conn(2)).is_none());
    }

    #[test]
    fn second_reply_from_one_connection_is_not_counted() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "poster", conns(&[1, 2]));
        assert!(pending.record_reply(1, conn(1)).is_some());
        assert!(pending.record_reply(1, conn(1)).is_none());
        assert!(pending.record_reply(1, conn(3)).is_none());
        assert_eq!(pending.get(1).unwrap().awaiting, conns(&[2]).into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn settle_narrows_to_delivered_connections() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "a", conns(&[1, 2, 3]));
        pending.settle(1, &conns(&[2]));
        assert_eq!(pending.get(1).unwrap().expected_replies(), 1);
        assert!(pending.record_reply(1, conn(2)).unwrap().is_last());

        pending.track(2, "b", conns(&[1, 2]));
        pending.settle(2, &[]);
        assert!(!pending.is_pending(2));
    }

    #[test]
    fn reply_before_settle_stays_counted() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "a", conns(&[1, 2]));
        pending.record_reply(1, conn(1)).unwrap();
        pending.settle(1, &conns(&[1, 2]));

        let last = pending.record_reply(1, conn(2)).unwrap();
        assert_eq!(last.reply_index, 2);
        assert!(last.is_last());
    }

    #[test]
    fn unreached_capture_is_not_tracked() {
        let mut pending = PendingCaptures::new();
        pending.track(7, "poster", Vec::new());
        assert_eq!(pending.pending_count(), 0);
    }

    #[test]
    fn expired_entries_are_drained() {
        let mut pending = PendingCaptures::with_timeout(Duration::ZERO);
        pending.track(1, "a", conns(&[1]));
        std::thread::sleep(Duration::from_millis(1));

        assert_eq!(pending.check_timeouts(), vec![1]);
        let drained = pending.drain_expired();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].1.target_id, "a");
        assert_eq!(pending.pending_count(), 0);
    }

    #[test]
    fn no_timeout_never_expires() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "a", conns(&[1]));
        assert!(pending.check_timeouts().is_empty());
        assert!(pending.get(1).unwrap().deadline.is_none());
    }

    #[test]
    fn display_leaving_after_answering_keeps_others_correlated() {
        let mut pending = PendingCaptures::new();
        pending.track(42, "poster", conns(&[1, 2]));
        pending.record_reply(42, conn(1)).unwrap();

        assert_eq!(pending.forget_display(conn(1)), 0);
        let from_b = pending.record_reply(42, conn(2)).unwrap();
        assert_eq!(from_b.reply_index, 2);
        assert!(from_b.is_last());
    }

    #[test]
    fn unrelated_display_leaving_changes_nothing() {
        let mut pending = PendingCaptures::new();
        pending.track(7, "poster", conns(&[1]));

        // Joined after capture 7 went out, then left.
        assert_eq!(pending.forget_display(conn(9)), 0);
        assert_eq!(pending.pending_count(), 1);
        assert!(pending.record_reply(7, conn(1)).unwrap().is_last());
    }

    #[test]
    fn display_leaving_unanswered_retires_what_only_it_owed() {
        let mut pending = PendingCaptures::new();
        pending.track(1, "a", conns(&[1]));
        pending.track(2, "b", conns(&[1, 2]));

        assert_eq!(pending.forget_display(conn(1)), 1);
        assert!(!pending.is_pending(1));
        assert_eq!(pending.get(2).unwrap().expected_replies(), 1);
    }
}
