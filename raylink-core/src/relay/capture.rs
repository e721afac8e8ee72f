//! Capture-side fan-out and reply handling.
//!
//! Every capture goes to all registered displays. Replies are matched by
//! `request_id` and connection for logging and to place the highlight in
//! the right anchor frame. They are surfaced to the owner as
//! [`CaptureEvent`]s and never deduplicated, so several displays can
//! answer one ray.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use glam::Vec3;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::flags::PacketFlags;
use crate::geometry::{AnchorPose, from_anchor_frame};
use crate::network::{ConnectionId, Envelope, PeerSender, Router};
use crate::protocol::{CaptureMessage, DisplayMessage, WireMessage};
use crate::relay::display::AnchorTable;
use crate::relay::pending::{PendingCaptures, ReplyMatch};
use crate::relay::registry::{BroadcastReport, PeerInfo, SessionRegistry};
use crate::state::{Session, SessionRole};

/// Source of capture correlation ids, starting at 1.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl Default for RequestIds {
    fn default() -> Self {
        Self(AtomicU64::new(1))
    }
}

impl RequestIds {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// A display's reply, ready for visualization.
#[derive(Debug, Clone, PartialEq)]
pub struct HitReport {
    pub from: ConnectionId,
    pub request_id: u64,
    /// Correlation with the capture that caused it, when still tracked.
    pub correlated: Option<ReplyMatch>,
    pub hit_count: u32,
    /// Hit position in the anchor frame, as sent by the display.
    pub anchor_relative: Vec3,
    /// Hit position in this device's world frame, when something was hit.
    /// Uses the capture's anchor, or the fallback anchor when the reply
    /// could not be correlated.
    pub world_position: Option<Vec3>,
    pub debug_info: String,
}

/// Notifications for whoever drives the capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    SessionStarted(PeerInfo),
    SessionStopped(PeerInfo),
    Hit(HitReport),
    /// A capture's deadline passed before every display answered.
    Expired {
        request_id: u64,
        target_id: String,
        answered: usize,
        expected: usize,
    },
}

#[derive(Debug)]
pub struct CaptureDispatcher {
    registry: Arc<SessionRegistry>,
    pending: Mutex<PendingCaptures>,
    anchors: AnchorTable,
    fallback_anchor: Option<AnchorPose>,
    request_ids: RequestIds,
    events: mpsc::UnboundedSender<CaptureEvent>,
}

impl CaptureDispatcher {
    /// Build the dispatcher. Fails unless `session` is a capture session.
    pub fn new(
        session: &Session,
        registry: Arc<SessionRegistry>,
        anchors: AnchorTable,
        reply_timeout: Option<Duration>,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Self, RelayError> {
        session.require(SessionRole::Capture, "only a capture session emits rays")?;
        let pending = match reply_timeout {
            Some(timeout) => PendingCaptures::with_timeout(timeout),
            None => PendingCaptures::new(),
        };
        Ok(Self {
            registry,
            pending: Mutex::new(pending),
            anchors,
            fallback_anchor: None,
            request_ids: RequestIds::default(),
            events,
        })
    }

    /// Place hits from uncorrelated replies against `anchor`, normally the
    /// anchor the capture loop is tracking.
    pub fn with_fallback_anchor(mut self, anchor: AnchorPose) -> Self {
        self.fallback_anchor = Some(anchor);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn request_ids(&self) -> &RequestIds {
        &self.request_ids
    }

    pub fn pending_count(&self) -> usize {
        self.pending().pending_count()
    }

    // ── Session lifecycle ────────────────────────────────────────

    pub fn on_session_start(
        &self,
        sender: PeerSender,
        name: impl Into<String>,
        addr: Option<SocketAddr>,
    ) -> PeerInfo {
        let info = self.registry.on_session_start(sender, name, addr);
        self.emit(CaptureEvent::SessionStarted(info.clone()));
        info
    }

    pub fn on_session_stop(&self, id: ConnectionId) -> Option<PeerInfo> {
        let info = self.registry.on_session_stop(id)?;
        let retired = self.pending().forget_display(id);
        if retired > 0 {
            debug!(connection = %id, retired, "captures left with nobody to answer");
        }
        self.emit(CaptureEvent::SessionStopped(info.clone()));
        Some(info)
    }

    // ── Outbound ─────────────────────────────────────────────────

    /// Fan `capture` out to every registered display.
    ///
    /// Displays found dead are stopped the same way as a closed
    /// connection, so each yields one [`CaptureEvent::SessionStopped`].
    /// Only encoding the capture can fail.
    pub async fn broadcast(&self, capture: &CaptureMessage) -> Result<BroadcastReport, RelayError> {
        let packet = capture.to_packet_with(PacketFlags::BROADCAST)?;
        self.pending().track(
            capture.request_id,
            capture.target_id.clone(),
            self.registry.ids(),
        );

        let report = self.registry.broadcast(&packet).await;
        self.pending().settle(capture.request_id, &report.delivered);
        for &id in &report.dropped {
            self.on_session_stop(id);
        }

        debug!(
            request_id = capture.request_id,
            target = %capture.target_id,
            delivered = report.delivered.len(),
            dropped = report.dropped.len(),
            "capture broadcast"
        );
        Ok(report)
    }

    // ── Inbound ──────────────────────────────────────────────────

    /// Surface one display reply.
    pub fn on_display(&self, envelope: Envelope<DisplayMessage>) -> HitReport {
        let from = envelope.from();
        let reply = envelope.message;
        let correlated = self.pending().record_reply(reply.request_id, from);

        match &correlated {
            Some(m) => info!(
                request_id = reply.request_id,
                connection = %from,
                "reply {}/{} after {:.0?}: {}",
                m.reply_index,
                m.expected_replies,
                m.elapsed,
                reply.debug_info
            ),
            None => warn!(
                request_id = reply.request_id,
                connection = %from,
                "uncorrelated reply: {}",
                reply.debug_info
            ),
        }

        let anchor = correlated
            .as_ref()
            .and_then(|m| self.anchors.get(&m.target_id))
            .or(self.fallback_anchor);
        let world_position = anchor
            .filter(|_| reply.is_hit())
            .map(|anchor| from_anchor_frame(reply.hit_position, anchor));

        let report = HitReport {
            from,
            request_id: reply.request_id,
            correlated,
            hit_count: reply.hit_count,
            anchor_relative: reply.hit_position,
            world_position,
            debug_info: reply.debug_info,
        };
        self.emit(CaptureEvent::Hit(report.clone()));
        report
    }

    /// Retire captures past their deadline. Returns how many expired.
    pub fn expire_stale(&self) -> usize {
        let expired = self.pending().drain_expired();
        let count = expired.len();
        for (request_id, p) in expired {
            debug!(
                request_id,
                target = %p.target_id,
                "capture expired with {}/{} replies after {:.1}s",
                p.replies,
                p.expected_replies(),
                p.elapsed().as_secs_f64()
            );
            self.emit(CaptureEvent::Expired {
                request_id,
                target_id: p.target_id.clone(),
                expected: p.expected_replies(),
                answered: p.replies,
            });
        }
        count
    }

    /// Install the display-reply handler on `router`.
    pub fn register(self: &Arc<Self>, router: &mut Router) {
        let dispatcher = Arc::clone(self);
        router.register::<DisplayMessage, _, _>(move |envelope| {
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                dispatcher.on_display(envelope);
            }
        });
    }

    fn emit(&self, event: CaptureEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }

    fn pending(&self) -> MutexGuard<'_, PendingCaptures> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
