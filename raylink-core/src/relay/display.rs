//! Display-side handling of capture rays.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::geometry::{AnchorPose, Ray, fmt_vec3, from_anchor_frame, to_anchor_frame};
use crate::network::{Envelope, Router};
use crate::protocol::{CaptureMessage, DisplayMessage, MAX_DEBUG_INFO_LEN, WireMessage};
use crate::spatial::{Hit, LayerMask, SpatialQuery};
use crate::state::{Session, SessionRole};

// ── AnchorTable ──────────────────────────────────────────────────

/// Local world-frame poses of the anchors this device knows, by name.
#[derive(Debug, Clone, Default)]
pub struct AnchorTable {
    anchors: HashMap<String, AnchorPose>,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target_id: impl Into<String>, pose: AnchorPose) -> Self {
        self.insert(target_id, pose);
        self
    }

    pub fn insert(&mut self, target_id: impl Into<String>, pose: AnchorPose) -> Option<AnchorPose> {
        self.anchors.insert(target_id.into(), pose)
    }

    pub fn get(&self, target_id: &str) -> Option<AnchorPose> {
        self.anchors.get(target_id).copied()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

// ── Reply building ───────────────────────────────────────────────

/// Fold a hit sequence into a reply.
///
/// Every hit is described in `debug_info`; `hit_position` is the last
/// hit in traversal order, expressed in the anchor frame. No hits gives
/// the [`DisplayMessage::nothing_hit`] sentinel.
pub fn build_reply(
    request_id: u64,
    hits: impl IntoIterator<Item = Hit>,
    anchor: AnchorPose,
) -> DisplayMessage {
    let mut hit_count = 0u32;
    let mut last_point = Vec3::ZERO;
    let mut debug_info = String::new();

    for hit in hits {
        if hit_count > 0 {
            debug_info.push('\n');
        }
        let _ = write!(
            debug_info,
            "Hit object \"{}\" at position {}",
            hit.label,
            fmt_vec3(hit.point)
        );
        hit_count += 1;
        last_point = hit.point;
    }

    if hit_count == 0 {
        return DisplayMessage::nothing_hit(request_id);
    }

    truncate_at_char_boundary(&mut debug_info, MAX_DEBUG_INFO_LEN);
    DisplayMessage {
        request_id,
        hit_count,
        hit_position: to_anchor_frame(last_point, anchor),
        debug_info,
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

// ── DisplayDispatcher ────────────────────────────────────────────

/// Answers capture rays with spatial-query results.
#[derive(Debug)]
pub struct DisplayDispatcher<Q> {
    spatial: Q,
    anchors: AnchorTable,
    layers: LayerMask,
}

impl<Q: SpatialQuery + 'static> DisplayDispatcher<Q> {
    /// Build the dispatcher. Fails unless `session` is a display session.
    pub fn new(
        session: &Session,
        spatial: Q,
        anchors: AnchorTable,
        layers: LayerMask,
    ) -> Result<Self, RelayError> {
        session.require(SessionRole::Display, "only a display session answers capture rays")?;
        Ok(Self {
            spatial,
            anchors,
            layers,
        })
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    /// Resolve one capture ray into the reply to send back.
    pub fn resolve(&self, capture: &CaptureMessage) -> DisplayMessage {
        debug!(
            request_id = capture.request_id,
            target = %capture.target_id,
            origin = %capture.origin_pose,
            direction = %capture.ray_direction.get(),
            "capture ray received"
        );

        let Some(anchor) = self.anchors.get(&capture.target_id) else {
            warn!(target = %capture.target_id, "capture ray for unknown anchor");
            return DisplayMessage::miss(
                capture.request_id,
                format!("Unknown target \"{}\".", capture.target_id),
            );
        };

        let origin = from_anchor_frame(capture.origin_pose, anchor);
        let ray = Ray::new(origin, capture.ray_direction);
        build_reply(capture.request_id, self.spatial.query(ray, self.layers), anchor)
    }

    /// Resolve and answer on the delivering connection.
    pub async fn on_capture(&self, envelope: Envelope<CaptureMessage>) {
        let reply = self.resolve(&envelope.message);
        info!(
            request_id = reply.request_id,
            hits = reply.hit_count,
            connection = %envelope.from(),
            "{}",
            reply.debug_info
        );
        let packet = match reply.to_packet() {
            Ok(packet) => packet,
            Err(e) => {
                warn!(request_id = reply.request_id, "reply not encoded: {e}");
                return;
            }
        };
        if let Err(e) = envelope.reply.send(packet).await {
            // Point-to-point replies fail silently; the capture side
            // simply never sees this answer.
            debug!("reply not delivered: {e}");
        }
    }

    /// Install the capture handler on `router`.
    pub fn register(self: &Arc<Self>, router: &mut Router) {
        let dispatcher = Arc::clone(self);
        router.register::<CaptureMessage, _, _>(move |envelope| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.on_capture(envelope).await }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::UnitDirection;
    use crate::network::{ConnectionId, PeerSender, RouteOutcome};
    use crate::packet::Packet;
    use crate::protocol::NOTHING_HIT;
    use crate::spatial::SceneMesh;
    use tokio::sync::mpsc;

    /// A provider that returns a fixed hit list regardless of the ray.
    #[derive(Debug)]
    struct Canned(Vec<Hit>);

    impl SpatialQuery for Canned {
        fn query<'a>(&'a self, _ray: Ray, _layers: LayerMask) -> impl Iterator<Item = Hit> + 'a {
            self.0.iter().cloned()
        }
    }

    fn capture(target: &str) -> CaptureMessage {
        CaptureMessage {
            request_id: 11,
            target_id: target.into(),
            origin_pose: Vec3::new(0.0, 0.0, -2.0),
            ray_direction: UnitDirection::new(Vec3::Z).unwrap(),
        }
    }

    fn display(hits: Vec<Hit>, anchor: AnchorPose) -> DisplayDispatcher<Canned> {
        DisplayDispatcher::new(
            &Session::new(SessionRole::Display),
            Canned(hits),
            AnchorTable::new().with("poster", anchor),
            LayerMask::SPATIAL_MESH,
        )
        .unwrap()
    }

    #[test]
    fn zero_hits_give_sentinel() {
        let reply = display(Vec::new(), AnchorPose::default()).resolve(&capture("poster"));
        assert_eq!(reply.debug_info, NOTHING_HIT);
        assert_eq!(reply.hit_position, Vec3::ZERO);
        assert_eq!(reply.request_id, 11);
    }

    #[test]
    fn single_hit_is_reported_in_anchor_frame() {
        let anchor = AnchorPose::at(Vec3::new(0.5, -1.0, 2.0));
        let point = Vec3::new(1.0, 2.0, 3.0);
        let reply = display(vec![Hit::new(point, "Wall", 4.0)], anchor).resolve(&capture("poster"));

        assert!(reply.debug_info.contains("Wall"));
        assert!(reply.debug_info.contains("(1.00, 2.00, 3.00)"));
        assert_eq!(reply.hit_position, to_anchor_frame(point, anchor));
        assert_eq!(reply.hit_count, 1);
    }

    #[test]
    fn last_hit_in_traversal_order_wins() {
        let hits = vec![
            Hit::new(Vec3::new(0.0, 0.0, 9.0), "Far", 9.0),
            Hit::new(Vec3::new(0.0, 0.0, 1.0), "Near", 1.0),
        ];
        let reply = display(hits, AnchorPose::default()).resolve(&capture("poster"));
        assert_eq!(reply.hit_position, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(reply.debug_info.lines().count(), 2);
        assert_eq!(reply.hit_count, 2);
    }

    #[test]
    fn unknown_anchor_replies_with_sentinel_position() {
        let reply = display(vec![Hit::new(Vec3::ONE, "Wall", 1.0)], AnchorPose::default())
            .resolve(&capture("elsewhere"));
        assert!(!reply.is_hit());
        assert_eq!(reply.hit_position, Vec3::ZERO);
        assert!(reply.debug_info.contains("elsewhere"));
    }

    #[test]
    fn ray_is_moved_into_display_world_frame() {
        let mut mesh = SceneMesh::new();
        // A wall 3 m in front of an anchor placed at z = 10.
        mesh.add_box(
            "Wall",
            LayerMask::SPATIAL_MESH,
            Vec3::new(0.0, 0.0, 13.0),
            Vec3::new(2.0, 2.0, 0.05),
        );
        let dispatcher = DisplayDispatcher::new(
            &Session::new(SessionRole::Display),
            mesh,
            AnchorTable::new().with("poster", AnchorPose::at(Vec3::new(0.0, 0.0, 10.0))),
            LayerMask::SPATIAL_MESH,
        )
        .unwrap();

        let reply = dispatcher.resolve(&capture("poster"));
        assert_eq!(reply.hit_count, 1);
        assert!(reply.hit_position.abs_diff_eq(Vec3::new(0.0, 0.0, 2.95), 1e-4));
    }

    #[test]
    fn debug_info_is_capped() {
        let hits = (0..2000).map(|i| Hit::new(Vec3::splat(i as f32), "Ceiling tile", 1.0));
        let reply = build_reply(1, hits, AnchorPose::default());
        assert!(reply.debug_info.len() <= MAX_DEBUG_INFO_LEN);
        assert_eq!(reply.hit_count, 2000);
    }

    #[test]
    fn capture_session_cannot_answer() {
        let err = DisplayDispatcher::new(
            &Session::new(SessionRole::Capture),
            Canned(Vec::new()),
            AnchorTable::new(),
            LayerMask::all(),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::RoleViolation(_)));
    }

    #[tokio::test]
    async fn replies_on_the_delivering_connection() {
        let dispatcher = Arc::new(display(
            vec![Hit::new(Vec3::new(1.0, 2.0, 3.0), "Wall", 1.0)],
            AnchorPose::default(),
        ));
        let mut router = Router::new();
        dispatcher.register(&mut router);

        let (tx, mut rx) = mpsc::channel::<Packet>(4);
        let reply_to = PeerSender::new(ConnectionId::from_raw(5), tx);
        let outcome = router.route(capture("poster").to_packet().unwrap(), &reply_to).await;
        assert_eq!(outcome, RouteOutcome::Handled(crate::message::MessageType::Capture));

        let packet = rx.recv().await.unwrap();
        let reply = DisplayMessage::from_packet(&packet).unwrap();
        assert_eq!(reply.request_id, 11);
        assert_eq!(reply.hit_position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[tokio::test]
    async fn reply_to_dead_connection_is_silent() {
        let dispatcher = display(Vec::new(), AnchorPose::default());
        let (tx, rx) = mpsc::channel::<Packet>(1);
        drop(rx);
        let envelope = Envelope {
            message: capture("poster"),
            flags: crate::flags::PacketFlags::BROADCAST,
            reply: PeerSender::new(ConnectionId::from_raw(6), tx),
        };
        dispatcher.on_capture(envelope).await;
    }
}
