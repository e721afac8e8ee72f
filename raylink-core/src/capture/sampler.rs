use tracing::{debug, trace, warn};

use crate::error::RelayError;
use crate::geometry::to_anchor_frame;
use crate::protocol::CaptureMessage;
use crate::relay::{CaptureDispatcher, RequestIds};
use crate::state::{InputGate, Session};

use super::{PointerEvent, PoseSource, TrackedAnchor};

/// Turns pointer input into capture rays, once per tick.
#[derive(Debug)]
pub struct CaptureLoop<P> {
    pose: P,
    anchor: TrackedAnchor,
    gate: InputGate,
}

impl<P: PoseSource> CaptureLoop<P> {
    /// Fails unless `session` is a capture session.
    pub fn new(session: &Session, pose: P, anchor: TrackedAnchor) -> Result<Self, RelayError> {
        let gate = session
            .gate()
            .cloned()
            .ok_or(RelayError::RoleViolation("only a capture session samples pointer input"))?;
        Ok(Self { pose, anchor, gate })
    }

    pub fn anchor(&self) -> &TrackedAnchor {
        &self.anchor
    }

    pub fn gate(&self) -> &InputGate {
        &self.gate
    }

    /// One capture message per qualifying event, each from that event's
    /// own screen position. Nothing while disarmed.
    pub fn tick(&self, events: &[PointerEvent], ids: &RequestIds) -> Vec<CaptureMessage> {
        if !self.gate.is_armed() {
            if !events.is_empty() {
                trace!(dropped = events.len(), "input disarmed");
            }
            return Vec::new();
        }

        let origin_pose = to_anchor_frame(self.pose.camera_position(), self.anchor.pose);
        events
            .iter()
            .filter(|event| event.is_qualifying())
            .filter_map(|event| {
                let Some(ray_direction) = self.pose.screen_point_to_ray(event.position) else {
                    warn!(position = %event.position, "screen point has no ray");
                    return None;
                };
                Some(CaptureMessage {
                    request_id: ids.next(),
                    target_id: self.anchor.target_id.clone(),
                    origin_pose,
                    ray_direction,
                })
            })
            .collect()
    }

    /// Tick and broadcast. Returns how many captures were sent.
    pub async fn run_tick(&self, events: &[PointerEvent], dispatcher: &CaptureDispatcher) -> usize {
        let captures = self.tick(events, dispatcher.request_ids());
        for capture in &captures {
            match dispatcher.broadcast(capture).await {
                Ok(report) if !report.reached_anyone() => {
                    debug!(request_id = capture.request_id, "no display connected");
                }
                Ok(_) => {}
                Err(e) => warn!(request_id = capture.request_id, "capture not sent: {e}"),
            }
        }
        captures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PinholeCamera;
    use crate::geometry::AnchorPose;
    use crate::state::SessionRole;
    use glam::{Vec2, Vec3};

    fn sampler(session: &Session) -> CaptureLoop<PinholeCamera> {
        let camera = PinholeCamera::look_from(Vec3::new(1.0, 1.5, 0.0), glam::Quat::IDENTITY);
        let anchor = TrackedAnchor::new("poster", AnchorPose::at(Vec3::new(1.0, 0.0, 2.0)));
        CaptureLoop::new(session, camera, anchor).unwrap()
    }

    #[test]
    fn armed_tick_emits_one_message_per_qualifying_event() {
        let session = Session::new(SessionRole::Capture);
        let sampler = sampler(&session);
        let ids = RequestIds::default();
        let events = [
            PointerEvent::touch_began(0.0, 0.0),
            PointerEvent::new(crate::capture::PointerPhase::TouchMoved, Vec2::ZERO),
            PointerEvent::touch_began(1920.0, 1080.0),
            PointerEvent::mouse_down(960.0, 540.0),
        ];

        let out = sampler.tick(&events, &ids);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out.iter().map(|m| m.request_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // Every touch uses its own position.
        assert_ne!(out[0].ray_direction, out[1].ray_direction);
        assert!(out[2].ray_direction.get().abs_diff_eq(Vec3::Z, 1e-6));
        for m in &out {
            assert_eq!(m.target_id, "poster");
            assert_eq!(m.origin_pose, Vec3::new(0.0, 1.5, -2.0));
        }
    }

    #[test]
    fn disarmed_tick_emits_nothing() {
        let session = Session::new(SessionRole::Capture);
        let sampler = sampler(&session);
        let ids = RequestIds::default();
        session.target_lost();

        let events = vec![PointerEvent::touch_began(10.0, 10.0); 5];
        assert!(sampler.tick(&events, &ids).is_empty());

        session.target_found();
        assert_eq!(sampler.tick(&events, &ids).len(), 5);
    }

    #[test]
    fn display_session_has_no_capture_loop() {
        let session = Session::new(SessionRole::Display);
        let err = CaptureLoop::new(
            &session,
            PinholeCamera::default(),
            TrackedAnchor::new("poster", AnchorPose::default()),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::RoleViolation(_)));
    }
}
