use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::geometry::UnitDirection;
use crate::message::MessageType;
use crate::protocol::WireMessage;

/// A ray produced by a capture device.
///
/// ```text
/// request_id     u64
/// target_id      string
/// origin_pose    vec3   (anchor frame)
/// ray_direction  vec3   (unit length)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMessage {
    /// Correlation id, echoed by every display reply.
    pub request_id: u64,
    /// Name of the anchor the pose and ray are relative to.
    pub target_id: String,
    /// Capture device position in the anchor frame.
    pub origin_pose: Vec3,
    pub ray_direction: UnitDirection,
}

impl WireMessage for CaptureMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Capture;

    fn validate(&self) -> Result<(), RelayError> {
        if !self.origin_pose.is_finite() {
            return Err(RelayError::malformed("origin_pose is not finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::PacketFlags;
    use crate::packet::Packet;
    use crate::protocol::{decode, encode, to_payload};

    /// Same field layout as `CaptureMessage`, without the unit-length check.
    #[derive(Serialize)]
    struct RawCapture {
        request_id: u64,
        target_id: String,
        origin_pose: Vec3,
        ray_direction: Vec3,
    }

    fn raw_packet(origin_pose: Vec3, ray_direction: Vec3) -> Packet {
        let raw = RawCapture {
            request_id: 1,
            target_id: "t".into(),
            origin_pose,
            ray_direction,
        };
        Packet::new(MessageType::Capture, PacketFlags::empty(), to_payload(&raw).unwrap())
    }

    #[test]
    fn decodes_what_it_encodes() {
        let msg = CaptureMessage {
            request_id: 77,
            target_id: "ImageTarget_Stones".into(),
            origin_pose: Vec3::new(0.1, 0.2, -0.9),
            ray_direction: UnitDirection::new(Vec3::new(1.0, 1.0, 0.0)).unwrap(),
        };
        let back: CaptureMessage = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn non_unit_direction_on_the_wire_is_rejected() {
        let packet = raw_packet(Vec3::ZERO, Vec3::new(0.0, 3.0, 0.0));
        let err = CaptureMessage::from_packet(&packet).unwrap_err();
        assert!(matches!(err, RelayError::MalformedMessage(_)));
        assert!(err.to_string().contains("unit length"));
    }

    #[test]
    fn non_finite_origin_is_rejected() {
        let packet = raw_packet(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::Z);
        let err = CaptureMessage::from_packet(&packet).unwrap_err();
        assert!(err.to_string().contains("origin_pose"));
    }

    #[test]
    fn broadcast_flag_is_carried() {
        let msg = CaptureMessage {
            request_id: 1,
            target_id: String::new(),
            origin_pose: Vec3::ZERO,
            ray_direction: UnitDirection::new(Vec3::Y).unwrap(),
        };
        let packet = msg.to_packet_with(PacketFlags::BROADCAST).unwrap();
        assert!(packet.flags().contains(PacketFlags::BROADCAST));
        assert_eq!(CaptureMessage::from_packet(&packet).unwrap(), msg);
    }
}
