use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::flags::PacketFlags;
use crate::message::MessageType;
use crate::protocol::WireMessage;

/// `debug_info` of a reply whose ray hit nothing.
pub const NOTHING_HIT: &str = "Nothing was hit.";

/// Upper bound on `debug_info`, keeping any reply under the payload limit.
pub const MAX_DEBUG_INFO_LEN: usize = 16 * 1024;

/// A display's answer to one [`CaptureMessage`].
///
/// ```text
/// request_id     u64
/// hit_count      u32
/// hit_position   vec3   (anchor frame, zero when nothing was hit)
/// debug_info     string
/// ```
///
/// [`CaptureMessage`]: crate::protocol::CaptureMessage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    /// The `request_id` of the capture this answers.
    pub request_id: u64,
    /// Number of intersections the display found.
    pub hit_count: u32,
    pub hit_position: Vec3,
    pub debug_info: String,
}

impl DisplayMessage {
    /// The sentinel reply for a ray that hit nothing.
    pub fn nothing_hit(request_id: u64) -> Self {
        Self::miss(request_id, NOTHING_HIT)
    }

    /// A zero-hit reply with a custom explanation.
    pub fn miss(request_id: u64, debug_info: impl Into<String>) -> Self {
        Self {
            request_id,
            hit_count: 0,
            hit_position: Vec3::ZERO,
            debug_info: debug_info.into(),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.hit_count > 0
    }
}

impl WireMessage for DisplayMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Display;

    fn validate(&self) -> Result<(), RelayError> {
        if !self.hit_position.is_finite() {
            return Err(RelayError::malformed("hit_position is not finite"));
        }
        Ok(())
    }

    fn flags(&self) -> PacketFlags {
        if self.is_hit() {
            PacketFlags::empty()
        } else {
            PacketFlags::NO_HIT
        }
    }
}
