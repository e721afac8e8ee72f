//! Message type tags carried in the packet header.
//!
//! Unknown tags are rejected through `TryFrom<u32>`, so a peer speaking a
//! newer protocol produces an error rather than a bogus variant.

use crate::error::RelayError;
use std::fmt;

/// All message kinds understood by the raylink protocol.
///
/// Organized by category:
/// - `0x01..0x0F` — Session-level (hello, heartbeat)
/// - `0x10..0x1F` — Ray relay (capture rays, display replies)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // ── Session (0x0x) ───────────────────────────────────────────
    /// Role announcement sent by a peer right after connecting.
    Hello = 0x01,
    /// Periodic keep-alive.
    Heartbeat = 0x02,

    // ── Relay (0x1x) ─────────────────────────────────────────────
    /// A ray produced by a capture device (capture → display).
    Capture = 0x10,
    /// A resolved hit reported by a display (display → capture).
    Display = 0x11,
}

impl TryFrom<u32> for MessageType {
    type Error = RelayError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageType::Hello),
            0x02 => Ok(MessageType::Heartbeat),
            0x10 => Ok(MessageType::Capture),
            0x11 => Ok(MessageType::Display),
            _ => Err(RelayError::UnknownVariant {
                type_name: "MessageType",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl MessageType {
    /// Returns `true` for session housekeeping that never reaches a
    /// registered handler.
    pub fn is_session_level(&self) -> bool {
        matches!(self, MessageType::Hello | MessageType::Heartbeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrip() {
        for ty in [
            MessageType::Hello,
            MessageType::Heartbeat,
            MessageType::Capture,
            MessageType::Display,
        ] {
            assert_eq!(MessageType::try_from(ty as u32).unwrap(), ty);
        }
    }

    #[test]
    fn message_type_invalid() {
        let err = MessageType::try_from(0xDEAD).unwrap_err();
        assert!(err.to_string().contains("0xdead"));
    }

    #[test]
    fn session_level_types() {
        assert!(MessageType::Heartbeat.is_session_level());
        assert!(MessageType::Hello.is_session_level());
        assert!(!MessageType::Capture.is_session_level());
    }
}
