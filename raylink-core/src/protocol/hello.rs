use serde::{Deserialize, Serialize};

use crate::message::MessageType;
use crate::protocol::WireMessage;
use crate::state::SessionRole;

/// Sent once by a connecting peer to announce who it is.
///
/// The listener refuses peers whose role cannot take part in the relay
/// (a capture listener only serves displays).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub role: SessionRole,
    pub node_name: String,
}

impl WireMessage for Hello {
    const MESSAGE_TYPE: MessageType = MessageType::Hello;
}

/// Empty keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Heartbeat;

impl WireMessage for Heartbeat {
    const MESSAGE_TYPE: MessageType = MessageType::Heartbeat;
}
