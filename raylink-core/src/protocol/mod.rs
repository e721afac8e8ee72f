//! Typed protocol messages and their payload encoding.
//!
//! Every message implements [`WireMessage`], which fixes its type tag.
//! Payloads are the message struct serialized with bincode (fixed-width
//! little-endian integers, `u64` length prefixes), so the layout follows
//! field order. Decoding is bounded by [`MAX_PAYLOAD_SIZE`] and rejects
//! trailing bytes.
//!
//! # Wire Protocol
//!
//! ```text
//! Display ──[Hello]──────────────────────► Capture   (once, on connect)
//! Capture ──[Capture + BROADCAST]────────► Display   (every display)
//! Display ──[Display (+ NO_HIT)]─────────► Capture   (same connection)
//! Either  ──[Heartbeat]──────────────────► Either    (every 5 s)
//! ```

mod capture;
mod display;
mod hello;

pub use capture::CaptureMessage;
pub use display::{DisplayMessage, MAX_DEBUG_INFO_LEN, NOTHING_HIT};
pub use hello::{Heartbeat, Hello};

use bincode::Options;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RelayError;
use crate::flags::PacketFlags;
use crate::message::MessageType;
use crate::packet::{MAX_PAYLOAD_SIZE, Packet};

// ── WireMessage ──────────────────────────────────────────────────

/// A serde message with a fixed type tag.
pub trait WireMessage: Serialize + DeserializeOwned {
    const MESSAGE_TYPE: MessageType;

    /// Flags implied by the message contents.
    fn flags(&self) -> PacketFlags {
        PacketFlags::empty()
    }

    /// Checks serde cannot express, run after every decode.
    fn validate(&self) -> Result<(), RelayError> {
        Ok(())
    }

    fn to_packet(&self) -> Result<Packet, RelayError> {
        self.to_packet_with(PacketFlags::empty())
    }

    /// Build a packet, adding `extra` to the message's own flags.
    fn to_packet_with(&self, extra: PacketFlags) -> Result<Packet, RelayError> {
        let payload = to_payload(self)?;
        Ok(Packet::new(Self::MESSAGE_TYPE, self.flags() | extra, payload))
    }

    /// Decode a packet that must carry this message type.
    fn from_packet(packet: &Packet) -> Result<Self, RelayError> {
        let payload = packet.expect_type(Self::MESSAGE_TYPE)?;
        let message: Self = payload_options()
            .deserialize(payload)
            .map_err(|e| RelayError::malformed(format!("{} payload: {e}", Self::MESSAGE_TYPE)))?;
        message.validate()?;
        Ok(message)
    }
}

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(MAX_PAYLOAD_SIZE as u64)
        .reject_trailing_bytes()
}

/// Serialize `value` the way every payload is laid out.
pub(crate) fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, RelayError> {
    let bytes = payload_options().serialize(value).map_err(|e| match *e {
        bincode::ErrorKind::SizeLimit => RelayError::PayloadTooLarge {
            size: bincode::serialized_size(value).unwrap_or(u64::MAX) as usize,
            max: MAX_PAYLOAD_SIZE,
        },
        _ => RelayError::from(e),
    })?;
    Ok(Bytes::from(bytes))
}

/// Encode a message into a complete frame.
pub fn encode<M: WireMessage>(message: &M) -> Result<Bytes, RelayError> {
    Ok(message.to_packet()?.to_bytes())
}

/// Decode a complete frame that must hold an `M`.
///
/// Every failure is reported as [`RelayError::MalformedMessage`].
pub fn decode<M: WireMessage>(bytes: &[u8]) -> Result<M, RelayError> {
    let packet = Packet::from_bytes(bytes).map_err(as_malformed)?;
    M::from_packet(&packet).map_err(as_malformed)
}

fn as_malformed(e: RelayError) -> RelayError {
    match e {
        RelayError::MalformedMessage(_) => e,
        other => RelayError::MalformedMessage(other.to_string()),
    }
}

// ── Message ──────────────────────────────────────────────────────

/// Any decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(Hello),
    Heartbeat,
    Capture(CaptureMessage),
    Display(DisplayMessage),
}

impl Message {
    /// Decode `bytes`, failing unless the frame carries `expected`.
    pub fn decode(bytes: &[u8], expected: MessageType) -> Result<Self, RelayError> {
        let packet = Packet::from_bytes(bytes).map_err(as_malformed)?;
        Self::from_packet(&packet, expected).map_err(as_malformed)
    }

    pub fn from_packet(packet: &Packet, expected: MessageType) -> Result<Self, RelayError> {
        Ok(match expected {
            MessageType::Hello => Message::Hello(Hello::from_packet(packet)?),
            MessageType::Heartbeat => {
                Heartbeat::from_packet(packet)?;
                Message::Heartbeat
            }
            MessageType::Capture => Message::Capture(CaptureMessage::from_packet(packet)?),
            MessageType::Display => Message::Display(DisplayMessage::from_packet(packet)?),
        })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello(_) => MessageType::Hello,
            Message::Heartbeat => MessageType::Heartbeat,
            Message::Capture(_) => MessageType::Capture,
            Message::Display(_) => MessageType::Display,
        }
    }

    pub fn encode(&self) -> Result<Bytes, RelayError> {
        match self {
            Message::Hello(m) => encode(m),
            Message::Heartbeat => encode(&Heartbeat),
            Message::Capture(m) => encode(m),
            Message::Display(m) => encode(m),
        }
    }
}
