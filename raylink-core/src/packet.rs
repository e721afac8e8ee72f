//! Framed packets: a [`PacketHeader`] plus the raw payload it describes.
//!
//! The payload length is capped at [`MAX_PAYLOAD_SIZE`]; the checksum is
//! the first four bytes of the payload's blake3 digest.

use std::fmt::Debug;

use bytes::{Bytes, BytesMut};

use crate::error::RelayError;
use crate::flags::PacketFlags;
use crate::header::{HEADER_SIZE, PacketHeader};
use crate::message::MessageType;

/// Largest payload a single packet may carry.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Largest complete frame (header + payload) the codec will buffer.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// A header plus its raw payload.
///
/// Packets are what travels through the codec and the connection
/// channels. Turning a packet into a typed message happens in
/// [`crate::protocol`], where the type tag and checksum are checked.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Bytes,
}

impl Packet {
    /// Build a packet around `payload`, computing its checksum.
    pub fn new(message_type: MessageType, flags: PacketFlags, payload: Bytes) -> Self {
        let header = PacketHeader::new(
            checksum(&payload),
            message_type as u32,
            flags,
            payload.len() as u32,
        );
        Self { header, payload }
    }

    pub fn heartbeat() -> Self {
        Self::new(MessageType::Heartbeat, PacketFlags::empty(), Bytes::new())
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn flags(&self) -> PacketFlags {
        self.header.flags()
    }

    /// The message type, if the tag is one this build understands.
    pub fn message_type(&self) -> Result<MessageType, RelayError> {
        MessageType::try_from(self.header.message_type())
    }

    /// Returns `true` if the payload matches the header checksum.
    pub fn validate(&self) -> bool {
        self.header.payload_length() == self.payload.len()
            && self.header.checksum() == checksum(&self.payload)
    }

    /// Check the type tag and checksum, yielding the payload on success.
    pub fn expect_type(&self, expected: MessageType) -> Result<&[u8], RelayError> {
        let actual = self.header.message_type();
        if actual != expected as u32 {
            return Err(RelayError::malformed(format!(
                "expected {expected} (0x{:02x}), got type tag 0x{actual:02x}",
                expected as u32
            )));
        }
        if !self.validate() {
            return Err(RelayError::malformed("checksum mismatch"));
        }
        Ok(&self.payload)
    }

    /// Serialize header and payload into one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.extend_from_slice(&self.header.to_bytes());
        dst.extend_from_slice(&self.payload);
    }

    /// Parse exactly one packet from `bytes`.
    ///
    /// The slice must hold the header and precisely `payload_length`
    /// payload bytes; anything shorter or longer is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        let header = PacketHeader::from_bytes(bytes)?;
        let payload_length = header.payload_length();

        if payload_length > MAX_PAYLOAD_SIZE {
            return Err(RelayError::PayloadTooLarge {
                size: payload_length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let expected = HEADER_SIZE + payload_length;
        if bytes.len() != expected {
            return Err(RelayError::malformed(format!(
                "packet length mismatch: expected {expected} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        })
    }

    pub(crate) fn from_parts(header: PacketHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }
}

/// First four bytes of the payload's blake3 digest.
pub fn checksum(payload: &[u8]) -> u32 {
    let digest = blake3::hash(payload);
    let bytes = digest.as_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
