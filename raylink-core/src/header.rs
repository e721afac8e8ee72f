//! Fixed-size packet header.
//!
//! ```text
//! magic          [u8; 4]  "RLK0"
//! checksum       u32      first 4 bytes of blake3(payload)
//! message_type   u32
//! flags          u32
//! payload_length u32
//! ```
//!
//! All integers are little-endian.

use crate::error::RelayError;
use crate::flags::PacketFlags;

/// Magic bytes at the start of every frame.
pub const MAGIC: [u8; 4] = *b"RLK0";

/// Encoded size of a [`PacketHeader`] on the wire.
pub const HEADER_SIZE: usize = 20;

pub type PacketHeaderBytes = [u8; HEADER_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    checksum: u32,
    message_type: u32,
    flags: PacketFlags,
    payload_length: u32,
}

impl PacketHeader {
    pub fn new(checksum: u32, message_type: u32, flags: PacketFlags, payload_length: u32) -> Self {
        Self {
            checksum,
            message_type,
            flags,
            payload_length,
        }
    }

    pub fn to_bytes(&self) -> PacketHeaderBytes {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..12].copy_from_slice(&self.message_type.to_le_bytes());
        buf[12..16].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[16..20].copy_from_slice(&self.payload_length.to_le_bytes());
        buf
    }

    /// Parse a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Only the magic is validated here; the type tag is kept raw so
    /// the receiver can decide how to treat an unknown message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        if bytes.len() < HEADER_SIZE {
            return Err(RelayError::malformed(format!(
                "header too short: {} < {HEADER_SIZE}",
                bytes.len()
            )));
        }
        if bytes[0..4] != MAGIC {
            return Err(RelayError::InvalidMagic);
        }
        Ok(Self {
            checksum: read_u32(bytes, 4),
            message_type: read_u32(bytes, 8),
            flags: PacketFlags::from_bits_retain(read_u32(bytes, 12)),
            payload_length: read_u32(bytes, 16),
        })
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn message_type(&self) -> u32 {
        self.message_type
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn payload_length(&self) -> usize {
        self.payload_length as usize
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
