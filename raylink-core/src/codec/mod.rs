//! Length-delimited framing for [`Packet`]s over a byte stream.
//!
//! Only framing problems are errors here: a bad magic or an oversized
//! frame means the stream cannot be resynchronised, so the connection is
//! dropped. Type tags and checksums are left to the receiver, which drops
//! a bad message without tearing down the link.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::RelayError;
use crate::header::{HEADER_SIZE, PacketHeader};
use crate::packet::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, Packet};

#[derive(Debug, Default, Clone, Copy)]
pub struct RelayCodec;

impl Decoder for RelayCodec {
    type Item = Packet;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = PacketHeader::from_bytes(&src[..HEADER_SIZE])?;
        let payload_length = header.payload_length();
        if payload_length > MAX_PAYLOAD_SIZE {
            return Err(RelayError::FrameTooLarge {
                size: HEADER_SIZE + payload_length,
                max: MAX_FRAME_SIZE,
            });
        }

        let frame_length = HEADER_SIZE + payload_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(payload_length).freeze();
        Ok(Some(Packet::from_parts(header, payload)))
    }
}

impl Encoder<Packet> for RelayCodec {
    type Error = RelayError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(HEADER_SIZE + item.payload().len());
        item.write_to(dst);
        Ok(())
    }
}
