//! # Message Codec
//!
//! `tokio_util` codec for the same wire format the reactor speaks, so the
//! protocol can also be driven through `Framed` over any async byte stream.
//!
//! Decoding is zero-copy on the header path: the frame is split off the read
//! buffer once the declared length is available.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};
use crate::protocol::framer::{self, Header};
use crate::protocol::message::{Message, HEADER_LEN};

#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let header = Header::parse([src[0], src[1], src[2]])?;
        let length = header.length as usize;
        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(length);
        frame.advance(HEADER_LEN);
        framer::decode_body(header.opcode, &frame).map(Some)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        framer::encode_into(&item, dst)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        framer::encode_into(item, dst)
    }
}
