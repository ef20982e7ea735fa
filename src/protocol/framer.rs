//! # Message Framer
//!
//! Peels complete frames off a [`StreamBuffer`] and encodes messages for the wire.
//!
//! `peek` never mutates the buffer; `get` is `peek` followed by consuming exactly
//! the declared frame length. Both report `Ok(None)` while the frame is still
//! incomplete, so a trailing partial frame stays buffered for the next read.
//!
//! A frame with an opcode outside the catalogue decodes to [`Message::Unknown`]
//! and is consumed like any other frame; callers reply and keep going.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::segment::Segment;
use crate::core::stream_buffer::StreamBuffer;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{Message, Opcode, PayloadShape, HEADER_LEN, MAX_STRING_PAYLOAD};

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total frame length, header included
    pub length: u16,
    pub opcode: u8,
}

impl Header {
    pub fn parse(raw: [u8; HEADER_LEN]) -> Result<Self> {
        let header = Self {
            length: u16::from_be_bytes([raw[0], raw[1]]),
            opcode: raw[2],
        };
        if (header.length as usize) < HEADER_LEN {
            return Err(ProtocolError::MalformedFrame {
                opcode: header.opcode,
                reason: constants::ERR_SHORT_LENGTH,
            });
        }
        Ok(header)
    }

    #[inline]
    pub fn payload_len(&self) -> usize {
        self.length as usize - HEADER_LEN
    }
}

/// Read the header without consuming anything
pub fn peek_header(buffer: &StreamBuffer) -> Result<Option<Header>> {
    let mut raw = [0u8; HEADER_LEN];
    if !buffer.peek_into(&mut raw) {
        return Ok(None);
    }
    Header::parse(raw).map(Some)
}

/// Decode the next complete frame without consuming it
pub fn peek(buffer: &StreamBuffer) -> Result<Option<Message>> {
    Ok(peek_frame(buffer)?.map(|(_, message)| message))
}

/// Decode and consume the next complete frame
pub fn get(buffer: &mut StreamBuffer) -> Result<Option<Message>> {
    match peek_frame(buffer)? {
        Some((header, message)) => {
            buffer.consume(header.length as usize);
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

fn peek_frame(buffer: &StreamBuffer) -> Result<Option<(Header, Message)>> {
    let Some(header) = peek_header(buffer)? else {
        return Ok(None);
    };
    if buffer.len() < header.length as usize {
        return Ok(None);
    }

    let mut frame = vec![0u8; header.length as usize];
    if !buffer.peek_into(&mut frame) {
        return Ok(None);
    }
    let message = decode_body(header.opcode, &frame[HEADER_LEN..])?;
    Ok(Some((header, message)))
}

/// Interpret a payload according to its opcode
pub fn decode_body(opcode: u8, payload: &[u8]) -> Result<Message> {
    let kind = Opcode::from(opcode);
    let malformed = |reason: &'static str| ProtocolError::MalformedFrame { opcode, reason };

    match kind.payload_shape() {
        _ if kind == Opcode::Unknown => Ok(Message::Unknown { opcode }),
        PayloadShape::None => {
            if !payload.is_empty() {
                return Err(malformed(constants::ERR_UNEXPECTED_PAYLOAD));
            }
            Ok(match kind {
                Opcode::Hello => Message::Hello,
                Opcode::Generic1 => Message::Generic1,
                Opcode::Generic2 => Message::Generic2,
                Opcode::Generic3 => Message::Generic3,
                Opcode::Generic4 => Message::Generic4,
                Opcode::Generic5 => Message::Generic5,
                _ => Message::Menu,
            })
        }
        PayloadShape::Flag => {
            let flag = match payload {
                [0] => false,
                [1] => true,
                _ => return Err(malformed(constants::ERR_BOOL_PAYLOAD)),
            };
            Ok(match kind {
                Opcode::LoginSetUsernameResponse => Message::LoginSetUsernameResponse(flag),
                Opcode::LoginSetPasswordResponse => Message::LoginSetPasswordResponse(flag),
                _ => Message::LoginAuthenticateResponse(flag),
            })
        }
        PayloadShape::Text => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| malformed(constants::ERR_INVALID_UTF8))?
                .to_owned();
            Ok(match kind {
                Opcode::DisplayMessage => Message::DisplayMessage(text),
                Opcode::LoginSetUsername => Message::LoginSetUsername(text),
                Opcode::LoginSetPassword => Message::LoginSetPassword(text),
                _ => Message::LoginAuthenticate(text),
            })
        }
    }
}

/// Serialize header and payload into `dst`
pub fn encode_into(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let length = message.encoded_len();
    if length - HEADER_LEN > MAX_STRING_PAYLOAD {
        return Err(ProtocolError::OversizedPayload(length - HEADER_LEN));
    }

    dst.reserve(length);
    dst.put_u16(length as u16);
    dst.put_u8(message.opcode_byte());

    match message {
        Message::DisplayMessage(text)
        | Message::LoginSetUsername(text)
        | Message::LoginSetPassword(text)
        | Message::LoginAuthenticate(text) => dst.put_slice(text.as_bytes()),
        Message::LoginSetUsernameResponse(flag)
        | Message::LoginSetPasswordResponse(flag)
        | Message::LoginAuthenticateResponse(flag) => dst.put_u8(u8::from(*flag)),
        _ => {}
    }
    Ok(())
}

/// Serialize a message into a standalone frame
pub fn encode(message: &Message) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(message.encoded_len());
    encode_into(message, &mut dst)?;
    Ok(dst.freeze())
}

/// Serialize a message into a segment ready to queue on an outbound buffer
pub fn encode_segment(message: &Message) -> Result<Segment> {
    encode(message).map(Segment::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> StreamBuffer {
        let mut buffer = StreamBuffer::new();
        buffer.append(Segment::copy_from(bytes));
        buffer
    }

    #[test]
    fn test_header_layout_is_big_endian_and_inclusive() {
        let frame = encode(&Message::display("hey")).expect("encode");
        assert_eq!(&frame[..], &[0x00, 0x06, 8, b'h', b'e', b'y']);

        let frame = encode(&Message::Menu).expect("encode");
        assert_eq!(&frame[..], &[0x00, 0x03, 7]);

        let frame = encode(&Message::LoginSetUsernameResponse(true)).expect("encode");
        assert_eq!(&frame[..], &[0x00, 0x04, 10, 1]);
    }

    #[test]
    fn test_peek_incomplete_header() {
        let buffer = buffer_with(&[0x00, 0x03]);
        assert!(peek(&buffer).expect("no error").is_none());
    }

    #[test]
    fn test_peek_incomplete_payload() {
        let buffer = buffer_with(&[0x00, 0x06, 8, b'h']);
        assert!(peek(&buffer).expect("no error").is_none());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_get_consumes_exactly_one_frame() {
        let mut bytes = encode(&Message::Hello).expect("encode").to_vec();
        bytes.extend_from_slice(&encode(&Message::Generic3).expect("encode"));
        bytes.push(0x00);
        let mut buffer = buffer_with(&bytes);

        assert_eq!(get(&mut buffer).expect("ok"), Some(Message::Hello));
        assert_eq!(get(&mut buffer).expect("ok"), Some(Message::Generic3));
        assert_eq!(get(&mut buffer).expect("ok"), None);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_unknown_opcode_is_skipped_by_length() {
        let mut buffer = buffer_with(&[0x00, 0x05, 0x63, 0xAA, 0xBB, 0x00, 0x03, 1]);
        assert_eq!(
            get(&mut buffer).expect("ok"),
            Some(Message::Unknown { opcode: 0x63 })
        );
        assert_eq!(get(&mut buffer).expect("ok"), Some(Message::Hello));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_short_declared_length_is_malformed() {
        let buffer = buffer_with(&[0x00, 0x02, 1]);
        let err = peek(&buffer).expect_err("length below header size");
        assert!(err.is_desync());
    }

    #[test]
    fn test_bad_boolean_payloads_are_malformed() {
        let buffer = buffer_with(&[0x00, 0x04, 14, 2]);
        assert!(peek(&buffer).is_err());

        let buffer = buffer_with(&[0x00, 0x05, 14, 1, 1]);
        assert!(peek(&buffer).is_err());

        let buffer = buffer_with(&[0x00, 0x03, 14]);
        assert!(peek(&buffer).is_err());
    }

    #[test]
    fn test_payload_on_empty_kind_is_malformed() {
        let buffer = buffer_with(&[0x00, 0x04, 1, 0]);
        assert!(matches!(
            peek(&buffer),
            Err(ProtocolError::MalformedFrame { opcode: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let buffer = buffer_with(&[0x00, 0x05, 9, 0xFF, 0xFE]);
        assert!(peek(&buffer).is_err());
    }

    #[test]
    fn test_oversized_string_is_rejected() {
        let fits = Message::display("x".repeat(MAX_STRING_PAYLOAD));
        let frame = encode(&fits).expect("largest payload encodes");
        assert_eq!(frame.len(), u16::MAX as usize);

        let too_big = Message::display("x".repeat(MAX_STRING_PAYLOAD + 1));
        assert!(matches!(
            encode(&too_big),
            Err(ProtocolError::OversizedPayload(n)) if n == MAX_STRING_PAYLOAD + 1
        ));
    }

    #[test]
    fn test_empty_string_payload() {
        let mut buffer = buffer_with(&encode(&Message::LoginAuthenticate(String::new())).expect("encode"));
        assert_eq!(
            get(&mut buffer).expect("ok"),
            Some(Message::LoginAuthenticate(String::new()))
        );
    }
}
