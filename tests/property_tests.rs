//! Property-based tests using proptest
//!
//! These tests validate framing and buffering invariants across randomly
//! generated messages and delivery patterns.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use authwire::core::segment::Segment;
use authwire::core::stream_buffer::StreamBuffer;
use authwire::protocol::framer;
use authwire::protocol::message::Message;
use proptest::prelude::*;

fn any_message() -> impl Strategy<Value = Message> {
    let text = || ".{0,300}";
    prop_oneof![
        Just(Message::Hello),
        Just(Message::Generic1),
        Just(Message::Generic2),
        Just(Message::Generic3),
        Just(Message::Generic4),
        Just(Message::Generic5),
        Just(Message::Menu),
        text().prop_map(Message::DisplayMessage),
        text().prop_map(Message::LoginSetUsername),
        text().prop_map(Message::LoginSetPassword),
        text().prop_map(Message::LoginAuthenticate),
        any::<bool>().prop_map(Message::LoginSetUsernameResponse),
        any::<bool>().prop_map(Message::LoginSetPasswordResponse),
        any::<bool>().prop_map(Message::LoginAuthenticateResponse),
    ]
}

fn encode_all(messages: &[Message]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| framer::encode(m).expect("encode").to_vec())
        .collect()
}

/// Split `bytes` at the given cut points (taken modulo the length)
fn fragments(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return Vec::new();
    }
    let mut points: Vec<usize> = cuts.iter().map(|c| c % bytes.len()).filter(|c| *c > 0).collect();
    points.sort_unstable();
    points.dedup();

    let mut pieces = Vec::new();
    let mut start = 0;
    for point in points.into_iter().chain(std::iter::once(bytes.len())) {
        pieces.push(bytes[start..point].to_vec());
        start = point;
    }
    pieces
}

fn drain(buffer: &mut StreamBuffer, out: &mut Vec<Message>) {
    while let Some(message) = framer::get(buffer).expect("well-formed stream") {
        out.push(message);
    }
}

// Property: reassembly does not depend on how the bytes were delivered
proptest! {
    #[test]
    fn prop_fragmentation_independence(
        messages in prop::collection::vec(any_message(), 1..20),
        cuts in prop::collection::vec(any::<usize>(), 0..40),
    ) {
        let wire = encode_all(&messages);

        let mut one_shot = StreamBuffer::new();
        one_shot.append(Segment::copy_from(&wire));
        let mut expected = Vec::new();
        drain(&mut one_shot, &mut expected);

        let mut buffer = StreamBuffer::new();
        let mut received = Vec::new();
        for piece in fragments(&wire, &cuts) {
            buffer.append(Segment::from(piece));
            drain(&mut buffer, &mut received);
        }

        prop_assert_eq!(&expected, &messages);
        prop_assert_eq!(received, messages);
        prop_assert!(buffer.is_empty());
    }
}

// Property: peek leaves the buffer untouched and agrees with get
proptest! {
    #[test]
    fn prop_peek_is_pure(
        message in any_message(),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
        trailing in prop::collection::vec(any::<u8>(), 0..4),
    ) {
        let mut wire = framer::encode(&message).expect("encode").to_vec();
        let frame_len = wire.len();
        wire.extend_from_slice(&trailing);

        let mut buffer = StreamBuffer::new();
        for piece in fragments(&wire, &cuts) {
            buffer.append(Segment::from(piece));
        }
        let before = buffer.len();

        let peeked = framer::peek(&buffer).expect("peek");
        let peeked_again = framer::peek(&buffer).expect("peek");
        prop_assert_eq!(buffer.len(), before);
        prop_assert_eq!(&peeked, &peeked_again);

        let got = framer::get(&mut buffer).expect("get");
        prop_assert_eq!(peeked, got.clone());
        prop_assert_eq!(got, Some(message));
        prop_assert_eq!(buffer.len(), before - frame_len);
    }
}

// Property: a truncated frame is never reported and never consumed
proptest! {
    #[test]
    fn prop_incomplete_frame_stays_buffered(message in any_message(), keep in any::<usize>()) {
        let wire = framer::encode(&message).expect("encode");
        let keep = keep % wire.len();

        let mut buffer = StreamBuffer::new();
        buffer.append(Segment::copy_from(&wire[..keep]));
        prop_assert_eq!(framer::get(&mut buffer).expect("get"), None);
        prop_assert_eq!(buffer.len(), keep);
    }
}

// Property: consuming past the end reports the exact deficit
proptest! {
    #[test]
    fn prop_consume_reports_deficit(
        pieces in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
        extra in 0usize..1000,
    ) {
        let mut buffer = StreamBuffer::new();
        let total: usize = pieces.iter().map(Vec::len).sum();
        for piece in pieces {
            buffer.append(Segment::from(piece));
        }

        let deficit = buffer.consume(total + extra);
        prop_assert_eq!(deficit, extra);
        prop_assert!(buffer.is_empty());
        prop_assert_eq!(buffer.segment_count(), 0);
    }
}

// Property: indexed access matches the flattened byte sequence
proptest! {
    #[test]
    fn prop_at_matches_flattened(
        pieces in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..32), 1..8),
        skip in 0usize..64,
    ) {
        let flat: Vec<u8> = pieces.concat();
        let mut buffer = StreamBuffer::new();
        for piece in pieces {
            buffer.append(Segment::from(piece));
        }
        let skip = skip.min(flat.len());
        buffer.consume(skip);

        for (i, byte) in flat[skip..].iter().enumerate() {
            prop_assert_eq!(buffer.at(i), Some(*byte));
        }
        prop_assert_eq!(buffer.at(flat.len() - skip), None);
    }
}
