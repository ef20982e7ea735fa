use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use authwire::core::codec::MessageCodec;
use authwire::core::segment::Segment;
use authwire::core::stream_buffer::StreamBuffer;
use authwire::protocol::framer;
use authwire::protocol::message::{Message, MAX_STRING_PAYLOAD};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_framer_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer_encode_decode");
    let payload_sizes = [16usize, 256, 4096, MAX_STRING_PAYLOAD];

    for &size in &payload_sizes {
        let message = Message::display("x".repeat(size));
        let wire = framer::encode(&message).unwrap();
        group.throughput(Throughput::Bytes(wire.len() as u64));

        group.bench_function(format!("encode_{size}b"), |b| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(size + 3);
                framer::encode_into(&message, &mut buf).unwrap();
            })
        });
        group.bench_function(format!("get_{size}b"), |b| {
            b.iter_batched(
                || {
                    let mut buffer = StreamBuffer::new();
                    buffer.append(Segment::from(wire.clone()));
                    buffer
                },
                |mut buffer| {
                    let decoded = framer::get(&mut buffer).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("codec_decode_{size}b"), |b| {
            b.iter_batched(
                || BytesMut::from(&wire[..]),
                |mut buf| {
                    let mut codec = MessageCodec;
                    let decoded = codec.decode(&mut buf).unwrap();
                    assert!(decoded.is_some());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_fragmented_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer_fragmented");
    let mut codec = MessageCodec;
    let mut wire = BytesMut::new();
    for i in 0..100 {
        codec
            .encode(Message::LoginSetUsername(format!("user{i}")), &mut wire)
            .unwrap();
        codec.encode(Message::Hello, &mut wire).unwrap();
    }
    let wire = wire.freeze();
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for &chunk in &[1usize, 7, 64, 1024] {
        group.bench_function(format!("chunk_{chunk}b"), |b| {
            b.iter(|| {
                let mut buffer = StreamBuffer::new();
                let mut frames = 0;
                for piece in wire.chunks(chunk) {
                    buffer.append(Segment::copy_from(piece));
                    while framer::get(&mut buffer).unwrap().is_some() {
                        frames += 1;
                    }
                }
                assert_eq!(frames, 200);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_framer_encode_decode, bench_fragmented_stream);
criterion_main!(benches);
