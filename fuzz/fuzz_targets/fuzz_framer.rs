#![no_main]

use authwire::core::segment::Segment;
use authwire::core::stream_buffer::StreamBuffer;
use authwire::protocol::framer;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the fragment size, the rest is the stream
    let Some((&split, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut buffer = StreamBuffer::new();
    for piece in stream.chunks(chunk) {
        buffer.append(Segment::copy_from(piece));
        loop {
            let before = buffer.len();
            match framer::get(&mut buffer) {
                Ok(Some(message)) => {
                    assert!(buffer.len() < before);
                    if let Ok(encoded) = framer::encode(&message) {
                        assert_eq!(encoded.len(), message.encoded_len());
                    }
                }
                Ok(None) => {
                    assert_eq!(buffer.len(), before);
                    break;
                }
                // Desync: the connection would be dropped here
                Err(_) => return,
            }
        }
    }
});
