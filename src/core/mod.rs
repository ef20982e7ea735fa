//! # Core Buffer Components
//!
//! Segmented byte buffers and the async codec adapter.
//!
//! This module provides the foundation the reactor and the framer share: bytes
//! arrive as one [`Segment`](segment::Segment) per non-blocking read and queue up
//! in a [`StreamBuffer`](stream_buffer::StreamBuffer) until a full frame exists.
//!
//! ## Components
//! - **Segment**: Immutable byte window with a consumption offset
//! - **StreamBuffer**: Ordered segment queue with logical indexing and cross-segment reads
//! - **Codec**: Tokio codec for framing over async byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(2, BE, header-inclusive)] [Opcode(1)] [Payload(Length - 3)]
//! ```

pub mod codec;
pub mod segment;
pub mod stream_buffer;
