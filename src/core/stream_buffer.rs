//! # Stream Buffer
//!
//! Ordered queue of [`Segment`]s holding the unconsumed bytes of one direction
//! of one connection.
//!
//! Every non-blocking read appends its own segment instead of growing a single
//! contiguous array, so parsing can consume across however many reads produced
//! the bytes. Logical indexing is linear in the number of segments, which stays
//! small per connection.
//!
//! ## Invariant
//! No fully consumed segment survives at the head past the operation that
//! emptied it, and empty segments are never queued.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use super::segment::Segment;

/// Queue of segments in arrival/enqueue order
#[derive(Debug, Default)]
pub struct StreamBuffer {
    segments: VecDeque<Segment>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical length: sum of remaining bytes across segments
    pub fn len(&self) -> usize {
        self.segments.iter().map(Segment::remaining).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of queued segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Head segment, if any
    pub fn front(&self) -> Option<&Segment> {
        self.segments.front()
    }

    /// Queue a segment at the tail. Empty segments are discarded.
    pub fn append(&mut self, segment: impl Into<Segment>) {
        let segment = segment.into();
        if segment.remaining() > 0 {
            self.segments.push_back(segment);
        }
    }

    /// Move every segment of `self` to the tail of `other`, preserving order.
    ///
    /// `self` is left empty.
    pub fn drain_into(&mut self, other: &mut StreamBuffer) {
        other.segments.append(&mut self.segments);
    }

    /// Byte at logical index `i`
    pub fn at(&self, i: usize) -> Option<u8> {
        let mut start = 0;
        for segment in &self.segments {
            let end = start + segment.remaining();
            if end > i {
                return segment.get(i - start);
            }
            start = end;
        }
        None
    }

    /// Position of the first byte matching `pred`, scanning logically
    pub fn position(&self, mut pred: impl FnMut(u8) -> bool) -> Option<usize> {
        self.segments
            .iter()
            .flat_map(|segment| segment.view().iter().copied())
            .position(|b| pred(b))
    }

    /// Consume `n` bytes across segment boundaries.
    ///
    /// Returns the deficit when fewer than `n` bytes were buffered; the buffer
    /// is then logically empty.
    pub fn consume(&mut self, n: usize) -> usize {
        let mut pending = n;
        while pending > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            pending = front.consume(pending);
            if front.is_consumed() {
                self.segments.pop_front();
            }
        }
        self.pop_consumed();
        pending
    }

    /// Copy the first `dst.len()` bytes into `dst` without consuming them.
    ///
    /// Returns `false`, leaving `dst` untouched, when not enough bytes are buffered.
    pub fn peek_into(&self, dst: &mut [u8]) -> bool {
        if self.len() < dst.len() {
            return false;
        }

        let mut copied = 0;
        for segment in &self.segments {
            if copied == dst.len() {
                break;
            }
            let view = segment.view();
            let chunk = view.len().min(dst.len() - copied);
            dst[copied..copied + chunk].copy_from_slice(&view[..chunk]);
            copied += chunk;
        }
        true
    }

    /// Copy the first `dst.len()` bytes into `dst` and consume them.
    pub fn take_into(&mut self, dst: &mut [u8]) -> bool {
        if !self.peek_into(dst) {
            return false;
        }
        self.consume(dst.len());
        true
    }

    /// Consume `n` bytes and return them as one contiguous block.
    ///
    /// A request that falls entirely inside the head segment is sliced without copying.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        if self.len() < n {
            return None;
        }

        if let Some(front) = self.segments.front() {
            if front.remaining() >= n {
                let bytes = front.prefix(n);
                self.consume(n);
                return Some(bytes);
            }
        }

        let mut out = BytesMut::zeroed(n);
        self.take_into(&mut out[..]);
        Some(out.freeze())
    }

    fn pop_consumed(&mut self) {
        while self
            .segments
            .front()
            .is_some_and(Segment::is_consumed)
        {
            self.segments.pop_front();
        }
    }
}
