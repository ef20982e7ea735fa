//! # Segment
//!
//! An immutable byte window with a consumption offset.
//!
//! Segments are produced by a single socket read or by encoding a single
//! message and are owned by exactly one [`StreamBuffer`](super::stream_buffer::StreamBuffer)
//! slot at a time. The bytes themselves never change; only the offset moves.

use bytes::Bytes;

/// A fixed byte range plus how much of it has already been consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    data: Bytes,
    offset: usize,
}

impl Segment {
    /// Copy `bytes` into a new segment
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self::from(Bytes::copy_from_slice(bytes))
    }

    /// The unconsumed bytes
    #[inline]
    pub fn view(&self) -> &[u8] {
        &self.data[self.offset..]
    }

    /// Number of unconsumed bytes
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Total size of the window, consumed or not
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.offset == self.data.len()
    }

    /// Byte at logical index `i` of the unconsumed view
    #[inline]
    pub fn get(&self, i: usize) -> Option<u8> {
        self.view().get(i).copied()
    }

    /// Advance the offset by `min(n, remaining)`.
    ///
    /// Returns the deficit `n - remaining` when `n` overshoots, so a caller can
    /// cascade the rest of the consumption into the next segment.
    pub fn consume(&mut self, n: usize) -> usize {
        let remaining = self.remaining();
        if n > remaining {
            self.offset = self.data.len();
            n - remaining
        } else {
            self.offset += n;
            0
        }
    }

    /// First `n` unconsumed bytes as a shared slice, without consuming them
    pub fn prefix(&self, n: usize) -> Bytes {
        let end = (self.offset + n).min(self.data.len());
        self.data.slice(self.offset..end)
    }

    /// Detach the unconsumed bytes without copying
    pub fn into_bytes(self) -> Bytes {
        self.data.slice(self.offset..)
    }
}

impl From<Bytes> for Segment {
    fn from(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }
}

impl From<Vec<u8>> for Segment {
    fn from(data: Vec<u8>) -> Self {
        Self::from(Bytes::from(data))
    }
}

impl From<&'static str> for Segment {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Segment {
    fn from(text: String) -> Self {
        Self::from(text.into_bytes())
    }
}
