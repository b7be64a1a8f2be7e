//! MTU-bounded fragmentation of outbound buffers.

use std::iter::FusedIterator;

use crate::core::{ATT_HEADER_LEN, FALLBACK_CHUNK_SIZE};

/// Payload bytes that fit in one write for the given ATT MTU.
///
/// Reserves [`ATT_HEADER_LEN`] bytes for the ATT header. An MTU too small to
/// carry any payload (including an unknown, zero MTU) uses
/// [`FALLBACK_CHUNK_SIZE`].
pub fn chunk_size(mtu: u16) -> usize {
    let mtu = mtu as usize;
    if mtu > ATT_HEADER_LEN {
        mtu - ATT_HEADER_LEN
    } else {
        FALLBACK_CHUNK_SIZE
    }
}

/// Split `buffer` into chunks sized for `mtu`.
pub fn split(buffer: &[u8], mtu: u16) -> Chunks<'_> {
    Chunks::new(buffer, chunk_size(mtu))
}

/// One slice of a larger buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Offset of the first byte within the source buffer.
    pub offset: usize,
    /// The bytes to write.
    pub bytes: &'a [u8],
}

impl Chunk<'_> {
    /// Length of this chunk.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the chunk is empty (never true for chunks from [`split`]).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lazy, in-order iterator over the chunks of a buffer.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    buffer: &'a [u8],
    size: usize,
    offset: usize,
}

impl<'a> Chunks<'a> {
    /// Iterate `buffer` in pieces of at most `size` bytes.
    ///
    /// A `size` of zero is treated as one byte.
    pub fn new(buffer: &'a [u8], size: usize) -> Self {
        Self {
            buffer,
            size: size.max(1),
            offset: 0,
        }
    }

    /// Nominal chunk size.
    pub fn chunk_size(&self) -> usize {
        self.size
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.buffer.len() {
            return None;
        }
        let end = (self.offset + self.size).min(self.buffer.len());
        let chunk = Chunk {
            offset: self.offset,
            bytes: &self.buffer[self.offset..end],
        };
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len() - self.offset;
        let count = remaining.div_ceil(self.size);
        (count, Some(count))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

impl FusedIterator for Chunks<'_> {}
