use bytes::{Bytes, BytesMut};

/// Collects response chunks of arbitrary size and hands them back as fixed-size blocks,
/// each tagged with the file offset it belongs at.
pub(super) struct BytesAggregator {
    buffer: BytesMut,
    block_size: usize,
    start_seek: u64,
}

impl BytesAggregator {
    pub(super) fn new(start: u64, block_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(block_size),
            block_size,
            start_seek: start,
        }
    }

    pub(super) fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub(super) fn next_block(&mut self) -> Option<(u64, Bytes)> {
        if self.buffer.len() < self.block_size {
            return None;
        }
        Some(self.split(self.block_size))
    }

    /// Drains whatever is left, which may be shorter than a block.
    pub(super) fn finish(&mut self) -> Option<(u64, Bytes)> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.split(self.buffer.len()))
    }

    fn split(&mut self, len: usize) -> (u64, Bytes) {
        let offset = self.start_seek;
        let block = self.buffer.split_to(len).freeze();
        self.start_seek += len as u64;
        (offset, block)
    }
}
