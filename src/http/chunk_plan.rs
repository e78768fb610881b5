/// A half-open byte interval `[begin, end)` fetched by exactly one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub begin: u64,
    pub end: u64,
}

impl Chunk {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Value of the `Range` header for this chunk. HTTP ranges are inclusive, so the
    /// last byte requested is `end - 1`. Empty chunks have no valid range.
    pub fn http_range(&self) -> Option<String> {
        (!self.is_empty()).then(|| format!("bytes={}-{}", self.begin, self.end - 1))
    }
}

impl From<(u64, u64)> for Chunk {
    fn from((begin, end): (u64, u64)) -> Self {
        Chunk::new(begin, end)
    }
}

fn split_content(content_length: u64, parts: u64) -> (u64, u64) {
    (content_length / parts, content_length % parts) // Example: split_content(1003, 4) returns (250, 3), meaning 3 parts get 251 bytes and 1 part gets 250 bytes
}

/// Splits `content_length` bytes into `parts` contiguous chunks whose sizes differ by at most one byte.
///
/// The first `content_length % parts` chunks carry the extra byte. A `parts` of zero is
/// treated as one.
pub fn plan_chunks(content_length: u64, parts: u32) -> Vec<Chunk> {
    let parts = u64::from(parts.max(1));
    let (part_size, remainder) = split_content(content_length, parts);

    let mut chunks = Vec::with_capacity(parts as usize);
    let mut begin = 0;
    for index in 0..parts {
        let size = if index < remainder {
            part_size + 1
        } else {
            part_size
        };
        chunks.push(Chunk::new(begin, begin + size));
        begin += size;
    }
    chunks
}
