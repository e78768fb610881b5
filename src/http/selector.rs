/// Yields the sources a chunk may be fetched from, in the order they should be tried.
///
/// Chunk `i` starts at source `i % sources`, then walks round-robin over the sources it
/// has not tried yet. At most `max_retries + 1` sources are yielded, and never the same
/// one twice.
pub(super) struct SourceSelector {
    next: usize,
    sources: usize,
    remaining: usize,
}

impl SourceSelector {
    pub(super) fn new(chunk_index: usize, sources: usize, max_retries: u32) -> Self {
        let budget = (max_retries as usize).saturating_add(1);
        Self {
            next: if sources == 0 { 0 } else { chunk_index % sources },
            sources,
            remaining: budget.min(sources),
        }
    }
}

impl Iterator for SourceSelector {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let source = self.next;
        self.next = (self.next + 1) % self.sources;
        Some(source)
    }
}
