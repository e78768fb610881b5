use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio_util::sync::CancellationToken;

use super::chunk_plan::Chunk;

/// Where one chunk's task currently is: bytes in `[begin, current)` have been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub index: usize,
    pub begin: u64,
    pub end: u64,
    pub current: u64,
}

/// Receives a snapshot of every chunk, ordered by chunk index, after each block written.
/// It is called from several tasks at once and must return quickly.
pub type ProgressCallback = Arc<dyn Fn(&[ChunkProgress]) + Send + Sync>;

/// State shared by the chunk tasks of one transfer.
pub(super) struct HttpDownloadSession {
    chunks: Vec<Chunk>,
    cursors: Vec<AtomicU64>,
    progress: Option<ProgressCallback>,
    pub(super) token: CancellationToken,
}

impl HttpDownloadSession {
    pub(super) fn new(
        chunks: Vec<Chunk>,
        progress: Option<ProgressCallback>,
        token: CancellationToken,
    ) -> Self {
        let cursors = chunks.iter().map(|c| AtomicU64::new(c.begin)).collect();
        Self {
            chunks,
            cursors,
            progress,
            token,
        }
    }

    pub(super) fn advance(&self, index: usize, current: u64) {
        self.cursors[index].store(current, Ordering::Relaxed);
        if let Some(callback) = &self.progress {
            callback(&self.snapshot());
        }
    }

    /// A retried chunk starts over from its first byte.
    pub(super) fn reset(&self, index: usize) {
        self.advance(index, self.chunks[index].begin);
    }

    pub(super) fn snapshot(&self) -> Vec<ChunkProgress> {
        self.chunks
            .iter()
            .zip(&self.cursors)
            .enumerate()
            .map(|(index, (chunk, cursor))| ChunkProgress {
                index,
                begin: chunk.begin,
                end: chunk.end,
                current: cursor.load(Ordering::Relaxed),
            })
            .collect()
    }
}
