use std::{
    fs::{File, Metadata, OpenOptions},
    io,
    path::Path,
};

use parking_lot::Mutex;

/// A byte sink that accepts writes at absolute offsets.
///
/// Chunk tasks share one writer and write concurrently; their ranges never overlap,
/// so implementations do not need to order writes against each other.
pub trait PositionalWriter: Send + Sync {
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Called once after every chunk has been written.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

pub(super) struct FileWriter {
    file: File,
}

impl FileWriter {
    /// Creates (or truncates) `path` and sets its length before any chunk is written.
    pub(super) fn allocate(path: &Path, length: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(length)?;
        Ok(Self { file })
    }

    pub(super) fn metadata(&self) -> io::Result<Metadata> {
        self.file.metadata()
    }
}

impl PositionalWriter for FileWriter {
    #[cfg(unix)]
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, mut offset: u64, mut buf: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_write(buf, offset) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => {
                    buf = &buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}

/// A fixed-length in-memory buffer. Writes past its length fail the same way a write
/// outside an allocated file region would be a bug.
pub struct MemoryWriter {
    buffer: Mutex<Vec<u8>>,
}

impl MemoryWriter {
    /// Fails when `length` does not fit in memory on this platform.
    pub fn new(length: u64) -> io::Result<Self> {
        let length = usize::try_from(length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length out of range"))?;
        Ok(Self {
            buffer: Mutex::new(vec![0; length]),
        })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer.into_inner()
    }
}

impl PositionalWriter for MemoryWriter {
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut buffer = self.buffer.lock();
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= buffer.len())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "write past end of buffer")
            })?;
        buffer[start..end].copy_from_slice(buf);
        Ok(())
    }
}
