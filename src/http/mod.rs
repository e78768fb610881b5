mod bytes_aggregator;
mod chunk_plan;
mod config;
mod core;
mod file_writer;
mod filename_utils;
mod info;
mod options;
mod probe;
mod request_utils;
mod selector;
mod session;
mod setup;
#[cfg(test)]
mod tests;
mod verify;

pub use chunk_plan::{Chunk, plan_chunks};
pub use self::core::{ChunkOutcome, TransferSummary};
pub use file_writer::{MemoryWriter, PositionalWriter};
pub use info::DownloadInfo;
pub use probe::{SourceRecord, probe, reconcile};
pub use session::{ChunkProgress, ProgressCallback};
pub use setup::{
    ClientRequired, MultiDownloaderSetup, MultiDownloaderSetupBuilder, SetupBuilder, UrlsRequired,
};
pub use verify::{
    DigestAlgorithm, digest_file, normalize_validator, read_checksum_file, verify_file,
};

use config::HttpDownloadConfig;
use file_writer::FileWriter;
use options::DownloadOptions;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{Span, debug, warn};

const STAGING_EXTENSION: &str = ".part";

pub struct MultiDownloader {
    client: Arc<Client>,
    urls: Arc<Vec<String>>,
    pub info: DownloadInfo,
    config: HttpDownloadConfig,
    options: DownloadOptions,
    chunks: Vec<Chunk>,
    output: Option<OutputFile>,
    destination: Option<PathBuf>,
    pub status: Arc<Mutex<Status>>,
    span: Span,
}

struct OutputFile {
    part_path: PathBuf,
    writer: Arc<FileWriter>,
}

impl MultiDownloader {
    pub fn setup() -> MultiDownloaderSetupBuilder<ClientRequired> {
        MultiDownloaderSetupBuilder::default()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Final location of the downloaded file, known once [`allocate`](Self::allocate) succeeded.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    fn default_destination(&self) -> PathBuf {
        match &self.config.directory {
            Some(directory) => directory.join(self.info.filename()),
            None => PathBuf::from(self.info.filename()),
        }
    }

    /// Creates the staging file next to `path` (or the derived filename) and sizes it
    /// to the object's length, so every chunk write lands inside the file.
    pub fn allocate(&mut self, path: Option<PathBuf>) -> Result<fs::Metadata, Error> {
        let destination = path.unwrap_or_else(|| self.default_destination());
        let part_path = staging_path(&destination);
        let writer = FileWriter::allocate(&part_path, self.info.content_length())?;
        let metadata = writer.metadata()?;
        debug!(
            parent: &self.span,
            path = %part_path.display(),
            length = metadata.len(),
            "allocated output file"
        );

        self.output = Some(OutputFile {
            part_path,
            writer: Arc::new(writer),
        });
        self.destination = Some(destination);
        Ok(metadata)
    }

    /// Downloads every chunk into the allocated file. The staging file is renamed to its
    /// final name only when all chunks succeeded, and removed otherwise.
    pub async fn download(
        &mut self,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferSummary, Error> {
        let output = self.output.take().ok_or(Error::NotAllocated)?;
        let destination = self.destination.clone().ok_or(Error::NotAllocated)?;

        self.status.update(Status::Downloading);
        let result = self.run_transfer(Arc::clone(&output.writer), progress).await;
        drop(output.writer);

        let result = result.and_then(|summary| {
            fs::rename(&output.part_path, &destination)?;
            debug!(parent: &self.span, path = %destination.display(), "download finalized");
            Ok(summary)
        });
        self.status.finish_with(result.as_ref().map(|_| ()));

        if result.is_err() {
            if let Err(remove_err) = fs::remove_file(&output.part_path) {
                warn!(
                    parent: &self.span,
                    path = %output.part_path.display(),
                    "failed to remove incomplete file: {remove_err}"
                );
            }
        }
        result
    }

    /// Compares the downloaded file with `expected_hex`. A mismatch leaves the file in place.
    pub async fn verify(&self, algorithm: DigestAlgorithm, expected_hex: &str) -> Result<(), Error> {
        let path = self.destination.clone().ok_or(Error::NotAllocated)?;
        let expected = expected_hex.to_string();
        let buffer_size = self.config.buffer_size;
        let result = tokio::task::spawn_blocking(move || {
            verify::verify_file_with_buffer(&path, algorithm, &expected, buffer_size)
        })
        .await?;

        match &result {
            Ok(()) => debug!(parent: &self.span, %algorithm, "integrity check passed"),
            Err(err) => warn!(parent: &self.span, %algorithm, "integrity check failed: {err}"),
        }
        result
    }

    /// Like [`verify`](Self::verify), with the expected digest read from a checksum file.
    pub async fn verify_checksum_file(
        &self,
        algorithm: DigestAlgorithm,
        checksum_path: impl AsRef<Path>,
    ) -> Result<(), Error> {
        let checksum_path = checksum_path.as_ref().to_path_buf();
        let expected =
            tokio::task::spawn_blocking(move || verify::read_checksum_file(&checksum_path))
                .await??;
        self.verify(algorithm, &expected).await
    }

    /// Treats the sources' validator as an MD5 digest of the content and checks the file against it.
    pub async fn verify_validator(&self) -> Result<(), Error> {
        let validator = self
            .info
            .validator()
            .ok_or_else(|| Error::InvalidValidator(String::new()))?;
        let digest = normalize_validator(validator);
        if digest.len() != 32 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidValidator(validator.to_string()));
        }
        self.verify(DigestAlgorithm::Md5, digest).await
    }
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut path = destination.as_os_str().to_owned();
    path.push(STAGING_EXTENSION);
    PathBuf::from(path)
}

#[derive(Debug, thiserror::Error)]
pub enum BuilderErrors {
    #[error("tasks count must be at least 1")]
    InvalidTasksCount,
    #[error("buffer size must be greater than zero")]
    InvalidBufferSize,
    #[error("no source urls were given")]
    NoUrls,
    #[error("invalid source url: {0}")]
    InvalidUrl(String),
    #[error("not a directory: {0}")]
    InvalidDirectory(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no sources to download from")]
    NoSources,
    #[error("source {url} is not reachable: {reason}")]
    Connectivity { url: String, reason: String },
    #[error("source {url} disagrees on {field}: expected {expected}, got {actual}")]
    Consistency {
        url: String,
        field: &'static str,
        expected: String,
        actual: String,
    },
    #[error("source {url} did not report a content length")]
    MissingLength { url: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chunk {index} failed after {attempts} attempt(s): {source}")]
    ChunkTransfer {
        index: usize,
        attempts: usize,
        #[source]
        source: ChunkError,
    },
    #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
    DigestMismatch {
        algorithm: DigestAlgorithm,
        expected: String,
        actual: String,
    },
    #[error("checksum file {0} holds no digest")]
    EmptyChecksumFile(PathBuf),
    #[error("validator {0:?} is not an md5 digest")]
    InvalidValidator(String),
    #[error("output file was not allocated")]
    NotAllocated,
    #[error("download canceled")]
    Canceled,
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("source ignored the range request")]
    RangeIgnored,
    #[error("content range starts at {actual}, expected {expected}")]
    ContentRangeMismatch { expected: u64, actual: u64 },
    #[error("source now reports {actual} bytes in total, expected {expected}")]
    LengthChanged { expected: u64, actual: u64 },
    #[error("stream ended after {received} of {expected} bytes")]
    ShortRead { expected: u64, received: u64 },
    #[error("source sent more than {expected} bytes")]
    Overflow { expected: u64 },
    #[error("write failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("canceled")]
    Canceled,
}

impl From<reqwest::Error> for ChunkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChunkError::Timeout
        } else {
            ChunkError::Network(e)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Pending,
    Downloading,
    Completed,
    Failed(String),
    Canceled,
}

trait StatusMutexExt {
    fn update(&self, new: Status);
    fn finish_with(&self, result: Result<(), &Error>);
}

impl StatusMutexExt for Mutex<Status> {
    fn update(&self, new: Status) {
        *self.lock() = new
    }

    fn finish_with(&self, result: Result<(), &Error>) {
        let mut guard = self.lock();
        if !matches!(*guard, Status::Downloading) {
            return;
        }
        *guard = match result {
            Ok(()) => Status::Completed,
            Err(Error::Canceled) => Status::Canceled,
            Err(e) => Status::Failed(e.to_string()),
        }
    }
}
