//! # MultiFetch
//!
//! `MultiFetch` downloads one file from one or more mirrors at once. The file is split into
//! contiguous byte ranges, each range is fetched by its own task with an HTTP `Range`
//! request, and the bytes are written straight to their offset in the output file.
//!
//! A download goes through four steps:
//!
//! 1. [`MultiDownloaderSetup::init`] probes every url and checks that they all serve the
//!    same object (same length, same entity tag when one is sent), then plans the chunks.
//! 2. [`MultiDownloader::allocate`] creates the output file at its final size.
//! 3. [`MultiDownloader::download`] fetches every chunk, spreading them round-robin over the
//!    urls and retrying a failed chunk against the urls it has not tried yet.
//! 4. [`MultiDownloader::verify`] checks the result against a SHA-256 or MD5 digest.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use multifetch::{DigestAlgorithm, MultiDownloader};
//!
//! let mut downloader = MultiDownloader::setup()
//!     .client(reqwest::Client::new())
//!     .urls(["https://mirror-a.example/file.iso", "https://mirror-b.example/file.iso"])
//!     .tasks_count(4)
//!     .timeout(std::time::Duration::from_secs(5))
//!     .build()?
//!     .init()
//!     .await?;
//!
//! downloader.allocate(None)?;
//! downloader.download(None).await?;
//! downloader.verify(DigestAlgorithm::Sha256, "9f86d081884c7d65...").await?;
//! # Ok(())
//! # }
//! ```

mod http;
pub use http::{
    BuilderErrors, Chunk, ChunkError, ChunkOutcome, ChunkProgress, ClientRequired, DigestAlgorithm,
    DownloadInfo, Error, MemoryWriter, MultiDownloader, MultiDownloaderSetup,
    MultiDownloaderSetupBuilder, PositionalWriter, ProgressCallback, SetupBuilder, SourceRecord,
    Status, TransferSummary, UrlsRequired, digest_file, normalize_validator, plan_chunks, probe,
    read_checksum_file, reconcile, verify_file,
};
