use std::{sync::Arc, time::Duration};

use reqwest::{Client, Response, StatusCode, header::CONTENT_RANGE};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, warn};

use super::{
    ChunkError, Error, MultiDownloader, Status, StatusMutexExt,
    bytes_aggregator::BytesAggregator,
    chunk_plan::Chunk,
    file_writer::PositionalWriter,
    request_utils::{self, RequestBuilderExt},
    selector::SourceSelector,
    session::{HttpDownloadSession, ProgressCallback},
};

/// How a chunk ended up being fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub begin: u64,
    pub end: u64,
    /// Source that delivered the chunk, `None` for empty chunks which need no request.
    pub source: Option<String>,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes_written: u64,
    pub chunks: Vec<ChunkOutcome>,
}

impl MultiDownloader {
    /// Fetches every planned chunk into `writer`.
    ///
    /// Each chunk runs in its own task. A chunk that fails is retried against the sources it
    /// has not tried yet; once it runs out, the remaining tasks are cancelled and the chunk's
    /// error is returned. This only returns after every task has stopped writing.
    pub async fn download_to<W>(
        &self,
        writer: Arc<W>,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferSummary, Error>
    where
        W: PositionalWriter + 'static,
    {
        self.status.update(Status::Downloading);
        let result = self.run_transfer(writer, progress).await;
        self.status.finish_with(result.as_ref().map(|_| ()));
        result
    }

    pub(super) async fn run_transfer<W>(
        &self,
        writer: Arc<W>,
        progress: Option<ProgressCallback>,
    ) -> Result<TransferSummary, Error>
    where
        W: PositionalWriter + 'static,
    {
        let token = self.options.token.child_token();
        let session = Arc::new(HttpDownloadSession::new(
            self.chunks.clone(),
            progress,
            token.clone(),
        ));
        let writer: Arc<dyn PositionalWriter> = writer;

        let mut tasks = JoinSet::new();
        for (index, chunk) in self.chunks.iter().copied().enumerate() {
            let task = ChunkTask {
                index,
                chunk,
                content_length: self.info.content_length(),
                client: Arc::clone(&self.client),
                urls: Arc::clone(&self.urls),
                writer: Arc::clone(&writer),
                session: Arc::clone(&session),
                timeout: self.config.timeout,
                max_retries: self.config.max_retries,
                buffer_size: self.config.buffer_size,
            };
            tasks.spawn(task.run().instrument(self.span.clone()));
        }

        let mut outcomes = Vec::with_capacity(self.chunks.len());
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(Error::Canceled)) => {}
                Ok(Err(err)) => {
                    token.cancel();
                    failure.get_or_insert(err);
                }
                Err(join_err) => {
                    token.cancel();
                    failure.get_or_insert(Error::Join(join_err));
                }
            }
        }

        if let Some(err) = failure {
            warn!(parent: &self.span, "download failed: {err}");
            return Err(err);
        }
        if outcomes.len() != self.chunks.len() {
            info!(parent: &self.span, "download canceled");
            return Err(Error::Canceled);
        }

        writer.flush()?;
        outcomes.sort_by_key(|outcome| outcome.index);
        let summary = TransferSummary {
            bytes_written: self.chunks.iter().map(Chunk::len).sum(),
            chunks: outcomes,
        };
        info!(parent: &self.span, bytes = summary.bytes_written, "download completed");
        Ok(summary)
    }
}

struct ChunkTask {
    index: usize,
    chunk: Chunk,
    content_length: u64,
    client: Arc<Client>,
    urls: Arc<Vec<String>>,
    writer: Arc<dyn PositionalWriter>,
    session: Arc<HttpDownloadSession>,
    timeout: Option<Duration>,
    max_retries: u32,
    buffer_size: usize,
}

impl ChunkTask {
    fn outcome(&self, source: Option<String>, attempts: usize) -> ChunkOutcome {
        ChunkOutcome {
            index: self.index,
            begin: self.chunk.begin,
            end: self.chunk.end,
            source,
            attempts,
        }
    }

    async fn run(self) -> Result<ChunkOutcome, Error> {
        if self.chunk.is_empty() {
            return Ok(self.outcome(None, 0));
        }

        let mut sources = SourceSelector::new(self.index, self.urls.len(), self.max_retries);
        let Some(mut source) = sources.next() else {
            return Err(Error::NoSources);
        };
        let mut attempts = 0;
        loop {
            attempts += 1;
            let url = &self.urls[source];
            match self.attempt(url).await {
                Ok(()) => {
                    debug!(chunk = self.index, url = %url, attempts, "chunk completed");
                    return Ok(self.outcome(Some(url.clone()), attempts));
                }
                Err(ChunkError::Canceled) => return Err(Error::Canceled),
                Err(ChunkError::Io(e)) => return Err(Error::Io(e)),
                Err(err) => match sources.next() {
                    Some(next) => {
                        warn!(
                            chunk = self.index,
                            url = %url,
                            retry_url = %self.urls[next],
                            "chunk failed, retrying: {err}"
                        );
                        self.session.reset(self.index);
                        source = next;
                    }
                    None => {
                        return Err(Error::ChunkTransfer {
                            index: self.index,
                            attempts,
                            source: err,
                        });
                    }
                },
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<(), ChunkError> {
        let token = &self.session.token;
        let request = self
            .client
            .get(url)
            .with_range(&self.chunk)
            .with_timeout(self.timeout);

        let mut response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ChunkError::Canceled),
            response = request.send() => response?,
        };
        self.check_response(&response)?;

        let expected = self.chunk.len();
        let mut received = 0;
        let mut aggregator = BytesAggregator::new(self.chunk.begin, self.buffer_size);
        loop {
            let bytes = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ChunkError::Canceled),
                bytes = response.chunk() => bytes?,
            };
            let Some(bytes) = bytes else { break };

            received += bytes.len() as u64;
            if received > expected {
                return Err(ChunkError::Overflow { expected });
            }
            aggregator.push(&bytes);
            while let Some((offset, block)) = aggregator.next_block() {
                self.write(offset, &block)?;
            }
        }
        if let Some((offset, block)) = aggregator.finish() {
            self.write(offset, &block)?;
        }

        if received < expected {
            return Err(ChunkError::ShortRead { expected, received });
        }
        Ok(())
    }

    fn check_response(&self, response: &Response) -> Result<(), ChunkError> {
        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let range = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(request_utils::parse_content_range);
                let Some(range) = range else {
                    return Ok(());
                };
                if range.start != self.chunk.begin {
                    return Err(ChunkError::ContentRangeMismatch {
                        expected: self.chunk.begin,
                        actual: range.start,
                    });
                }
                match range.total {
                    Some(total) if total != self.content_length => {
                        Err(ChunkError::LengthChanged {
                            expected: self.content_length,
                            actual: total,
                        })
                    }
                    _ => Ok(()),
                }
            }
            // A source that ignores Range sends the whole object, which is only right
            // when the chunk is the whole object.
            StatusCode::OK if self.chunk.begin == 0 && self.chunk.end == self.content_length => {
                Ok(())
            }
            StatusCode::OK => Err(ChunkError::RangeIgnored),
            status => Err(ChunkError::UnexpectedStatus(status)),
        }
    }

    fn write(&self, offset: u64, block: &[u8]) -> Result<(), ChunkError> {
        self.writer
            .write_at(offset, block)
            .map_err(ChunkError::Io)?;
        self.session.advance(self.index, offset + block.len() as u64);
        Ok(())
    }
}
