use crate::http::{
    BuilderErrors, Error, MultiDownloader, Status, chunk_plan, config::HttpDownloadConfig,
    options::DownloadOptions, probe,
};

use parking_lot::Mutex;
use reqwest::{Client, Url};
use std::sync::Arc;
use tracing::{Instrument, debug, field, info_span};

pub struct ClientRequired;
pub struct UrlsRequired {
    client: Client,
}
pub struct SetupBuilder {
    client: Client,
    urls: Vec<String>,
}

pub struct MultiDownloaderSetupBuilder<State = SetupBuilder> {
    state: State,
    tasks_count: Option<u32>,
    max_retries: Option<u32>,
    buffer_size: Option<usize>,
    pub(super) options: DownloadOptions,
}

impl MultiDownloaderSetupBuilder<ClientRequired> {
    pub(super) fn default() -> Self {
        MultiDownloaderSetupBuilder {
            state: ClientRequired,
            tasks_count: None,
            max_retries: None,
            buffer_size: None,
            options: DownloadOptions::default(),
        }
    }

    pub fn client(self, client: Client) -> MultiDownloaderSetupBuilder<UrlsRequired> {
        MultiDownloaderSetupBuilder {
            state: UrlsRequired { client },
            tasks_count: self.tasks_count,
            max_retries: self.max_retries,
            buffer_size: self.buffer_size,
            options: self.options,
        }
    }
}

impl MultiDownloaderSetupBuilder<UrlsRequired> {
    /// Sources that all serve the same file. The first one names the output file.
    pub fn urls<I, S>(self, urls: I) -> MultiDownloaderSetupBuilder<SetupBuilder>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MultiDownloaderSetupBuilder {
            state: SetupBuilder {
                client: self.state.client,
                urls: urls.into_iter().map(|url| url.as_ref().to_string()).collect(),
            },
            tasks_count: self.tasks_count,
            max_retries: self.max_retries,
            buffer_size: self.buffer_size,
            options: self.options,
        }
    }
}

impl MultiDownloaderSetupBuilder {
    /// Number of chunks the file is split into, one concurrent task each.
    pub fn tasks_count(mut self, count: u32) -> Self {
        self.tasks_count = Some(count);
        self
    }

    /// How many other sources a failed chunk may be retried against.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Size of the blocks written to the output and read while hashing.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    fn validate_urls(urls: &[String]) -> Result<(), BuilderErrors> {
        if urls.is_empty() {
            return Err(BuilderErrors::NoUrls);
        }
        for raw_url in urls {
            match Url::parse(raw_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => return Err(BuilderErrors::InvalidUrl(raw_url.clone())),
            }
        }
        Ok(())
    }

    fn generate_config(&self) -> Result<HttpDownloadConfig, BuilderErrors> {
        Ok(HttpDownloadConfig::default()
            .try_set_tasks_count(self.tasks_count)?
            .try_set_buffer_size(self.buffer_size)?
            .try_set_directory(self.options.directory.clone())?
            .set_max_retries(self.max_retries)
            .set_timeout(self.options.timeout))
    }

    pub fn build(self) -> Result<MultiDownloaderSetup, BuilderErrors> {
        Self::validate_urls(&self.state.urls)?;
        let config = self.generate_config()?;
        Ok(MultiDownloaderSetup {
            client: self.state.client,
            urls: self.state.urls,
            config,
            options: self.options,
        })
    }
}

pub struct MultiDownloaderSetup {
    client: Client,
    urls: Vec<String>,
    config: HttpDownloadConfig,
    options: DownloadOptions,
}

impl MultiDownloaderSetup {
    /// Probes every source, reconciles them into one [`DownloadInfo`](crate::DownloadInfo)
    /// and plans the chunks. No file is created here.
    pub async fn init(mut self) -> Result<MultiDownloader, Error> {
        let sources = self.urls.len();
        let span = self
            .options
            .span
            .take()
            .unwrap_or_else(|| info_span!("download", sources, file = field::Empty));

        let info = probe::probe(&self.client, &self.urls, self.config.timeout)
            .instrument(span.clone())
            .await?;
        span.record("file", info.filename());

        let chunks = chunk_plan::plan_chunks(info.content_length(), self.config.tasks_count);
        debug!(
            parent: &span,
            length = info.content_length(),
            chunks = chunks.len(),
            "planned download"
        );

        Ok(MultiDownloader {
            client: Arc::new(self.client),
            urls: Arc::new(self.urls),
            info,
            config: self.config,
            options: self.options,
            chunks,
            output: None,
            destination: None,
            status: Arc::new(Mutex::new(Status::Pending)),
            span,
        })
    }
}
