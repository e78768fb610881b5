use std::{path::PathBuf, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::http::setup::MultiDownloaderSetupBuilder;

pub(super) struct DownloadOptions {
    pub(super) timeout: Option<Duration>,
    pub(super) directory: Option<PathBuf>,
    pub(super) token: CancellationToken,
    pub(super) span: Option<Span>,
}

impl DownloadOptions {
    pub(super) fn default() -> Self {
        Self {
            timeout: None,
            token: CancellationToken::new(),
            directory: None,
            span: None,
        }
    }
}

impl MultiDownloaderSetupBuilder {
    /// Per-request timeout, applied to every probe and every range request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Cancelling this token aborts an in-flight download with [`Error::Canceled`](crate::Error::Canceled).
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.options.token = token;
        self
    }

    pub fn directory(mut self, path: PathBuf) -> Self {
        self.options.directory = Some(path);
        self
    }

    /// Span that log events of this download are recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.options.span = Some(span);
        self
    }
}
