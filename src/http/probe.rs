use std::time::Duration;

use futures::future::join_all;
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT_RANGES, CONTENT_LENGTH, ETAG, HeaderValue},
};
use tracing::{debug, warn};

use super::{
    Error, info::DownloadInfo, request_utils::RequestBuilderExt, verify::normalize_validator,
};

/// The answer one source gave to the metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub url: String,
    pub content_length: Option<u64>,
    pub validator: Option<String>,
    pub accepts_ranges: bool,
    /// `None` when the request never got a response.
    pub status: Option<StatusCode>,
    pub failure: Option<String>,
}

impl SourceRecord {
    pub(super) fn unreachable(url: &str, reason: String) -> Self {
        Self {
            url: url.to_string(),
            content_length: None,
            validator: None,
            accepts_ranges: false,
            status: None,
            failure: Some(reason),
        }
    }

    pub(super) fn from_response(url: &str, response: &Response) -> Self {
        let headers = response.headers();
        Self {
            url: url.to_string(),
            content_length: parse_content_length(headers.get(CONTENT_LENGTH)),
            validator: headers
                .get(ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
            accepts_ranges: headers
                .get(ACCEPT_RANGES)
                .is_some_and(|value| value.to_str().is_ok_and(|s| s == "bytes")),
            status: Some(response.status()),
            failure: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.status.is_some_and(|status| status.is_success())
    }

    fn connectivity_reason(&self) -> String {
        match (&self.failure, self.status) {
            (Some(reason), _) => reason.clone(),
            (None, Some(status)) => format!("status {status}"),
            (None, None) => String::from("no response"),
        }
    }
}

// reqwest's `content_length()` reports the (empty) body of a HEAD response, so read the header.
fn parse_content_length(value: Option<&HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty_validator(record: &SourceRecord) -> Option<&str> {
    record
        .validator
        .as_deref()
        .map(normalize_validator)
        .filter(|v| !v.is_empty())
}

async fn probe_source(client: &Client, url: &str, timeout: Option<Duration>) -> SourceRecord {
    match client.head(url).with_timeout(timeout).send().await {
        Ok(response) => SourceRecord::from_response(url, &response),
        Err(e) if e.is_timeout() => SourceRecord::unreachable(url, String::from("timed out")),
        Err(e) => SourceRecord::unreachable(url, e.to_string()),
    }
}

/// Sends a HEAD request to every url concurrently and reconciles the answers.
pub async fn probe(
    client: &Client,
    urls: &[String],
    timeout: Option<Duration>,
) -> Result<DownloadInfo, Error> {
    let records = join_all(urls.iter().map(|url| probe_source(client, url, timeout))).await;
    for record in &records {
        debug!(
            url = %record.url,
            status = ?record.status,
            length = ?record.content_length,
            validator = ?record.validator,
            "probed source"
        );
    }
    reconcile(&records)
}

/// Folds the probe records into one [`DownloadInfo`].
///
/// Every source must have answered with a success status before lengths and validators
/// are compared. Lengths must match exactly; validators are compared only between sources
/// that both sent one, against the first validator seen.
pub fn reconcile(records: &[SourceRecord]) -> Result<DownloadInfo, Error> {
    let first = records.first().ok_or(Error::NoSources)?;

    if let Some(record) = records.iter().find(|record| !record.is_reachable()) {
        return Err(Error::Connectivity {
            url: record.url.clone(),
            reason: record.connectivity_reason(),
        });
    }

    let content_length = first.content_length.ok_or_else(|| Error::MissingLength {
        url: first.url.clone(),
    })?;
    let mut canonical_validator = non_empty_validator(first).and(first.validator.as_ref());

    for record in &records[1..] {
        let length = record.content_length.ok_or_else(|| Error::MissingLength {
            url: record.url.clone(),
        })?;
        if length != content_length {
            return Err(Error::Consistency {
                url: record.url.clone(),
                field: "content length",
                expected: content_length.to_string(),
                actual: length.to_string(),
            });
        }

        let Some(validator) = non_empty_validator(record) else {
            continue;
        };
        match canonical_validator {
            Some(canonical) if normalize_validator(canonical) != validator => {
                return Err(Error::Consistency {
                    url: record.url.clone(),
                    field: "validator",
                    expected: canonical.clone(),
                    actual: record.validator.clone().unwrap_or_default(),
                });
            }
            Some(_) => {}
            None => canonical_validator = record.validator.as_ref(),
        }
    }

    if records.iter().any(|record| !record.accepts_ranges) {
        warn!("not every source advertises byte range support");
    }

    Ok(DownloadInfo::new(&first.url, content_length).set_validator(canonical_validator.cloned()))
}
