use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::{
    RequestBuilder,
    header::{HeaderValue, RANGE},
};

use super::chunk_plan::Chunk;

static CONTENT_RANGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^bytes\s+(\d+)-(\d+)/(\d+|\*)$").expect("content range pattern is valid")
});

pub(super) trait RequestBuilderExt {
    fn with_range(self, chunk: &Chunk) -> Self;
    fn with_timeout(self, timeout: Option<Duration>) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn with_range(self, chunk: &Chunk) -> Self {
        match chunk.http_range() {
            Some(range) => self.header(RANGE, range),
            None => self,
        }
    }

    fn with_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => self.timeout(timeout),
            None => self,
        }
    }
}

/// Parsed `Content-Range: bytes <first>-<last>/<total>` header. `total` is `None` for `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ContentRange {
    pub start: u64,
    pub total: Option<u64>,
}

pub(super) fn parse_content_range(value: &HeaderValue) -> Option<ContentRange> {
    let captures = CONTENT_RANGE_REGEX.captures(value.to_str().ok()?.trim())?;
    let start = captures[1].parse().ok()?;
    let total = match &captures[3] {
        "*" => None,
        total => Some(total.parse().ok()?),
    };
    Some(ContentRange { start, total })
}
