use super::filename_utils;

/// What every source agreed on: the object's length, its validator (if any source sent one)
/// and the filename derived from the first source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    filename: String,
    content_length: u64,
    validator: Option<String>,
}

impl DownloadInfo {
    pub(super) fn new(raw_url: &str, content_length: u64) -> Self {
        Self {
            filename: filename_utils::extract_filename(raw_url),
            content_length,
            validator: None,
        }
    }

    pub(super) fn set_validator(mut self, validator: Option<String>) -> Self {
        self.validator = validator;
        self
    }
}

impl DownloadInfo {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn validator(&self) -> Option<&str> {
        self.validator.as_deref()
    }
}
