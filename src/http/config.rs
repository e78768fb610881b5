use std::{path::PathBuf, time::Duration};

use crate::http::BuilderErrors;

const DEFAULT_TASKS_COUNT: u32 = 8;
const DEFAULT_MAX_RETRIES: u32 = 2;
pub(super) const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

pub(super) struct HttpDownloadConfig {
    pub(super) tasks_count: u32,
    pub(super) max_retries: u32,
    pub(super) buffer_size: usize,
    pub(super) timeout: Option<Duration>,
    pub(super) directory: Option<PathBuf>,
}

impl HttpDownloadConfig {
    pub(super) fn default() -> Self {
        Self {
            tasks_count: DEFAULT_TASKS_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout: None,
            directory: None,
        }
    }

    pub(super) fn try_set_tasks_count(
        mut self,
        tasks_count: Option<u32>,
    ) -> Result<Self, BuilderErrors> {
        match tasks_count {
            Some(0) => return Err(BuilderErrors::InvalidTasksCount),
            Some(count) => self.tasks_count = count,
            None => {}
        }
        Ok(self)
    }

    pub(super) fn try_set_buffer_size(
        mut self,
        buffer_size: Option<usize>,
    ) -> Result<Self, BuilderErrors> {
        match buffer_size {
            Some(0) => return Err(BuilderErrors::InvalidBufferSize),
            Some(size) => self.buffer_size = size,
            None => {}
        }
        Ok(self)
    }

    pub(super) fn try_set_directory(
        mut self,
        directory: Option<PathBuf>,
    ) -> Result<Self, BuilderErrors> {
        if let Some(path) = &directory {
            if !path.is_dir() {
                return Err(BuilderErrors::InvalidDirectory(path.clone()));
            }
        }
        self.directory = directory;
        Ok(self)
    }

    pub(super) fn set_max_retries(mut self, max_retries: Option<u32>) -> Self {
        if let Some(value) = max_retries {
            self.max_retries = value;
        }
        self
    }

    pub(super) fn set_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
