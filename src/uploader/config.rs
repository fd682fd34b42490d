//! Uploader configuration (§6 Configuration options table).

use crate::uploader::auth::Credential;
use crate::uploader::digest::ChecksumAlgorithm;
use crate::uploader::progress::ProgressSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Configuration for the uploader. Construct with `Default::default()` and
/// override fields, or use the `with_*` builder methods.
#[derive(Clone)]
pub struct UploaderConfig {
    pub chunk_size: u64,
    pub max_retries: u32,
    pub timeout: Duration,
    pub headers: HashMap<String, String>,
    pub auth: Option<Credential>,
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: 3,
            timeout: Duration::from_millis(30_000),
            headers: HashMap::new(),
            auth: None,
            progress_sink: None,
            checksum_algorithm: ChecksumAlgorithm::Sha256,
        }
    }
}

impl UploaderConfig {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_auth(mut self, credential: Credential) -> Self {
        self.auth = Some(credential);
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = Some(sink);
        self
    }

    pub fn with_checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = algorithm;
        self
    }

    /// Total attempts per chunk: the first try plus `max_retries` retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
