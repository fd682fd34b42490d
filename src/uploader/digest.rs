//! Streaming digest computation (C1): whole-file and in-memory checksums
//! under a selectable algorithm.

use crate::uploader::error::{UploadError, UploadResult};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Buffer size for streaming file reads. Memory footprint stays constant
/// regardless of file size.
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumAlgorithm {
    /// Parse from the wire-level string used in configuration.
    pub fn parse(s: &str) -> UploadResult<Self> {
        match s.to_lowercase().as_str() {
            "sha-256" | "sha256" => Ok(Self::Sha256),
            "sha-384" | "sha384" => Ok(Self::Sha384),
            "sha-512" | "sha512" => Ok(Self::Sha512),
            other => Err(UploadError::ConfigError(format!(
                "unknown checksum algorithm: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }
}

/// Incremental hasher over one of the supported algorithms.
enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha384 => Hasher::Sha384(Sha384::new()),
            ChecksumAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => Digest::update(h, data),
            Hasher::Sha384(h) => Digest::update(h, data),
            Hasher::Sha512(h) => Digest::update(h, data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
            Hasher::Sha384(h) => format!("{:x}", h.finalize()),
            Hasher::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Compute the hex digest of an in-memory byte buffer.
pub fn digest_bytes(data: &[u8], algorithm: ChecksumAlgorithm) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Compute the hex digest of an entire file, streaming it through a fixed
/// buffer so memory use does not scale with file size.
pub async fn digest_file(path: &Path, algorithm: ChecksumAlgorithm) -> UploadResult<String> {
    let mut file = File::open(path)
        .await
        .map_err(|e| UploadError::IoError(e.to_string()))?;
    let mut hasher = Hasher::new(algorithm);
    let mut buf = vec![0u8; STREAM_BUFFER_SIZE];

    loop {
        let read = file
            .read(&mut buf)
            .await
            .map_err(|e| UploadError::IoError(e.to_string()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hasher.finalize_hex())
}
