//! Error taxonomy and retry/recovery policy for the uploader.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// What the orchestrator should do after an error is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the same operation after the given delay.
    Retry(Duration),
    /// Re-hydrate the session via the session manager and restart from the
    /// first pending chunk.
    Resume,
    /// Give up; surface the error to the caller.
    Abort,
}

/// Error taxonomy. Each variant maps to one of the stable `code` strings
/// from the component design.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("unknown checksum algorithm: {0}")]
    ConfigError(String),

    #[error("chunk index {index} out of range (total chunks {total_chunks})")]
    OutOfRange { index: usize, total_chunks: usize },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("failed to parse authentication response: {0}")]
    AuthParseError(String),

    #[error("network error during authentication: {0}")]
    AuthNetworkError(String),

    #[error("failed to parse response body: {0}")]
    ParseError(String),

    #[error("failed to create upload session: {0}")]
    SessionCreationFailed(String),

    #[error("upload session not found")]
    SessionNotFound,

    #[error("failed to resume upload session: {0}")]
    ResumeFailed(String),

    #[error("network error while resuming session: {0}")]
    ResumeNetworkError(String),

    #[error("timed out while resuming session")]
    ResumeTimeout,

    #[error("failed to parse resume response: {0}")]
    ResumeParseError(String),

    #[error("chunk {chunk_index} upload failed (status {status_code}): {body}")]
    ChunkUploadFailed {
        chunk_index: usize,
        status_code: u16,
        body: String,
    },

    #[error("network error uploading chunk {chunk_index}: {message}")]
    ChunkNetworkError { chunk_index: usize, message: String },

    #[error("timed out uploading chunk {chunk_index}")]
    ChunkTimeout { chunk_index: usize },

    #[error("failed to fetch progress: {0}")]
    ProgressFetchFailed(String),

    #[error("failed to parse progress response: {0}")]
    ProgressParseError(String),

    #[error("network error fetching progress: {0}")]
    ProgressNetworkError(String),

    #[error("completion verification failed: {0}")]
    VerificationFailed(String),

    #[error("network error during verification: {0}")]
    VerificationNetworkError(String),

    #[error("maximum retries ({max_retries}) exceeded for chunk {chunk_index}")]
    MaxRetriesExceeded { chunk_index: usize, max_retries: u32 },
}

impl UploadError {
    /// Stable error code string, per the component design's taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Cancelled => "Cancelled",
            UploadError::IoError(_) => "IoError",
            UploadError::ConfigError(_) => "ConfigError",
            UploadError::OutOfRange { .. } => "OutOfRange",
            UploadError::NetworkError(_) => "NetworkError",
            UploadError::Timeout(_) => "Timeout",
            UploadError::AuthFailed(_) => "AuthFailed",
            UploadError::AuthParseError(_) => "AuthParseError",
            UploadError::AuthNetworkError(_) => "AuthNetworkError",
            UploadError::ParseError(_) => "ParseError",
            UploadError::SessionCreationFailed(_) => "SessionCreationFailed",
            UploadError::SessionNotFound => "SessionNotFound",
            UploadError::ResumeFailed(_) => "ResumeFailed",
            UploadError::ResumeNetworkError(_) => "ResumeNetworkError",
            UploadError::ResumeTimeout => "ResumeTimeout",
            UploadError::ResumeParseError(_) => "ResumeParseError",
            UploadError::ChunkUploadFailed { .. } => "ChunkUploadFailed",
            UploadError::ChunkNetworkError { .. } => "ChunkNetworkError",
            UploadError::ChunkTimeout { .. } => "ChunkTimeout",
            UploadError::ProgressFetchFailed(_) => "ProgressFetchFailed",
            UploadError::ProgressParseError(_) => "ProgressParseError",
            UploadError::ProgressNetworkError(_) => "ProgressNetworkError",
            UploadError::VerificationFailed(_) => "VerificationFailed",
            UploadError::VerificationNetworkError(_) => "VerificationNetworkError",
            UploadError::MaxRetriesExceeded { .. } => "MaxRetriesExceeded",
        }
    }

    /// Whether this error is, in isolation, safe to retry. The recovery
    /// policy (`recovery_action`) layers delay/resume semantics on top of
    /// this.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::NetworkError(_)
                | UploadError::Timeout(_)
                | UploadError::SessionCreationFailed(_)
                | UploadError::ResumeFailed(_)
                | UploadError::ResumeNetworkError(_)
                | UploadError::ResumeTimeout
                | UploadError::ChunkUploadFailed { .. }
                | UploadError::ChunkNetworkError { .. }
                | UploadError::ChunkTimeout { .. }
                | UploadError::ProgressFetchFailed(_)
                | UploadError::ProgressParseError(_)
                | UploadError::ProgressNetworkError(_)
        )
    }

    /// Chunk index this error concerns, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            UploadError::ChunkUploadFailed { chunk_index, .. }
            | UploadError::ChunkNetworkError { chunk_index, .. }
            | UploadError::ChunkTimeout { chunk_index }
            | UploadError::MaxRetriesExceeded { chunk_index, .. }
            | UploadError::OutOfRange {
                index: chunk_index, ..
            } => Some(*chunk_index),
            _ => None,
        }
    }

    /// Free-form details map, mirroring the distilled error record's
    /// `details` field without carrying it as stored state on every
    /// variant.
    pub fn details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();
        match self {
            UploadError::ChunkUploadFailed {
                chunk_index,
                status_code,
                body,
            } => {
                details.insert("chunkIndex".into(), chunk_index.to_string());
                details.insert("statusCode".into(), status_code.to_string());
                details.insert("body".into(), body.clone());
            }
            UploadError::MaxRetriesExceeded {
                chunk_index,
                max_retries,
            } => {
                details.insert("chunkIndex".into(), chunk_index.to_string());
                details.insert("maxRetries".into(), max_retries.to_string());
            }
            UploadError::OutOfRange { index, total_chunks } => {
                details.insert("index".into(), index.to_string());
                details.insert("totalChunks".into(), total_chunks.to_string());
            }
            _ => {}
        }
        details
    }

    /// Recovery policy: maps this error to the action the orchestrator
    /// should take (§4.8).
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            UploadError::NetworkError(_)
            | UploadError::Timeout(_)
            | UploadError::ChunkNetworkError { .. }
            | UploadError::ChunkTimeout { .. } => RecoveryAction::Retry(Duration::from_secs(1)),
            UploadError::AuthFailed(_) | UploadError::AuthParseError(_) => RecoveryAction::Abort,
            UploadError::SessionNotFound => RecoveryAction::Resume,
            other if other.is_retryable() => RecoveryAction::Retry(Duration::from_secs(2)),
            _ => RecoveryAction::Abort,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UploadError::Timeout(Duration::from_millis(0))
        } else {
            UploadError::NetworkError(err.to_string())
        }
    }
}
