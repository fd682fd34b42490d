//! Chunked, resumable, checksum-verified file upload engine.

pub mod logging;
pub mod uploader;

pub use uploader::auth::Credential;
pub use uploader::chunk::{ChunkInfo, ChunkResult, ChunkStatus};
pub use uploader::config::UploaderConfig;
pub use uploader::digest::ChecksumAlgorithm;
pub use uploader::error::{RecoveryAction, UploadError, UploadResult};
pub use uploader::progress::{NoOpSink, ProgressInfo, ProgressSink};
pub use uploader::verify::VerificationRecord;
pub use uploader::{UploadOutcome, UploadParams, UploadState, Uploader};
