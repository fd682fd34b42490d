//! Upload orchestrator (C9): drives one file through session creation,
//! chunked upload, optional resume, and completion verification.

pub mod auth;
pub mod chunk;
pub mod chunk_uploader;
pub mod config;
pub mod digest;
pub mod error;
pub mod http;
pub mod progress;
pub mod session;
pub mod verify;

use crate::uploader::chunk::{chunk_range, read_chunk, total_chunks, ChunkResult, ChunkStatus};
use crate::uploader::config::UploaderConfig;
use crate::uploader::digest::digest_file;
use crate::uploader::error::{RecoveryAction, UploadError, UploadResult};
use crate::uploader::http::HttpClientAdapter;
use crate::uploader::progress::{NoOpSink, ProgressAccountant, ProgressInfo};
use crate::uploader::session::{FileInfo, SessionManager, UploadSession};
use crate::uploader::verify::{VerificationRecord, Verifier};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lifecycle state of one upload. Mirrors the state machine: INIT ->
/// SCANNING -> SESSION_CREATING -> UPLOADING -> (RESUMING) -> VERIFYING ->
/// COMPLETED | FAILED | CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Init,
    Scanning,
    SessionCreating,
    Uploading,
    Resuming,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

/// Parameters describing the local file to upload and where to send it.
pub struct UploadParams {
    pub local_path: PathBuf,
    pub endpoint: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Terminal outcome of an upload attempt (the §3 "Upload result" record).
#[derive(Debug)]
pub struct UploadOutcome {
    pub state: UploadState,
    pub session_id: String,
    pub bytes_uploaded: u64,
    pub chunk_results: Vec<ChunkResult>,
    pub errors: Vec<String>,
    pub progress: Option<ProgressInfo>,
    pub verification: Option<VerificationRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
    pub final_url: Option<String>,
    pub error: Option<String>,
}

/// Drives a single file through the full upload lifecycle against one
/// `UploaderConfig`.
pub struct Uploader {
    http: HttpClientAdapter,
    config: UploaderConfig,
}

impl Uploader {
    pub fn new(config: UploaderConfig) -> Self {
        Self {
            http: HttpClientAdapter::new(),
            config,
        }
    }

    /// Run the full upload lifecycle for `params`, reporting progress to
    /// the configured sink and honoring `cancel`. Always returns a terminal
    /// `UploadOutcome`; failures are reported through `outcome.state` and
    /// `outcome.error`/`outcome.errors`, not as an `Err`.
    pub async fn upload(&self, params: UploadParams, cancel: CancellationToken) -> UploadOutcome {
        let started_at = Utc::now();

        info!(target: "uploader", state = ?UploadState::Scanning, file = %params.local_path.display());
        let file_size = match tokio::fs::metadata(&params.local_path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                return self.failed_outcome(
                    String::new(),
                    started_at,
                    UploadError::IoError(e.to_string()),
                    Vec::new(),
                    Vec::new(),
                );
            }
        };
        let file_checksum =
            match digest_file(&params.local_path, self.config.checksum_algorithm).await {
                Ok(c) => c,
                Err(err) => {
                    return self.failed_outcome(String::new(), started_at, err, Vec::new(), Vec::new());
                }
            };

        info!(target: "uploader", state = ?UploadState::SessionCreating);
        let session_manager = SessionManager::new(&self.http, &self.config);
        let file_info = FileInfo {
            file_name: &params.file_name,
            file_size,
            mime_type: &params.mime_type,
        };
        let mut session = match session_manager
            .create_session(&params.endpoint, &file_info, &file_checksum)
            .await
        {
            Ok(s) => s,
            Err(err) => {
                return self.failed_outcome(String::new(), started_at, err, Vec::new(), Vec::new());
            }
        };

        info!(target: "uploader", state = ?UploadState::Uploading, session_id = %session.session_id);
        let sink = self
            .config
            .progress_sink
            .clone()
            .unwrap_or_else(|| Arc::new(NoOpSink));
        let mut accountant = ProgressAccountant::new(
            session.session_id.clone(),
            file_size,
            session.total_chunks,
            sink,
        );

        let mut chunk_results = Vec::new();
        let mut errors = Vec::new();

        let result = self
            .upload_chunks(&session, &params, &mut accountant, &cancel, &mut chunk_results)
            .await;

        match result {
            Ok(()) => {}
            Err(UploadError::Cancelled) => {
                return self.cancelled_outcome(
                    session.session_id.clone(),
                    started_at,
                    chunk_results,
                    errors,
                    accountant.snapshot(None),
                );
            }
            Err(err) if err.recovery_action() == RecoveryAction::Resume => {
                warn!(target: "uploader", state = ?UploadState::Resuming, session_id = %session.session_id, "resuming after {err}");
                errors.push(err.to_string());

                session = match session_manager
                    .resume_session(&session.session_id, &params.endpoint)
                    .await
                {
                    Ok(s) => s,
                    Err(err2) => {
                        return self.failed_outcome(
                            session.session_id.clone(),
                            started_at,
                            err2,
                            chunk_results,
                            errors,
                        );
                    }
                };

                if let Err(err2) = self
                    .upload_chunks(&session, &params, &mut accountant, &cancel, &mut chunk_results)
                    .await
                {
                    if matches!(err2, UploadError::Cancelled) {
                        return self.cancelled_outcome(
                            session.session_id.clone(),
                            started_at,
                            chunk_results,
                            errors,
                            accountant.snapshot(None),
                        );
                    }
                    return self.failed_outcome(
                        session.session_id.clone(),
                        started_at,
                        err2,
                        chunk_results,
                        errors,
                    );
                }
            }
            Err(err) => {
                error!(target: "uploader", error = %err, "upload failed");
                return self.failed_outcome(
                    session.session_id.clone(),
                    started_at,
                    err,
                    chunk_results,
                    errors,
                );
            }
        }

        session.uploaded_bytes = file_size;

        info!(target: "uploader", state = ?UploadState::Verifying, session_id = %session.session_id);
        let verifier = Verifier::new(&self.http, &self.config);
        let verification = match verifier.verify(&session, &params.local_path).await {
            Ok(v) => v,
            Err(err) => {
                return self.failed_outcome(
                    session.session_id.clone(),
                    started_at,
                    err,
                    chunk_results,
                    errors,
                );
            }
        };

        let completed_at = Utc::now();

        // Regardless of verification outcome, the upload itself ran to
        // completion: verification result is attached, not treated as a
        // terminal failure.
        UploadOutcome {
            state: UploadState::Completed,
            session_id: session.session_id.clone(),
            bytes_uploaded: session.uploaded_bytes,
            chunk_results,
            errors,
            progress: Some(accountant.snapshot(None)),
            verification: Some(verification),
            started_at,
            completed_at,
            duration: duration_between(started_at, completed_at),
            final_url: Some(session.endpoint.clone()),
            error: None,
        }
    }

    fn failed_outcome(
        &self,
        session_id: String,
        started_at: DateTime<Utc>,
        err: UploadError,
        chunk_results: Vec<ChunkResult>,
        mut errors: Vec<String>,
    ) -> UploadOutcome {
        errors.push(err.to_string());
        let completed_at = Utc::now();
        let bytes_uploaded = chunk_results
            .iter()
            .filter(|c| c.is_completed())
            .map(|c| c.size())
            .sum();

        UploadOutcome {
            state: UploadState::Failed,
            session_id,
            bytes_uploaded,
            chunk_results,
            errors,
            progress: None,
            verification: None,
            started_at,
            completed_at,
            duration: duration_between(started_at, completed_at),
            final_url: None,
            error: Some(err.to_string()),
        }
    }

    fn cancelled_outcome(
        &self,
        session_id: String,
        started_at: DateTime<Utc>,
        chunk_results: Vec<ChunkResult>,
        mut errors: Vec<String>,
        progress: ProgressInfo,
    ) -> UploadOutcome {
        errors.push(UploadError::Cancelled.to_string());
        let completed_at = Utc::now();
        let bytes_uploaded = chunk_results
            .iter()
            .filter(|c| c.is_completed())
            .map(|c| c.size())
            .sum();

        UploadOutcome {
            state: UploadState::Cancelled,
            session_id,
            bytes_uploaded,
            chunk_results,
            errors,
            progress: Some(progress),
            verification: None,
            started_at,
            completed_at,
            duration: duration_between(started_at, completed_at),
            final_url: None,
            error: Some(UploadError::Cancelled.to_string()),
        }
    }

    /// Upload every chunk not yet completed, per `session.uploaded_bytes`.
    /// Appends a `ChunkResult` to `chunk_results` for every chunk attempted
    /// (completed or failed); already-completed chunks are skipped and
    /// never re-sent.
    async fn upload_chunks(
        &self,
        session: &UploadSession,
        params: &UploadParams,
        accountant: &mut ProgressAccountant,
        cancel: &CancellationToken,
        chunk_results: &mut Vec<ChunkResult>,
    ) -> UploadResult<()> {
        let chunk_uploader =
            crate::uploader::chunk_uploader::ChunkUploader::new(&self.http, &self.config);
        let chunks = total_chunks(session.total_size, session.chunk_size);
        let already_completed = if session.chunk_size == 0 {
            0
        } else {
            (session.uploaded_bytes / session.chunk_size) as usize
        };

        for index in already_completed..chunks {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let info = chunk_range(index, session.chunk_size, session.total_size);
            let data =
                read_chunk(&params.local_path, index, session.chunk_size, session.total_size)
                    .await?;

            let mut result = ChunkResult::pending(info);
            match chunk_uploader.upload(session, info, &data).await {
                Ok((digest, attempts)) => {
                    result.status = ChunkStatus::Completed;
                    result.digest = Some(digest);
                    result.uploaded_at = Some(Utc::now());
                    result.retry_count = attempts.saturating_sub(1);
                    chunk_results.push(result);
                    accountant.record_chunk(info.size(), Some(index));
                }
                Err(err) => {
                    result.status = ChunkStatus::Failed;
                    result.error_message = Some(err.to_string());
                    chunk_results.push(result);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

fn duration_between(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Duration {
    (completed_at - started_at).to_std().unwrap_or_default()
}

/// Recompute the local file's digest, e.g. for a caller double-checking
/// before retrying a failed upload.
pub async fn local_checksum(path: &Path, config: &UploaderConfig) -> UploadResult<String> {
    digest_file(path, config.checksum_algorithm).await
}
