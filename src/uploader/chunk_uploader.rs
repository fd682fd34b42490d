//! Single-chunk upload with retry/backoff (C6): PUT one chunk's bytes to
//! the session's endpoint, classify failures, and retry per policy.

use crate::uploader::chunk::ChunkInfo;
use crate::uploader::config::UploaderConfig;
use crate::uploader::digest::digest_bytes;
use crate::uploader::error::{RecoveryAction, UploadError, UploadResult};
use crate::uploader::http::{HttpClientAdapter, HttpRequest};
use crate::uploader::session::UploadSession;
use reqwest::Method;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Uploads individual chunks against one session, honoring the configured
/// retry budget and the error taxonomy's recovery policy.
pub struct ChunkUploader<'a> {
    http: &'a HttpClientAdapter,
    config: &'a UploaderConfig,
}

impl<'a> ChunkUploader<'a> {
    pub fn new(http: &'a HttpClientAdapter, config: &'a UploaderConfig) -> Self {
        Self { http, config }
    }

    /// Upload one chunk's bytes, retrying transient failures up to
    /// `config.max_attempts()` times. Returns the chunk's checksum and the
    /// number of attempts it took on success.
    pub async fn upload(
        &self,
        session: &UploadSession,
        info: ChunkInfo,
        data: &[u8],
    ) -> UploadResult<(String, u32)> {
        let checksum = digest_bytes(data, self.config.checksum_algorithm);
        let max_attempts = self.config.max_attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(session, info, data, &checksum).await {
                Ok(()) => return Ok((checksum, attempt)),
                Err(err) => {
                    warn!(
                        target: "uploader::chunk_uploader",
                        chunk_index = info.index,
                        attempt,
                        error = %err,
                        "chunk upload attempt failed"
                    );

                    if attempt >= max_attempts {
                        return Err(UploadError::MaxRetriesExceeded {
                            chunk_index: info.index,
                            max_retries: self.config.max_retries,
                        });
                    }

                    match err.recovery_action() {
                        RecoveryAction::Retry(delay) => sleep(delay).await,
                        RecoveryAction::Resume | RecoveryAction::Abort => return Err(err),
                    }
                }
            }
        }
    }

    async fn send_once(
        &self,
        session: &UploadSession,
        info: ChunkInfo,
        data: &[u8],
        checksum: &str,
    ) -> UploadResult<()> {
        let url = format!("{}/{}/chunks/{}", session.endpoint, session.session_id, info.index);
        let content_range = format!("bytes {}-{}/{}", info.start, info.end, session.total_size);

        let mut request = HttpRequest::new(Method::PUT, url, self.config.timeout)
            .with_header("Content-Type", "application/octet-stream")
            .with_header("Content-Length", data.len().to_string())
            .with_header("Content-Range", content_range)
            .with_header("X-Chunk-Checksum", checksum.to_string())
            .with_body(data.to_vec());
        request = request.with_headers(session.auth_headers(self.config.auth.as_ref()));
        request = request.with_headers(self.config.headers.clone());

        let response = self.http.send(request).await.map_err(|e| match e {
            UploadError::Timeout(_) => UploadError::ChunkTimeout {
                chunk_index: info.index,
            },
            UploadError::NetworkError(m) => UploadError::ChunkNetworkError {
                chunk_index: info.index,
                message: m,
            },
            other => other,
        })?;

        if response.status == 404 {
            return Err(UploadError::SessionNotFound);
        }

        if !response.is_success() {
            return Err(UploadError::ChunkUploadFailed {
                chunk_index: info.index,
                status_code: response.status,
                body: response.body_str(),
            });
        }

        debug!(
            target: "uploader::chunk_uploader",
            chunk_index = info.index,
            bytes = data.len(),
            "chunk uploaded"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploader::config::UploaderConfig;
    use chrono::Utc;
    use std::collections::HashMap;

    fn sample_session() -> UploadSession {
        UploadSession {
            session_id: "sess-1".into(),
            endpoint: "https://example.test/upload".into(),
            total_size: 100,
            chunk_size: 50,
            total_chunks: 2,
            uploaded_bytes: 0,
            created_at: Utc::now(),
            expires_at: None,
            file_checksum: "deadbeef".into(),
            metadata: HashMap::new(),
            auth_token: None,
            resume_url: None,
        }
    }

    #[test]
    fn content_range_matches_chunk_bounds() {
        let session = sample_session();
        let info = ChunkInfo {
            index: 0,
            start: 0,
            end: 49,
        };
        let content_range = format!("bytes {}-{}/{}", info.start, info.end, session.total_size);
        assert_eq!(content_range, "bytes 0-49/100");
    }

    #[test]
    fn exhausting_retries_reports_configured_max() {
        let config = UploaderConfig::default().with_max_retries(2);
        assert_eq!(config.max_attempts(), 3);
    }
}
