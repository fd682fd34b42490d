//! Completion verification (C10): confirm the server's view of the
//! uploaded file matches the local file before declaring success.

use crate::uploader::config::UploaderConfig;
use crate::uploader::digest::digest_file;
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::http::{HttpClientAdapter, HttpRequest};
use crate::uploader::session::UploadSession;
use reqwest::Method;
use std::path::Path;
use tracing::warn;

/// Outcome of a completion check: whether the remote checksum agrees with
/// the local one, and the evidence behind that verdict.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub verified: bool,
    pub method: &'static str,
    pub local_checksum: String,
    pub remote_checksum: Option<String>,
    pub issues: Vec<String>,
}

/// HEADs the session endpoint and compares `X-File-Checksum` against a
/// freshly recomputed whole-file digest.
pub struct Verifier<'a> {
    http: &'a HttpClientAdapter,
    config: &'a UploaderConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(http: &'a HttpClientAdapter, config: &'a UploaderConfig) -> Self {
        Self { http, config }
    }

    pub async fn verify(
        &self,
        session: &UploadSession,
        local_path: &Path,
    ) -> UploadResult<VerificationRecord> {
        let local_checksum = digest_file(local_path, self.config.checksum_algorithm).await?;

        let url = session
            .resume_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", session.endpoint, session.session_id));
        let mut request = HttpRequest::new(Method::HEAD, url, self.config.timeout);
        request = request.with_headers(session.auth_headers(self.config.auth.as_ref()));

        let response = match self.http.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    target: "uploader::verify",
                    session_id = %session.session_id,
                    error = %err,
                    "verification request failed"
                );
                return Ok(VerificationRecord {
                    verified: false,
                    method: "checksum",
                    local_checksum,
                    remote_checksum: Some("unknown".into()),
                    issues: vec![format!("verification request failed: {err}")],
                });
            }
        };

        if !response.is_success() {
            warn!(
                target: "uploader::verify",
                session_id = %session.session_id,
                status = response.status,
                "verification request returned non-2xx"
            );
            return Ok(VerificationRecord {
                verified: false,
                method: "checksum",
                local_checksum,
                remote_checksum: Some("unknown".into()),
                issues: vec![format!("verification request returned status {}", response.status)],
            });
        }

        let remote_checksum = response.header("X-File-Checksum").map(str::to_string);

        let mut issues = Vec::new();
        let (verified, remote_checksum) = match &remote_checksum {
            Some(remote) if remote.eq_ignore_ascii_case(&local_checksum) => (true, remote_checksum),
            Some(remote) => {
                issues.push(format!(
                    "checksum mismatch: local {local_checksum} != remote {remote}"
                ));
                (false, remote_checksum)
            }
            None => {
                issues.push("server did not return X-File-Checksum".into());
                (false, Some("unknown".into()))
            }
        };

        if !verified {
            warn!(
                target: "uploader::verify",
                session_id = %session.session_id,
                "completion verification failed"
            );
        }

        Ok(VerificationRecord {
            verified,
            method: "checksum",
            local_checksum,
            remote_checksum,
            issues,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_checksums_produce_no_issues() {
        let record = VerificationRecord {
            verified: true,
            method: "checksum",
            local_checksum: "abc".into(),
            remote_checksum: Some("abc".into()),
            issues: vec![],
        };
        assert!(record.verified);
        assert!(record.issues.is_empty());
    }
}
