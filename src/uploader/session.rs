//! Upload session record and session manager (C5): create, resume, and
//! poll upload sessions.

use crate::uploader::auth::{bearer_headers, shape_headers, Credential};
use crate::uploader::chunk::total_chunks;
use crate::uploader::config::UploaderConfig;
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::http::{HttpClientAdapter, HttpRequest};
use crate::uploader::progress::ProgressInfo;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Server-issued, in-progress upload handle.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub session_id: String,
    pub endpoint: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: usize,
    pub uploaded_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub file_checksum: String,
    pub metadata: HashMap<String, Value>,
    pub auth_token: Option<String>,
    pub resume_url: Option<String>,
}

impl UploadSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }

    /// Headers carrying auth for chunk/progress/resume calls. Per the
    /// contract choice recorded in this crate's design: a session-issued
    /// token, when present, always wins over the caller-supplied
    /// credential for these calls.
    pub fn auth_headers(&self, fallback: Option<&Credential>) -> HashMap<String, String> {
        match &self.auth_token {
            Some(token) => bearer_headers(token),
            None => shape_headers(fallback),
        }
    }
}

/// Request body for session creation (§6).
#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    #[serde(rename = "fileName")]
    file_name: &'a str,
    #[serde(rename = "fileSize")]
    file_size: u64,
    #[serde(rename = "fileChecksum")]
    file_checksum: &'a str,
    #[serde(rename = "chunkSize")]
    chunk_size: u64,
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "expiresAt")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(rename = "authToken")]
    auth_token: Option<String>,
    #[serde(rename = "resumeUrl")]
    resume_url: Option<String>,
    #[serde(rename = "totalSize")]
    total_size: Option<u64>,
    #[serde(rename = "uploadedSize")]
    uploaded_size: Option<u64>,
    #[serde(rename = "chunkSize")]
    chunk_size: Option<u64>,
    checksum: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<DateTime<Utc>>,
}

/// Information about the local file needed to open a session.
pub struct FileInfo<'a> {
    pub file_name: &'a str,
    pub file_size: u64,
    pub mime_type: &'a str,
}

/// Owns session lifecycle calls against the upload endpoint.
pub struct SessionManager<'a> {
    http: &'a HttpClientAdapter,
    config: &'a UploaderConfig,
}

impl<'a> SessionManager<'a> {
    pub fn new(http: &'a HttpClientAdapter, config: &'a UploaderConfig) -> Self {
        Self { http, config }
    }

    /// POST a new session to `endpoint`.
    pub async fn create_session(
        &self,
        endpoint: &str,
        file_info: &FileInfo<'_>,
        checksum: &str,
    ) -> UploadResult<UploadSession> {
        let request_body = CreateSessionRequest {
            file_name: file_info.file_name,
            file_size: file_info.file_size,
            file_checksum: checksum,
            chunk_size: self.config.chunk_size,
            mime_type: file_info.mime_type,
        };
        let body = serde_json::to_vec(&request_body)
            .map_err(|e| UploadError::ParseError(e.to_string()))?;

        let mut request = HttpRequest::new(Method::POST, endpoint, self.config.timeout)
            .with_header("Content-Type", "application/json")
            .with_body(body);
        request = request.with_headers(shape_headers(self.config.auth.as_ref()));
        request = request.with_headers(self.config.headers.clone());

        let response = self.http.send(request).await.map_err(|e| match e {
            UploadError::Timeout(d) => UploadError::Timeout(d),
            UploadError::NetworkError(m) => UploadError::NetworkError(m),
            other => other,
        })?;

        if response.status == 401 || response.status == 403 {
            warn!(
                target: "uploader::session",
                status = response.status,
                "session creation rejected on authentication"
            );
            return Err(UploadError::AuthFailed(format!(
                "status {}: {}",
                response.status,
                response.body_str()
            )));
        }

        if !response.is_success() {
            return Err(UploadError::SessionCreationFailed(format!(
                "status {}: {}",
                response.status,
                response.body_str()
            )));
        }

        let parsed: SessionResponse = serde_json::from_slice(&response.body)
            .map_err(|e| UploadError::ParseError(e.to_string()))?;

        let total_size = file_info.file_size;
        let chunk_size = self.config.chunk_size;
        let total = total_chunks(total_size, chunk_size);

        debug!(
            target: "uploader::session",
            session_id = %parsed.session_id,
            total_chunks = total,
            "session created"
        );

        Ok(UploadSession {
            session_id: parsed.session_id,
            endpoint: endpoint.to_string(),
            total_size,
            chunk_size,
            total_chunks: total,
            uploaded_bytes: 0,
            created_at: Utc::now(),
            expires_at: parsed.expires_at,
            file_checksum: checksum.to_string(),
            metadata: parsed.metadata.map(|m| m.into_iter().collect()).unwrap_or_default(),
            auth_token: parsed.auth_token,
            resume_url: parsed.resume_url,
        })
    }

    /// GET `{endpoint}/{sessionId}` and rebuild the session record.
    pub async fn resume_session(
        &self,
        session_id: &str,
        endpoint: &str,
    ) -> UploadResult<UploadSession> {
        let url = format!("{endpoint}/{session_id}");
        let mut request = HttpRequest::new(Method::GET, url, self.config.timeout);
        request = request.with_headers(shape_headers(self.config.auth.as_ref()));

        let response = self.http.send(request).await.map_err(|e| match e {
            UploadError::Timeout(_) => UploadError::ResumeTimeout,
            UploadError::NetworkError(m) => UploadError::ResumeNetworkError(m),
            other => other,
        })?;

        if response.status == 404 {
            return Err(UploadError::SessionNotFound);
        }
        if !response.is_success() {
            return Err(UploadError::ResumeFailed(format!(
                "status {}: {}",
                response.status,
                response.body_str()
            )));
        }

        let parsed: SessionResponse = serde_json::from_slice(&response.body)
            .map_err(|e| UploadError::ResumeParseError(e.to_string()))?;

        let total_size = parsed.total_size.unwrap_or_default();
        let chunk_size = parsed.chunk_size.unwrap_or(self.config.chunk_size);
        let total = total_chunks(total_size, chunk_size);

        Ok(UploadSession {
            session_id: parsed.session_id,
            endpoint: endpoint.to_string(),
            total_size,
            chunk_size,
            total_chunks: total,
            uploaded_bytes: parsed.uploaded_size.unwrap_or_default(),
            created_at: parsed.created_at.unwrap_or_else(Utc::now),
            expires_at: parsed.expires_at,
            file_checksum: parsed.checksum.unwrap_or_default(),
            metadata: parsed.metadata.map(|m| m.into_iter().collect()).unwrap_or_default(),
            auth_token: parsed.auth_token,
            resume_url: parsed.resume_url,
        })
    }

    /// GET `{endpoint}/{sessionId}/progress` with bearer auth from the
    /// session-issued token, and parse the body into a progress record.
    pub async fn get_progress(&self, session: &UploadSession) -> UploadResult<ProgressInfo> {
        let url = format!("{}/{}/progress", session.endpoint, session.session_id);
        let mut request = HttpRequest::new(Method::GET, url, self.config.timeout);
        request = request.with_headers(session.auth_headers(self.config.auth.as_ref()));

        let response = self.http.send(request).await.map_err(|e| match e {
            UploadError::Timeout(_) | UploadError::NetworkError(_) => {
                UploadError::ProgressNetworkError(e.to_string())
            }
            other => other,
        })?;

        if !response.is_success() {
            return Err(UploadError::ProgressFetchFailed(format!(
                "status {}",
                response.status
            )));
        }

        serde_json::from_slice(&response.body).map_err(|e| UploadError::ProgressParseError(e.to_string()))
    }

    /// POST credentials to `endpoint`; returns the issued token. Auth
    /// failures are never retryable.
    pub async fn authenticate(
        &self,
        endpoint: &str,
        credential: &Credential,
    ) -> UploadResult<String> {
        let mut request = HttpRequest::new(Method::POST, endpoint, self.config.timeout);
        request = request.with_headers(credential.to_headers());

        let response = self.http.send(request).await.map_err(|e| match e {
            UploadError::Timeout(_) | UploadError::NetworkError(_) => {
                UploadError::AuthNetworkError(e.to_string())
            }
            other => other,
        })?;

        if !response.is_success() {
            warn!(target: "uploader::session", status = response.status, "authentication failed");
            return Err(UploadError::AuthFailed(format!(
                "status {}: {}",
                response.status,
                response.body_str()
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            token: Option<String>,
            #[serde(rename = "authToken")]
            auth_token: Option<String>,
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| UploadError::AuthParseError(e.to_string()))?;

        parsed
            .token
            .or(parsed.auth_token)
            .ok_or_else(|| UploadError::AuthParseError("no token in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(expires_at: Option<DateTime<Utc>>) -> UploadSession {
        UploadSession {
            session_id: "sess-1".into(),
            endpoint: "https://example.test/upload".into(),
            total_size: 100,
            chunk_size: 10,
            total_chunks: 10,
            uploaded_bytes: 0,
            created_at: Utc::now(),
            expires_at,
            file_checksum: "deadbeef".into(),
            metadata: HashMap::new(),
            auth_token: None,
            resume_url: None,
        }
    }

    #[test]
    fn session_without_expiry_never_expires() {
        assert!(!sample_session(None).is_expired());
    }

    #[test]
    fn session_past_expiry_is_expired() {
        let past = Utc::now() - chrono::Duration::seconds(10);
        assert!(sample_session(Some(past)).is_expired());
    }

    #[test]
    fn session_token_takes_precedence_over_caller_credential() {
        let mut session = sample_session(None);
        session.auth_token = Some("session-tok".into());
        let caller_cred = Credential::Bearer {
            token: "caller-tok".into(),
        };
        let headers = session.auth_headers(Some(&caller_cred));
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer session-tok");
    }

    #[test]
    fn falls_back_to_caller_credential_without_session_token() {
        let session = sample_session(None);
        let caller_cred = Credential::Bearer {
            token: "caller-tok".into(),
        };
        let headers = session.auth_headers(Some(&caller_cred));
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer caller-tok");
    }
}
