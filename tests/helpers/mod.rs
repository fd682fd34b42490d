//! A tiny in-process HTTP server for exercising the uploader end-to-end
//! without reaching out to a real upload endpoint.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Controls how the stub server responds to chunk PUTs, letting tests
/// exercise retry and failure paths deterministically.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ChunkBehavior {
    AlwaysSucceed,
    FailFirstAttempt,
    AlwaysFail,
    /// Return 404 the first time chunk `index` is PUT, then succeed on
    /// every later attempt (including a post-resume retry of that index).
    SessionNotFoundAt(usize),
}

struct StubState {
    session_id: String,
    expected_chunks: usize,
    received_chunks: HashMap<usize, usize>,
    succeeded_chunks: HashSet<usize>,
    chunk_behavior: ChunkBehavior,
    file_checksum: String,
    require_bearer: Option<String>,
    total_size: u64,
    chunk_size: u64,
    not_found_triggered: bool,
}

pub struct StubServer {
    state: Arc<Mutex<StubState>>,
    local_addr: SocketAddr,
}

impl StubServer {
    pub async fn start(
        session_id: &str,
        file_checksum: &str,
        chunk_behavior: ChunkBehavior,
        require_bearer: Option<&str>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let state = Arc::new(Mutex::new(StubState {
            session_id: session_id.to_string(),
            expected_chunks: 0,
            received_chunks: HashMap::new(),
            succeeded_chunks: HashSet::new(),
            chunk_behavior,
            file_checksum: file_checksum.to_string(),
            require_bearer: require_bearer.map(str::to_string),
            total_size: 0,
            chunk_size: 1,
            not_found_triggered: false,
        }));

        let state_clone = state.clone();
        tokio::spawn(async move {
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    let io = TokioIo::new(stream);
                    let state = state_clone.clone();
                    tokio::spawn(async move {
                        let service = hyper::service::service_fn(move |req| {
                            let state = state.clone();
                            async move { handle(req, state).await }
                        });
                        let _ = hyper::server::conn::http1::Builder::new()
                            .serve_connection(io, service)
                            .await;
                    });
                }
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        Self { state, local_addr }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/upload", self.local_addr)
    }

    pub fn received_chunk_count(&self) -> usize {
        self.state.lock().unwrap().received_chunks.len()
    }

    /// Number of PUT attempts the server has seen for chunk `index`.
    pub fn put_attempts(&self, index: usize) -> usize {
        self.state
            .lock()
            .unwrap()
            .received_chunks
            .get(&index)
            .copied()
            .unwrap_or(0)
    }
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<Mutex<StubState>>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    {
        let guard = state.lock().unwrap();
        if let Some(expected) = &guard.require_bearer {
            let ok = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(|v| v == format!("Bearer {expected}"))
                .unwrap_or(false);
            if !ok {
                return Ok(Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(Full::from(Bytes::from_static(b"unauthorized")))
                    .unwrap());
            }
        }
    }

    if method == Method::POST && path == "/upload" {
        let body = req.into_body().collect().await?.to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
        let chunk_size = parsed["chunkSize"].as_u64().unwrap_or(1);
        let file_size = parsed["fileSize"].as_u64().unwrap_or(0);
        let total_chunks = file_size.div_ceil(chunk_size.max(1)).max(1) as usize;

        let session_id = {
            let mut guard = state.lock().unwrap();
            guard.expected_chunks = total_chunks;
            guard.total_size = file_size;
            guard.chunk_size = chunk_size;
            guard.session_id.clone()
        };

        let json = serde_json::json!({ "sessionId": session_id });
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(Full::from(Bytes::from(json.to_string())))
            .unwrap());
    }

    if method == Method::PUT && path.contains("/chunks/") {
        let index: usize = path
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let behavior = state.lock().unwrap().chunk_behavior;
        let already_seen = state.lock().unwrap().received_chunks.get(&index).copied();

        #[derive(Clone, Copy)]
        enum Outcome {
            Success,
            Retry,
            NotFound,
        }

        let outcome = match behavior {
            ChunkBehavior::AlwaysSucceed => Outcome::Success,
            ChunkBehavior::AlwaysFail => Outcome::Retry,
            ChunkBehavior::FailFirstAttempt => {
                if already_seen.is_none() {
                    Outcome::Retry
                } else {
                    Outcome::Success
                }
            }
            ChunkBehavior::SessionNotFoundAt(not_found_index) => {
                let mut guard = state.lock().unwrap();
                if index == not_found_index && !guard.not_found_triggered {
                    guard.not_found_triggered = true;
                    Outcome::NotFound
                } else {
                    Outcome::Success
                }
            }
        };

        {
            let mut guard = state.lock().unwrap();
            let count = guard.received_chunks.entry(index).or_insert(0);
            *count += 1;
            if matches!(outcome, Outcome::Success) {
                guard.succeeded_chunks.insert(index);
            }
        }

        return match outcome {
            Outcome::Success => Ok(Response::builder()
                .status(StatusCode::OK)
                .body(Full::default())
                .unwrap()),
            Outcome::Retry => Ok(Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(Full::from(Bytes::from_static(b"try again")))
                .unwrap()),
            Outcome::NotFound => Ok(Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::from(Bytes::from_static(b"session not found")))
                .unwrap()),
        };
    }

    if method == Method::GET && path != "/upload" {
        let guard = state.lock().unwrap();
        if path == format!("/upload/{}", guard.session_id) {
            let completed = guard.succeeded_chunks.len() as u64;
            let uploaded_size = completed * guard.chunk_size;
            let json = serde_json::json!({
                "sessionId": guard.session_id,
                "totalSize": guard.total_size,
                "chunkSize": guard.chunk_size,
                "uploadedSize": uploaded_size,
            });
            drop(guard);
            return Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::from(Bytes::from(json.to_string())))
                .unwrap());
        }
    }

    if method == Method::HEAD {
        let checksum = state.lock().unwrap().file_checksum.clone();
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("X-File-Checksum", checksum)
            .body(Full::default())
            .unwrap());
    }

    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::default())
        .unwrap())
}
