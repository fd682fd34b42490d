//! Progress accounting (C7): bytes uploaded, smoothed speed, ETA,
//! percentage, emitted to a caller-supplied sink.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Size of the speed-smoothing ring buffer (§4.7: up to 10 recent samples).
const SPEED_WINDOW: usize = 10;

/// A progress snapshot, emitted after every chunk completion and on any
/// polled update. Also the shape of the `get_progress` wire response, so it
/// derives `Deserialize` with the protocol's camelCase field names.
#[derive(Clone, Deserialize)]
pub struct ProgressInfo {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "bytesUploaded")]
    pub bytes_uploaded: u64,
    #[serde(rename = "bytesTotal")]
    pub bytes_total: u64,
    pub percentage: f64,
    #[serde(rename = "chunksCompleted")]
    pub chunks_completed: usize,
    #[serde(rename = "chunksTotal")]
    pub chunks_total: usize,
    #[serde(rename = "currentChunk", default)]
    pub current_chunk: Option<usize>,
    #[serde(rename = "speedBytesPerSec")]
    pub speed_bytes_per_sec: f64,
    #[serde(rename = "etaSeconds")]
    pub eta_seconds: u64,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "lastUpdate")]
    pub last_update: DateTime<Utc>,
}

impl Debug for ProgressInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}% ({}/{} bytes, {}/{} chunks) @ {:.0} B/s, ETA {}s",
            self.percentage,
            self.bytes_uploaded,
            self.bytes_total,
            self.chunks_completed,
            self.chunks_total,
            self.speed_bytes_per_sec,
            self.eta_seconds
        )
    }
}

/// Consumer of progress events. Implementations must be safe to invoke
/// concurrently if subscribed from more than one place.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, info: ProgressInfo);
}

/// No-op sink, used when the caller does not care about progress.
pub struct NoOpSink;

impl ProgressSink for NoOpSink {
    fn on_progress(&self, _info: ProgressInfo) {}
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, info: ProgressInfo) {
        self(info)
    }
}

/// Fixed-capacity ring buffer of `(elapsed_secs, bytes)` speed samples,
/// owned exclusively by one `ProgressAccountant`.
struct SpeedRing {
    samples: Vec<f64>,
    next: usize,
    filled: usize,
}

impl SpeedRing {
    fn new() -> Self {
        Self {
            samples: vec![0.0; SPEED_WINDOW],
            next: 0,
            filled: 0,
        }
    }

    fn push(&mut self, instantaneous_bytes_per_sec: f64) {
        self.samples[self.next] = instantaneous_bytes_per_sec;
        self.next = (self.next + 1) % SPEED_WINDOW;
        self.filled = (self.filled + 1).min(SPEED_WINDOW);
    }

    fn mean(&self) -> f64 {
        if self.filled == 0 {
            return 0.0;
        }
        self.samples[..self.filled].iter().sum::<f64>() / self.filled as f64
    }
}

/// Tracks bytes uploaded, chunk counts, and smoothed speed/ETA for one
/// upload, and emits a `ProgressInfo` to the configured sink after every
/// update.
pub struct ProgressAccountant {
    session_id: String,
    bytes_total: u64,
    chunks_total: usize,
    bytes_uploaded: u64,
    chunks_completed: usize,
    speed_ring: SpeedRing,
    last_instant: Option<Instant>,
    started_at: DateTime<Utc>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressAccountant {
    pub fn new(
        session_id: impl Into<String>,
        bytes_total: u64,
        chunks_total: usize,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            bytes_total,
            chunks_total,
            bytes_uploaded: 0,
            chunks_completed: 0,
            speed_ring: SpeedRing::new(),
            last_instant: None,
            started_at: Utc::now(),
            sink,
        }
    }

    /// Record a completed chunk and emit an updated `ProgressInfo`.
    pub fn record_chunk(&mut self, chunk_size: u64, current_chunk: Option<usize>) -> ProgressInfo {
        let now = Instant::now();
        if let Some(prev) = self.last_instant {
            let elapsed = now.duration_since(prev).as_secs_f64();
            if elapsed > 0.0 {
                self.speed_ring.push(chunk_size as f64 / elapsed);
            }
        }
        self.last_instant = Some(now);

        self.bytes_uploaded += chunk_size;
        self.chunks_completed += 1;

        self.emit(current_chunk)
    }

    /// Emit a progress snapshot without advancing any counters (used by
    /// periodic polling).
    pub fn snapshot(&self, current_chunk: Option<usize>) -> ProgressInfo {
        self.build_info(current_chunk)
    }

    fn emit(&self, current_chunk: Option<usize>) -> ProgressInfo {
        let info = self.build_info(current_chunk);
        self.sink.on_progress(info.clone());
        info
    }

    fn build_info(&self, current_chunk: Option<usize>) -> ProgressInfo {
        let percentage = if self.bytes_total == 0 {
            0.0
        } else {
            100.0 * self.bytes_uploaded as f64 / self.bytes_total as f64
        };

        let speed = self.speed_ring.mean();
        let eta_seconds = if speed > 0.0 {
            ((self.bytes_total.saturating_sub(self.bytes_uploaded)) as f64 / speed) as u64
        } else {
            0
        };

        ProgressInfo {
            session_id: self.session_id.clone(),
            bytes_uploaded: self.bytes_uploaded,
            bytes_total: self.bytes_total,
            percentage,
            chunks_completed: self.chunks_completed,
            chunks_total: self.chunks_total,
            current_chunk,
            speed_bytes_per_sec: speed,
            eta_seconds,
            started_at: self.started_at,
            last_update: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingSink(Mutex<Vec<ProgressInfo>>);

    impl ProgressSink for CapturingSink {
        fn on_progress(&self, info: ProgressInfo) {
            self.0.lock().unwrap().push(info);
        }
    }

    #[test]
    fn percentage_is_zero_when_total_is_zero() {
        let sink = Arc::new(NoOpSink);
        let mut accountant = ProgressAccountant::new("s1", 0, 1, sink);
        let info = accountant.record_chunk(0, Some(0));
        assert_eq!(info.percentage, 0.0);
    }

    #[test]
    fn bytes_uploaded_accumulates_across_chunks() {
        let sink = Arc::new(NoOpSink);
        let mut accountant = ProgressAccountant::new("s1", 300, 3, sink);
        accountant.record_chunk(100, Some(0));
        let info = accountant.record_chunk(100, Some(1));
        assert_eq!(info.bytes_uploaded, 200);
        assert_eq!(info.chunks_completed, 2);
    }

    #[test]
    fn percentage_and_bytes_are_monotonic_across_events() {
        let sink: Arc<CapturingSink> = Arc::new(CapturingSink(Mutex::new(vec![])));
        let mut accountant = ProgressAccountant::new("s1", 1000, 10, sink.clone());
        for _ in 0..10 {
            accountant.record_chunk(100, None);
        }
        let events = sink.0.lock().unwrap();
        let mut last_pct = -1.0;
        let mut last_bytes = 0u64;
        for e in events.iter() {
            assert!(e.percentage >= last_pct);
            assert!(e.bytes_uploaded >= last_bytes);
            last_pct = e.percentage;
            last_bytes = e.bytes_uploaded;
        }
        assert_eq!(events.last().unwrap().percentage, 100.0);
    }

    #[test]
    fn speed_is_zero_before_any_chunk_completes() {
        let sink = Arc::new(NoOpSink);
        let accountant = ProgressAccountant::new("s1", 1000, 10, sink);
        let info = accountant.snapshot(None);
        assert_eq!(info.speed_bytes_per_sec, 0.0);
        assert_eq!(info.eta_seconds, 0);
    }
}
