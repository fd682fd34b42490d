//! Chunk geometry and random-access chunk reads (C2).

use crate::uploader::error::{UploadError, UploadResult};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Status of a single chunk within an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Verified,
}

/// Metadata about a single chunk, without the data.
#[derive(Debug, Clone, Copy)]
pub struct ChunkInfo {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkInfo {
    /// Size of this chunk in bytes (`end - start + 1`).
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Per-chunk upload result, tracked by the orchestrator across retries.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub status: ChunkStatus,
    pub digest: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
    pub error_message: Option<String>,
}

impl ChunkResult {
    pub fn pending(info: ChunkInfo) -> Self {
        Self {
            index: info.index,
            start: info.start,
            end: info.end,
            status: ChunkStatus::Pending,
            digest: None,
            uploaded_at: None,
            retry_count: 0,
            error_message: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, ChunkStatus::Completed | ChunkStatus::Verified)
    }
}

/// Compute the total number of chunks for a file of `total_size` bytes
/// split into `chunk_size`-byte pieces: `ceil(total_size / chunk_size)`.
pub fn total_chunks(total_size: u64, chunk_size: u64) -> usize {
    if total_size == 0 {
        return 1;
    }
    (total_size.div_ceil(chunk_size)) as usize
}

/// Compute the byte range `[start, end]` (inclusive) for chunk `index`
/// given the overall file size and configured chunk size.
pub fn chunk_range(index: usize, chunk_size: u64, total_size: u64) -> ChunkInfo {
    let start = index as u64 * chunk_size;
    let end = (start + chunk_size).min(total_size).saturating_sub(1);
    ChunkInfo { index, start, end }
}

/// Read exactly the bytes belonging to chunk `index`. Opens the file, seeks
/// to `index * chunk_size`, reads `min(chunk_size, total_size - start)`
/// bytes, and releases the handle on every exit path via scoped ownership.
pub async fn read_chunk(
    path: &Path,
    index: usize,
    chunk_size: u64,
    total_size: u64,
) -> UploadResult<Vec<u8>> {
    let chunks = total_chunks(total_size, chunk_size);
    if index >= chunks {
        return Err(UploadError::OutOfRange {
            index,
            total_chunks: chunks,
        });
    }

    let info = chunk_range(index, chunk_size, total_size);
    let size = info.size() as usize;

    let mut file = File::open(path)
        .await
        .map_err(|e| UploadError::IoError(e.to_string()))?;
    file.seek(SeekFrom::Start(info.start))
        .await
        .map_err(|e| UploadError::IoError(e.to_string()))?;

    let mut buf = vec![0u8; size];
    file.read_exact(&mut buf)
        .await
        .map_err(|e| UploadError::IoError(e.to_string()))?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn total_chunks_rounds_up() {
        assert_eq!(total_chunks(100, 5 * 1024 * 1024), 1);
        assert_eq!(total_chunks(12 * 1024 * 1024 + 7, 5 * 1024 * 1024), 3);
        assert_eq!(total_chunks(10, 5), 2);
        assert_eq!(total_chunks(11, 5), 3);
    }

    #[test]
    fn total_chunks_empty_file_is_one() {
        assert_eq!(total_chunks(0, 1024), 1);
    }

    #[test]
    fn chunk_range_uneven_multi_chunk() {
        let total = 12 * 1024 * 1024 + 7;
        let size = 5 * 1024 * 1024;

        let c0 = chunk_range(0, size, total);
        assert_eq!((c0.start, c0.end), (0, 5242879));

        let c1 = chunk_range(1, size, total);
        assert_eq!((c1.start, c1.end), (5242880, 10485759));

        let c2 = chunk_range(2, size, total);
        assert_eq!((c2.start, c2.end), (10485760, 10485760 + 2097158));
        assert_eq!(c2.size(), 2097159);

        assert_eq!(c0.size() + c1.size() + c2.size(), total);
    }

    #[test]
    fn chunk_range_single_chunk_small_file() {
        let c = chunk_range(0, 5 * 1024 * 1024, 100);
        assert_eq!((c.start, c.end), (0, 99));
        assert_eq!(c.size(), 100);
    }

    #[tokio::test]
    async fn read_chunk_reads_exact_range() {
        let mut tmp = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..250u32).map(|b| (b % 256) as u8).collect();
        tokio::fs::File::from_std(tmp.reopen().unwrap())
            .write_all(&data)
            .await
            .unwrap();
        tmp.flush().unwrap();

        let chunk = read_chunk(tmp.path(), 1, 100, 250).await.unwrap();
        assert_eq!(chunk.len(), 100);
        assert_eq!(chunk, data[100..200]);

        let last = read_chunk(tmp.path(), 2, 100, 250).await.unwrap();
        assert_eq!(last.len(), 50);
        assert_eq!(last, data[200..250]);
    }

    #[tokio::test]
    async fn read_chunk_out_of_range_errors() {
        let tmp = NamedTempFile::new().unwrap();
        let err = read_chunk(tmp.path(), 5, 100, 250).await.unwrap_err();
        assert_eq!(err.code(), "OutOfRange");
    }
}
