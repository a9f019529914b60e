//! # Transport Coordinator
//!
//! Decides which byte range to request next and which responses to trust.
//!
//! ## Overview
//!
//! - **Epochs**: every download session (pacing start, seek, stop) gets a new
//!   sequence number. Responses carrying any other sequence are stale and are
//!   dropped without touching the download offset.
//! - **Single flight**: at most one range request is outstanding; pacing ticks
//!   that find one in flight do nothing.
//! - **Pacing plan**: once size and duration are known, the request interval
//!   is derived from the media byte rate so downloads run at a fixed multiple
//!   of playback speed.
//!
//! ```text
//!   tick ──> next_request() ──> Request{seq=N, start..=end} ──> transport
//!                                                                 │
//!   accept_chunk(seq) <──────── ChunkData{seq} ───────────────────┘
//!     seq == N  → Accepted, offset += len
//!     seq != N  → Stale
//! ```

use bytes::Bytes;
use core_async::time::{duration_from_millis_f64, Duration};
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::types::{DownloadRequest, FileDescriptor};

// ============================================================================
// Pacing
// ============================================================================

/// Download pacing derived from the media byte rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingPlan {
    /// Bytes per second of media; zero while unknown
    pub byte_rate: f64,
    pub chunk_interval: Duration,
    /// Bytes that must arrive after a seek before playback resumes
    pub seek_wait_len: u64,
}

impl PacingPlan {
    /// Plan used until the byte rate is known.
    pub fn fallback(config: &PlayerConfig) -> Self {
        Self {
            byte_rate: 0.0,
            chunk_interval: config.default_chunk_interval(),
            seek_wait_len: config.default_seek_wait_length,
        }
    }

    /// Derives the plan from the resource size and media duration.
    ///
    /// `byteRate = size * 1000 / durationMs`, the target speed is
    /// `coefficient * byteRate`, and one chunk is requested every
    /// `1000 / (targetSpeed / chunkSize)` milliseconds. Returns `None` when
    /// either input is zero.
    pub fn from_media(total_size: u64, duration_ms: u64, config: &PlayerConfig) -> Option<Self> {
        if total_size == 0 || duration_ms == 0 {
            return None;
        }

        let byte_rate = 1000.0 * total_size as f64 / duration_ms as f64;
        let target_speed = config.download_speed_coefficient * byte_rate;
        let chunks_per_second = target_speed / config.chunk_size as f64;
        let interval_ms = 1000.0 / chunks_per_second;
        let seek_wait_len = (byte_rate * config.max_buffer_time_length * 2.0) as u64;

        Some(Self {
            byte_rate,
            chunk_interval: duration_from_millis_f64(interval_ms),
            seek_wait_len,
        })
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// What the next pacing step should do.
#[derive(Debug, Clone, PartialEq)]
pub enum NextChunk {
    /// Send this request.
    Request(DownloadRequest),
    /// The whole resource has just been downloaded.
    EndOfFile,
    /// Still at the end of file, already reported.
    Complete,
    /// Nothing to do: a request is in flight or the size is unknown.
    Idle,
}

/// Verdict on a received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkVerdict {
    /// From an older epoch. Must not reach the decoder.
    Stale,
    /// Current epoch; the offset has advanced by `len`.
    Accepted { len: u64 },
}

/// Owns the [`FileDescriptor`] and the download epoch.
#[derive(Debug)]
pub struct TransportCoordinator {
    file: Option<FileDescriptor>,
    epoch: u64,
    in_flight: bool,
    pacing: bool,
    eof_reported: bool,
    plan: PacingPlan,
    fallback: PacingPlan,
    stream_received: u64,
}

impl TransportCoordinator {
    pub fn new(config: &PlayerConfig) -> Self {
        let fallback = PacingPlan::fallback(config);
        Self {
            file: None,
            epoch: 0,
            in_flight: false,
            pacing: false,
            eof_reported: false,
            plan: fallback,
            fallback,
            stream_received: 0,
        }
    }

    /// Starts tracking a new resource. The current epoch is kept for the
    /// bootstrap requests issued before pacing starts.
    pub fn begin(&mut self, file: FileDescriptor) {
        self.file = Some(file);
        self.in_flight = false;
        self.pacing = false;
        self.eof_reported = false;
        self.plan = self.fallback;
        self.stream_received = 0;
    }

    pub fn file(&self) -> Option<&FileDescriptor> {
        self.file.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn plan(&self) -> &PacingPlan {
        &self.plan
    }

    pub fn is_pacing(&self) -> bool {
        self.pacing
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn set_total_size(&mut self, size: u64) {
        if let Some(file) = self.file.as_mut() {
            file.total_size = Some(size);
        }
    }

    /// Recomputes pacing from the media duration. Keeps the fallback plan when
    /// the size or duration is unknown.
    pub fn apply_duration(&mut self, duration_ms: u64, config: &PlayerConfig) {
        let total_size = self.file.as_ref().and_then(|f| f.total_size).unwrap_or(0);
        if let Some(plan) = PacingPlan::from_media(total_size, duration_ms, config) {
            info!(
                byte_rate = plan.byte_rate,
                interval_ms = plan.chunk_interval.as_secs_f64() * 1000.0,
                seek_wait_len = plan.seek_wait_len,
                "Download pacing derived from media"
            );
            self.plan = plan;
        }
    }

    /// Invalidates everything in flight. Returns the new epoch.
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.in_flight = false;
        self.epoch
    }

    /// Opens a new epoch and marks pacing active. The caller starts the timer
    /// with [`PacingPlan::chunk_interval`].
    pub fn start_pacing(&mut self) -> u64 {
        let epoch = self.advance_epoch();
        self.pacing = true;
        debug!(epoch, "Download pacing started");
        epoch
    }

    pub fn stop_pacing(&mut self) {
        self.pacing = false;
        self.in_flight = false;
    }

    /// Builds the next range request, honoring single flight.
    pub fn next_request(&mut self) -> NextChunk {
        if self.in_flight {
            return NextChunk::Idle;
        }

        let Some(file) = self.file.as_ref() else {
            return NextChunk::Idle;
        };
        let Some(size) = file.total_size else {
            return NextChunk::Idle;
        };

        let start = file.download_offset;
        if start >= size {
            self.pacing = false;
            if self.eof_reported {
                return NextChunk::Complete;
            }
            self.eof_reported = true;
            info!(size, "Reached end of file");
            return NextChunk::EndOfFile;
        }

        let end = (start + file.chunk_size - 1).min(size - 1);
        self.in_flight = true;

        NextChunk::Request(DownloadRequest {
            sequence: self.epoch,
            start,
            end,
            protocol: file.protocol,
        })
    }

    /// Checks a chunk's epoch and advances the offset for current ones.
    pub fn accept_chunk(&mut self, sequence: u64, start: u64, end: u64) -> ChunkVerdict {
        if sequence != self.epoch {
            return ChunkVerdict::Stale;
        }

        self.in_flight = false;
        let len = end.saturating_sub(start) + 1;
        if let Some(file) = self.file.as_mut() {
            file.download_offset += len;
        }
        ChunkVerdict::Accepted { len }
    }

    /// Clears single flight after a failed request of the current epoch.
    /// Returns `false` for stale failures.
    pub fn fail_request(&mut self, sequence: u64) -> bool {
        if sequence != self.epoch {
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Moves the download position, for a decoder that asks for data at a
    /// different offset after a seek. Offsets outside the file are ignored.
    pub fn seek_to_offset(&mut self, offset: u64) -> bool {
        let Some(file) = self.file.as_mut() else {
            return false;
        };
        match file.total_size {
            Some(size) if offset < size => {
                file.download_offset = offset;
                self.eof_reported = false;
                true
            }
            _ => false,
        }
    }

    /// Bytes left to download; zero when unknown.
    pub fn remaining(&self) -> u64 {
        self.file
            .as_ref()
            .and_then(FileDescriptor::remaining)
            .unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.file.as_ref().map(FileDescriptor::is_complete).unwrap_or(false)
    }

    /// Splits pushed stream bytes into decoder-sized pieces and counts them.
    pub fn split_stream(&mut self, data: Bytes) -> Vec<Bytes> {
        let chunk_size = self
            .file
            .as_ref()
            .map(|f| f.chunk_size)
            .unwrap_or(u64::MAX)
            .max(1) as usize;

        self.stream_received += data.len() as u64;

        if data.len() <= chunk_size {
            return vec![data];
        }

        let mut pieces = Vec::with_capacity(data.len().div_ceil(chunk_size));
        let mut rest = data;
        while !rest.is_empty() {
            let take = chunk_size.min(rest.len());
            pieces.push(rest.split_to(take));
        }
        pieces
    }

    /// Stream bytes received since the session began.
    pub fn stream_received(&self) -> u64 {
        self.stream_received
    }

    /// Forgets the resource and invalidates everything in flight.
    pub fn reset(&mut self) {
        self.advance_epoch();
        self.file = None;
        self.pacing = false;
        self.eof_reported = false;
        self.plan = self.fallback;
        self.stream_received = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(size: u64) -> TransportCoordinator {
        let config = PlayerConfig::default();
        let mut transport = TransportCoordinator::new(&config);
        transport.begin(FileDescriptor::new("file:///x", config.chunk_size));
        transport.set_total_size(size);
        transport
    }

    #[test]
    fn test_pacing_for_ten_mebibyte_file() {
        let config = PlayerConfig::default();
        let plan = PacingPlan::from_media(10_485_760, 10_000, &config).unwrap();

        assert_eq!(plan.byte_rate, 1_048_576.0);
        assert_eq!(plan.chunk_interval, Duration::from_micros(31_250));
        assert_eq!(plan.seek_wait_len, 2_097_152);
    }

    #[test]
    fn test_unknown_duration_keeps_fallback() {
        let config = PlayerConfig::default();
        assert!(PacingPlan::from_media(1_000, 0, &config).is_none());

        let mut transport = coordinator(1_000);
        transport.apply_duration(0, &config);
        assert_eq!(transport.plan().chunk_interval, Duration::from_millis(200));
        assert_eq!(transport.plan().seek_wait_len, 524_288);
    }

    #[test]
    fn test_single_flight() {
        let mut transport = coordinator(200_000);
        let first = match transport.next_request() {
            NextChunk::Request(request) => request,
            other => panic!("expected request, got {:?}", other),
        };
        assert_eq!((first.start, first.end), (0, 65_535));
        assert_eq!(transport.next_request(), NextChunk::Idle);

        transport.accept_chunk(first.sequence, first.start, first.end);
        match transport.next_request() {
            NextChunk::Request(request) => assert_eq!(request.start, 65_536),
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_chunk_leaves_offset() {
        let mut transport = coordinator(200_000);
        let request = match transport.next_request() {
            NextChunk::Request(request) => request,
            other => panic!("expected request, got {:?}", other),
        };

        transport.advance_epoch();
        let verdict = transport.accept_chunk(request.sequence, request.start, request.end);

        assert_eq!(verdict, ChunkVerdict::Stale);
        assert_eq!(transport.file().unwrap().download_offset, 0);
        assert!(!transport.fail_request(request.sequence));
    }

    #[test]
    fn test_last_chunk_is_clamped_and_eof_reported_once() {
        let mut transport = coordinator(70_000);
        transport.start_pacing();
        transport.seek_to_offset(65_536);

        let request = match transport.next_request() {
            NextChunk::Request(request) => request,
            other => panic!("expected request, got {:?}", other),
        };
        assert_eq!(request.end, 69_999);

        transport.accept_chunk(request.sequence, request.start, request.end);
        assert_eq!(transport.next_request(), NextChunk::EndOfFile);
        assert!(!transport.is_pacing());
        assert_eq!(transport.next_request(), NextChunk::Complete);
        assert!(transport.is_complete());
    }

    #[test]
    fn test_seek_to_offset_bounds() {
        let mut transport = coordinator(1_000);
        assert!(transport.seek_to_offset(999));
        assert!(!transport.seek_to_offset(1_000));
        assert_eq!(transport.remaining(), 1);
    }

    #[test]
    fn test_split_stream_by_chunk_size() {
        let config = PlayerConfig {
            chunk_size: 4,
            ..Default::default()
        };
        let mut transport = TransportCoordinator::new(&config);
        transport.begin(FileDescriptor::new("http://live", config.chunk_size));

        let pieces = transport.split_stream(Bytes::from_static(b"abcdefghij"));
        let lengths: Vec<usize> = pieces.iter().map(Bytes::len).collect();
        assert_eq!(lengths, vec![4, 4, 2]);
        assert_eq!(transport.stream_received(), 10);
    }

    #[test]
    fn test_reset_advances_epoch() {
        let mut transport = coordinator(1_000);
        let before = transport.epoch();
        transport.reset();
        assert_eq!(transport.epoch(), before + 1);
        assert!(transport.file().is_none());
    }
}
