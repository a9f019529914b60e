//! Shared playback data types.

use bridge_traits::{AudioParams, ProtocolKind, TransportRequest, VideoParams};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Transport Data
// ============================================================================

/// The resource being played and how far it has been downloaded.
///
/// `download_offset` only moves forward during normal playback; a seek is the
/// only thing that may move it elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub url: String,
    pub protocol: ProtocolKind,
    /// `None` until metadata arrives, and for unbounded streams.
    pub total_size: Option<u64>,
    pub download_offset: u64,
    pub chunk_size: u64,
}

impl FileDescriptor {
    pub fn new(url: impl Into<String>, chunk_size: u64) -> Self {
        let url = url.into();
        Self {
            protocol: ProtocolKind::from_url(&url),
            url,
            total_size: None,
            download_offset: 0,
            chunk_size,
        }
    }

    /// Bytes left to download. `None` when the size is unknown.
    pub fn remaining(&self) -> Option<u64> {
        self.total_size
            .map(|size| size.saturating_sub(self.download_offset))
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == Some(0)
    }
}

/// One range request, tagged with the epoch that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRequest {
    pub sequence: u64,
    /// Inclusive
    pub start: u64,
    /// Inclusive
    pub end: u64,
    pub protocol: ProtocolKind,
}

impl DownloadRequest {
    pub fn byte_len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn to_transport(&self, url: &str) -> TransportRequest {
        TransportRequest::DownloadChunk {
            url: url.to_string(),
            start: self.start,
            end: self.end,
            sequence: self.sequence,
            protocol: self.protocol,
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Audio,
    Video,
}

/// A decoded frame waiting for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    /// Presentation timestamp in seconds
    pub timestamp: f64,
    pub payload: Bytes,
    /// Position in the order frames were buffered
    pub arrival: u64,
}

impl Frame {
    pub fn is_video(&self) -> bool {
        self.kind == FrameKind::Video
    }
}

// ============================================================================
// States
// ============================================================================

/// Player lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Pausing,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "idle",
            PlayerState::Playing => "playing",
            PlayerState::Pausing => "pausing",
        };
        f.write_str(name)
    }
}

/// Decoder readiness as tracked by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DecoderState {
    #[default]
    Idle,
    Initializing,
    Ready,
    Finished,
}

impl fmt::Display for DecoderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecoderState::Idle => "idle",
            DecoderState::Initializing => "initializing",
            DecoderState::Ready => "ready",
            DecoderState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the player for hosts and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlayerSnapshot {
    pub player_state: PlayerState,
    pub decoder_state: DecoderState,
    /// Stalled waiting for frames (loading indicator shown)
    pub buffering: bool,
    pub seeking: bool,
    /// Seconds, as last reported by `timeupdate`. Follows the audio clock,
    /// or the last presented video frame when no audio sink runs.
    pub current_time: f64,
    /// Survives `stop` so hosts can keep showing it
    pub duration_ms: u64,
    pub buffered_frames: usize,
    /// Seconds between the oldest and newest buffered frame
    pub buffered_span: f64,
    pub video: Option<VideoParams>,
    pub audio: Option<AudioParams>,
}

/// Formats seconds as `hh:mm:ss`. Negative and non-finite input formats as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00:00");
        assert_eq!(format_time(59.9), "00:00:59");
        assert_eq!(format_time(3_725.0), "01:02:05");
        assert_eq!(format_time(-3.0), "00:00:00");
        assert_eq!(format_time(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_file_descriptor_protocol_and_remaining() {
        let mut file = FileDescriptor::new("wss://live/feed", 65_536);
        assert_eq!(file.protocol, ProtocolKind::WebSocket);
        assert_eq!(file.remaining(), None);

        file.total_size = Some(100);
        file.download_offset = 40;
        assert_eq!(file.remaining(), Some(60));
        assert!(!file.is_complete());

        file.download_offset = 100;
        assert!(file.is_complete());
    }

    #[test]
    fn test_download_request_length() {
        let request = DownloadRequest {
            sequence: 1,
            start: 0,
            end: 65_535,
            protocol: ProtocolKind::Http,
        };
        assert_eq!(request.byte_len(), 65_536);
        match request.to_transport("http://h/v") {
            TransportRequest::DownloadChunk { sequence, end, .. } => {
                assert_eq!(sequence, 1);
                assert_eq!(end, 65_535);
            }
            other => panic!("unexpected request {:?}", other),
        }
    }
}
