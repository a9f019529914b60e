//! Transport worker contract.
//!
//! The transport worker fetches file metadata, byte ranges and live streams.
//! Chunk and stream traffic carries the sequence number of the download epoch
//! that requested it so the player can discard anything that outlived a seek
//! or stop.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{error::Result, platform::PlatformSendSync, worker::WorkerChannel};

/// Status code of a successful metadata request.
pub const STATUS_OK: u16 = 200;

/// How the worker should reach the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolKind {
    Http,
    WebSocket,
    File,
}

impl ProtocolKind {
    /// `ws://` and `wss://` use WebSocket framing, `file://` reads the local
    /// file system, everything else goes through HTTP.
    pub fn from_url(url: &str) -> Self {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();

        match scheme.as_str() {
            "ws" | "wss" => ProtocolKind::WebSocket,
            "file" => ProtocolKind::File,
            _ => ProtocolKind::Http,
        }
    }
}

/// Requests the player sends to the transport worker.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportRequest {
    /// Resolve the total size of the resource.
    GetFileInfo { url: String, protocol: ProtocolKind },
    /// Fetch the inclusive byte range `start..=end`.
    DownloadChunk {
        url: String,
        start: u64,
        end: u64,
        sequence: u64,
        protocol: ProtocolKind,
    },
    /// Open a push-style live stream.
    OpenStream { url: String, sequence: u64 },
    /// Abort fetches in flight. The worker stays usable for later requests.
    Close,
}

/// Responses the transport worker posts back.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportResponse {
    /// Result of `GetFileInfo`. `size` is -1 when unknown.
    FileInfo { status: u16, size: i64 },
    ChunkData {
        data: Bytes,
        start: u64,
        end: u64,
        sequence: u64,
    },
    StreamData { data: Bytes, sequence: u64 },
    StreamEnded { sequence: u64 },
    /// A chunk or stream request failed.
    Failed {
        sequence: u64,
        status: u16,
        message: String,
    },
}

impl TransportResponse {
    /// Sequence tag of epoch-bound responses.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            TransportResponse::FileInfo { .. } => None,
            TransportResponse::ChunkData { sequence, .. }
            | TransportResponse::StreamData { sequence, .. }
            | TransportResponse::StreamEnded { sequence }
            | TransportResponse::Failed { sequence, .. } => Some(*sequence),
        }
    }
}

/// Starts transport workers.
///
/// Each call to [`TransportWorker::spawn`] starts one worker task bound to the
/// current runtime and returns the player's side of its channel.
pub trait TransportWorker: PlatformSendSync {
    fn spawn(&self) -> Result<WorkerChannel<TransportRequest, TransportResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_url() {
        assert_eq!(ProtocolKind::from_url("wss://host/v.mp4"), ProtocolKind::WebSocket);
        assert_eq!(ProtocolKind::from_url("WS://host/v.mp4"), ProtocolKind::WebSocket);
        assert_eq!(ProtocolKind::from_url("https://host/v.mp4"), ProtocolKind::Http);
        assert_eq!(ProtocolKind::from_url("file:///tmp/v.mp4"), ProtocolKind::File);
        assert_eq!(ProtocolKind::from_url("relative/v.mp4"), ProtocolKind::Http);
    }

    #[test]
    fn test_response_sequence() {
        let chunk = TransportResponse::ChunkData {
            data: Bytes::from_static(b"abc"),
            start: 0,
            end: 2,
            sequence: 4,
        };
        assert_eq!(chunk.sequence(), Some(4));
        assert_eq!(
            TransportResponse::FileInfo { status: 200, size: 3 }.sequence(),
            None
        );
    }
}
