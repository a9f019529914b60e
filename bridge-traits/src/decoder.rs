//! Decoder worker contract.
//!
//! The decoder buffers whatever bytes it is fed, opens the container once it
//! has seen enough of it, and emits decoded frames while decoding is toggled
//! on. The player never waits on a decoder response.

use bytes::Bytes;

use crate::{
    error::Result,
    media::{AudioStreamInfo, VideoParams},
    platform::PlatformSendSync,
    worker::WorkerChannel,
};

/// Offset value in [`DecoderResponse::NeedData`] meaning "already buffered".
pub const NEED_DATA_BUFFERED: i64 = -1;

/// Requests the player sends to the decoder worker.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderRequest {
    /// `size` is -1 for unbounded streams.
    Init { size: i64, chunk_size: u64 },
    Uninit,
    Open,
    Close,
    FeedData(Bytes),
    /// `interval_ms` of zero asks for back-to-back decoding.
    StartDecoding { interval_ms: u64 },
    PauseDecoding,
    SeekTo { ms: u64 },
}

/// Responses and events the decoder worker posts back.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderResponse {
    InitResult { code: i32 },
    OpenResult {
        code: i32,
        video: Option<VideoParams>,
        audio: Option<AudioStreamInfo>,
    },
    /// YUV420 planes, timestamp in seconds.
    VideoFrame { timestamp: f64, data: Bytes },
    /// Interleaved PCM, timestamp in seconds.
    AudioFrame { timestamp: f64, data: Bytes },
    DecodeFinished,
    /// After a seek the decoder asks for data from `offset`, or reports
    /// [`NEED_DATA_BUFFERED`] with `available` bytes already on hand.
    NeedData { offset: i64, available: u64 },
    SeekResult { code: i32 },
    FatalError { code: i32, message: String },
}

/// Starts decoder workers.
pub trait DecoderWorker: PlatformSendSync {
    fn spawn(&self) -> Result<WorkerChannel<DecoderRequest, DecoderResponse>>;
}
