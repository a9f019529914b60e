//! # Decode Session
//!
//! Tracks the decoder's lifecycle and the decoding toggle, and builds the
//! requests that drive it.
//!
//! ```text
//!  Idle ──open()──> Initializing ──OpenResult(0)──> Ready ──DecodeFinished──> Finished
//!   ▲                                                 ▲                          │
//!   └──────────────── teardown() (stop) ──────────────┴────── seek() ────────────┘
//! ```
//!
//! Decoding is a toggle, not a queue depth: backpressure pauses and resumes
//! it. Urgent mode asks for back-to-back decoding while catching up after a
//! seek.

use bridge_traits::{AudioParams, AudioStreamInfo, DecoderRequest, SampleFormat};
use tracing::error;

use crate::types::DecoderState;

#[derive(Debug, Clone)]
pub struct DecodeSession {
    state: DecoderState,
    decoding: bool,
    urgent: bool,
    decode_interval_ms: u64,
}

impl DecodeSession {
    pub fn new(decode_interval_ms: u64) -> Self {
        Self {
            state: DecoderState::Idle,
            decoding: false,
            urgent: false,
            decode_interval_ms,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_decoding(&self) -> bool {
        self.decoding
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    pub fn set_urgent(&mut self, urgent: bool) {
        self.urgent = urgent;
    }

    /// `size` of `None` initializes for an unbounded stream.
    pub fn init(&self, size: Option<u64>, chunk_size: u64) -> DecoderRequest {
        DecoderRequest::Init {
            size: size.map(|s| s as i64).unwrap_or(-1),
            chunk_size,
        }
    }

    /// Whether an Idle decoder has been fed enough to be opened.
    ///
    /// `fed` counts bytes handed to the decoder; the whole of a bounded
    /// resource is always enough.
    pub fn should_open(&self, fed: u64, total_size: Option<u64>, wait_header_length: u64) -> bool {
        self.state == DecoderState::Idle
            && (fed >= wait_header_length || total_size == Some(fed))
    }

    pub fn open(&mut self) -> DecoderRequest {
        self.state = DecoderState::Initializing;
        DecoderRequest::Open
    }

    pub fn mark_ready(&mut self) {
        self.state = DecoderState::Ready;
    }

    pub fn start_decoding(&mut self) -> DecoderRequest {
        self.decoding = true;
        DecoderRequest::StartDecoding {
            interval_ms: if self.urgent {
                0
            } else {
                self.decode_interval_ms
            },
        }
    }

    pub fn pause_decoding(&mut self) -> DecoderRequest {
        self.decoding = false;
        DecoderRequest::PauseDecoding
    }

    /// Marks the stream fully decoded and stops decoding.
    pub fn finish(&mut self) -> DecoderRequest {
        self.state = DecoderState::Finished;
        self.pause_decoding()
    }

    /// A seek reopens a finished stream and switches to urgent decoding.
    pub fn seek(&mut self, ms: u64) -> DecoderRequest {
        if self.state == DecoderState::Finished {
            self.state = DecoderState::Ready;
        }
        self.urgent = true;
        DecoderRequest::SeekTo { ms }
    }

    /// Requests that release the decoder, in order. No reply is awaited.
    pub fn teardown(&mut self) -> [DecoderRequest; 2] {
        self.state = DecoderState::Idle;
        self.decoding = false;
        self.urgent = false;
        [DecoderRequest::Close, DecoderRequest::Uninit]
    }
}

/// Maps the decoder's audio description to output parameters. Unknown sample
/// format codes fall back to signed 16-bit.
pub fn audio_params(info: &AudioStreamInfo) -> AudioParams {
    let sample_format = SampleFormat::from_code(info.sample_format).unwrap_or_else(|| {
        error!(code = info.sample_format, "Unsupported audio sample format");
        SampleFormat::S16
    });

    AudioParams {
        sample_format,
        channels: info.channels,
        sample_rate: info.sample_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_condition() {
        let session = DecodeSession::new(5);
        assert!(!session.should_open(1_000, Some(10_000), 4_096));
        assert!(session.should_open(4_096, Some(10_000), 4_096));
        assert!(session.should_open(1_000, Some(1_000), 4_096));
        assert!(!session.should_open(1_000, None, 4_096));
    }

    #[test]
    fn test_lifecycle() {
        let mut session = DecodeSession::new(5);
        assert_eq!(session.open(), DecoderRequest::Open);
        assert_eq!(session.state(), DecoderState::Initializing);
        assert!(!session.should_open(1 << 20, None, 0));

        session.mark_ready();
        assert_eq!(
            session.start_decoding(),
            DecoderRequest::StartDecoding { interval_ms: 5 }
        );
        assert_eq!(session.finish(), DecoderRequest::PauseDecoding);
        assert_eq!(session.state(), DecoderState::Finished);
        assert!(!session.is_decoding());
    }

    #[test]
    fn test_seek_reopens_finished_and_goes_urgent() {
        let mut session = DecodeSession::new(5);
        session.mark_ready();
        session.finish();

        assert_eq!(session.seek(30_000), DecoderRequest::SeekTo { ms: 30_000 });
        assert_eq!(session.state(), DecoderState::Ready);
        assert_eq!(
            session.start_decoding(),
            DecoderRequest::StartDecoding { interval_ms: 0 }
        );
    }

    #[test]
    fn test_teardown_order() {
        let mut session = DecodeSession::new(5);
        session.mark_ready();
        session.start_decoding();

        assert_eq!(
            session.teardown(),
            [DecoderRequest::Close, DecoderRequest::Uninit]
        );
        assert_eq!(session.state(), DecoderState::Idle);
        assert!(!session.is_decoding());
    }

    #[test]
    fn test_init_for_stream() {
        let session = DecodeSession::new(5);
        assert_eq!(
            session.init(None, 65_536),
            DecoderRequest::Init {
                size: -1,
                chunk_size: 65_536
            }
        );
    }

    #[test]
    fn test_unknown_sample_format_falls_back() {
        let params = audio_params(&AudioStreamInfo {
            sample_format: 42,
            channels: 2,
            sample_rate: 44_100,
        });
        assert_eq!(params.sample_format, SampleFormat::S16);

        let params = audio_params(&AudioStreamInfo {
            sample_format: 3,
            channels: 1,
            sample_rate: 8_000,
        });
        assert_eq!(params.sample_format, SampleFormat::F32);
    }
}
