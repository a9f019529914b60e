//! # Playback Error Types
//!
//! Error types for player commands and the driver loop, plus the
//! `{success, code, message}` result descriptor handed back to hosts.

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Precondition Errors
    // ========================================================================
    /// `play` was called without a media location.
    #[error("Invalid url")]
    InvalidUrl,

    /// No render target was configured.
    #[error("Canvas not set")]
    RenderTargetMissing,

    /// No transport worker was configured.
    #[error("Downloader not initialized")]
    TransportNotInitialized,

    /// No decoder worker was configured.
    #[error("Decoder not initialized")]
    DecoderNotInitialized,

    // ========================================================================
    // State Errors
    // ========================================================================
    #[error("Not playing")]
    NotPlaying,

    #[error("Not pausing")]
    NotPausing,

    /// Seeking a live or unbounded stream, or a session that never started.
    #[error("Seeking not supported")]
    SeekNotSupported,

    // ========================================================================
    // Worker Errors
    // ========================================================================
    /// Metadata request answered with a non-success status.
    #[error("Metadata request failed with status {status}")]
    MetadataFailed { status: u16 },

    /// Decoder reported a non-zero code for a lifecycle request.
    #[error("Decoder {stage} failed with code {code}")]
    DecoderFailed { stage: &'static str, code: i32 },

    /// A worker dropped its side of the channel.
    #[error("Worker channel closed: {0}")]
    WorkerClosed(String),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// Player or runtime configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The driver task has exited; commands can no longer be delivered.
    #[error("Player driver stopped")]
    DriverStopped,

    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl PlaybackError {
    /// Numeric code reported in [`CommandResult::code`].
    pub fn code(&self) -> i32 {
        match self {
            PlaybackError::InvalidUrl | PlaybackError::NotPlaying | PlaybackError::NotPausing => -1,
            PlaybackError::RenderTargetMissing => -2,
            PlaybackError::TransportNotInitialized => -3,
            PlaybackError::DecoderNotInitialized => -4,
            PlaybackError::SeekNotSupported => -5,
            PlaybackError::MetadataFailed { .. } => -1,
            PlaybackError::DecoderFailed { code, .. } => *code,
            PlaybackError::WorkerClosed(_)
            | PlaybackError::InvalidConfig(_)
            | PlaybackError::DriverStopped
            | PlaybackError::Bridge(_) => -100,
        }
    }

    /// Returns `true` for errors rejected before any state change because a
    /// required input or collaborator is missing.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidUrl
                | PlaybackError::RenderTargetMissing
                | PlaybackError::TransportNotInitialized
                | PlaybackError::DecoderNotInitialized
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ChannelClosed(message) => PlaybackError::WorkerClosed(message),
            other => PlaybackError::Bridge(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

// ============================================================================
// Command Result Descriptor
// ============================================================================

/// Outcome of a player command as reported to hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    /// 0 on success, otherwise [`PlaybackError::code`]
    pub code: i32,
    pub message: String,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            code: 0,
            message: "Success".to_string(),
        }
    }

    pub fn failure(err: &PlaybackError) -> Self {
        Self {
            success: false,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<PlaybackError> for CommandResult {
    fn from(err: PlaybackError) -> Self {
        CommandResult::failure(&err)
    }
}

impl From<Result<()>> for CommandResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => CommandResult::success(),
            Err(err) => CommandResult::failure(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_codes() {
        assert_eq!(PlaybackError::InvalidUrl.code(), -1);
        assert_eq!(PlaybackError::RenderTargetMissing.code(), -2);
        assert_eq!(PlaybackError::TransportNotInitialized.code(), -3);
        assert_eq!(PlaybackError::DecoderNotInitialized.code(), -4);
        assert!(PlaybackError::DecoderNotInitialized.is_precondition());
        assert!(!PlaybackError::NotPausing.is_precondition());
    }

    #[test]
    fn test_command_result_from_error() {
        let result = CommandResult::from(PlaybackError::NotPausing);
        assert!(!result.success);
        assert_eq!(result.code, -1);
        assert_eq!(result.message, "Not pausing");

        assert_eq!(CommandResult::from(Ok(())), CommandResult::success());
    }

    #[test]
    fn test_decoder_code_passthrough() {
        let err = PlaybackError::DecoderFailed {
            stage: "open",
            code: 7,
        };
        assert_eq!(err.code(), 7);
        assert_eq!(err.to_string(), "Decoder open failed with code 7");
    }

    #[test]
    fn test_closed_bridge_maps_to_worker_closed() {
        let err: PlaybackError = BridgeError::ChannelClosed("decoder".into()).into();
        assert_eq!(err, PlaybackError::WorkerClosed("decoder".into()));
    }
}
