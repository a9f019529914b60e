//! # Player Configuration
//!
//! Tunables for header buffering, download pacing, frame buffering and the
//! presentation cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player configuration.
///
/// Controls how many bytes the decoder needs before opening, how aggressively
/// chunks are downloaded relative to the media byte rate, and how much decoded
/// media is buffered ahead of the audio clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Bytes fed to the decoder before it is opened.
    ///
    /// Default: 512 KiB.
    #[serde(default = "default_wait_header_length")]
    pub wait_header_length: u64,

    /// Bytes per range request and per decoder feed in stream mode.
    ///
    /// Default: 64 KiB.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Buffered time span (seconds, newest minus oldest frame) at which
    /// decoding pauses. Decoding resumes below half of it.
    ///
    /// Default: 1.0.
    #[serde(default = "default_max_buffer_time_length")]
    pub max_buffer_time_length: f64,

    /// Download speed target as a multiple of the media byte rate.
    ///
    /// Default: 2.0.
    #[serde(default = "default_download_speed_coefficient")]
    pub download_speed_coefficient: f64,

    /// Delay between decoded frames in normal (non-urgent) decoding.
    ///
    /// Default: 5 ms.
    #[serde(default = "default_decode_interval_ms")]
    pub decode_interval_ms: u64,

    /// Pacing interval used until the byte rate is known.
    ///
    /// Default: 200 ms.
    #[serde(default = "default_chunk_interval_ms")]
    pub default_chunk_interval_ms: u64,

    /// Seek byte gate used until the byte rate is known.
    ///
    /// Default: 512 KiB.
    #[serde(default = "default_seek_wait_length")]
    pub default_seek_wait_length: u64,

    /// Interval of `timeupdate` polling.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_track_poll_interval_ms")]
    pub track_poll_interval_ms: u64,

    /// Presentation cadence of the display loop.
    ///
    /// Default: 16 ms (~60 Hz).
    #[serde(default = "default_display_interval_ms")]
    pub display_interval_ms: u64,

    /// Frames processed per display cycle, so presentation keeps up with
    /// sources whose frame rate exceeds the display cadence.
    ///
    /// Default: 2.
    #[serde(default = "default_frames_per_cycle")]
    pub frames_per_cycle: usize,

    /// Treat sources as live/unbounded push streams.
    ///
    /// Default: false.
    #[serde(default)]
    pub streaming: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            wait_header_length: default_wait_header_length(),
            chunk_size: default_chunk_size(),
            max_buffer_time_length: default_max_buffer_time_length(),
            download_speed_coefficient: default_download_speed_coefficient(),
            decode_interval_ms: default_decode_interval_ms(),
            default_chunk_interval_ms: default_chunk_interval_ms(),
            default_seek_wait_length: default_seek_wait_length(),
            track_poll_interval_ms: default_track_poll_interval_ms(),
            display_interval_ms: default_display_interval_ms(),
            frames_per_cycle: default_frames_per_cycle(),
            streaming: false,
        }
    }
}

impl PlayerConfig {
    /// Smaller header and buffer for fast start on short clips.
    pub fn low_latency() -> Self {
        Self {
            wait_header_length: 128 * 1024,
            max_buffer_time_length: 0.5,
            download_speed_coefficient: 3.0,
            default_chunk_interval_ms: 50,
            ..Default::default()
        }
    }

    /// Push-stream defaults for live sources.
    pub fn live_stream() -> Self {
        Self {
            wait_header_length: 64 * 1024,
            streaming: true,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be > 0".to_string());
        }

        if !(self.max_buffer_time_length > 0.0) {
            return Err("max_buffer_time_length must be > 0".to_string());
        }

        if !(self.download_speed_coefficient > 0.0) {
            return Err("download_speed_coefficient must be > 0".to_string());
        }

        if self.default_chunk_interval_ms == 0 {
            return Err("default_chunk_interval_ms must be > 0".to_string());
        }

        if self.track_poll_interval_ms == 0 || self.display_interval_ms == 0 {
            return Err("timer intervals must be > 0".to_string());
        }

        if self.frames_per_cycle == 0 {
            return Err("frames_per_cycle must be > 0".to_string());
        }

        Ok(())
    }

    pub fn track_poll_interval(&self) -> Duration {
        Duration::from_millis(self.track_poll_interval_ms)
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    pub fn default_chunk_interval(&self) -> Duration {
        Duration::from_millis(self.default_chunk_interval_ms)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_wait_header_length() -> u64 {
    512 * 1024
}

fn default_chunk_size() -> u64 {
    64 * 1024
}

fn default_max_buffer_time_length() -> f64 {
    1.0
}

fn default_download_speed_coefficient() -> f64 {
    2.0
}

fn default_decode_interval_ms() -> u64 {
    5
}

fn default_chunk_interval_ms() -> u64 {
    200
}

fn default_seek_wait_length() -> u64 {
    512 * 1024
}

fn default_track_poll_interval_ms() -> u64 {
    500
}

fn default_display_interval_ms() -> u64 {
    16
}

fn default_frames_per_cycle() -> usize {
    2
}

// ============================================================================
// Play Request
// ============================================================================

/// Arguments of a `play` command.
///
/// `None` fields fall back to the player configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub url: String,
    #[serde(default)]
    pub wait_header_length: Option<u64>,
    #[serde(default)]
    pub streaming: Option<bool>,
}

impl PlayRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_wait_header_length(mut self, bytes: u64) -> Self {
        self.wait_header_length = Some(bytes);
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.wait_header_length, 524_288);
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.max_buffer_time_length, 1.0);
        assert_eq!(config.frames_per_cycle, 2);
        assert!(!config.streaming);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(PlayerConfig::low_latency().validate().is_ok());
        let live = PlayerConfig::live_stream();
        assert!(live.streaming);
        assert!(live.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_chunk() {
        let config = PlayerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            max_buffer_time_length: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: PlayerConfig =
            serde_json::from_str(r#"{"chunk_size": 32768, "streaming": true}"#).unwrap();
        assert_eq!(config.chunk_size, 32_768);
        assert_eq!(config.wait_header_length, 524_288);
        assert!(config.streaming);
    }

    #[test]
    fn test_play_request_builder() {
        let request = PlayRequest::new("file:///tmp/a.mp4").with_wait_header_length(1024);
        assert_eq!(request.wait_header_length, Some(1024));
        assert_eq!(request.streaming, None);
    }
}
