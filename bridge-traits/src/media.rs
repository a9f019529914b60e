//! Media parameters reported by the decoder when a stream opens.

use serde::{Deserialize, Serialize};

/// Video stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Decoder pixel format code (opaque to the player)
    pub pixel_format: i32,
    pub width: u32,
    pub height: u32,
}

impl VideoParams {
    /// Bytes in the luma (Y) plane of one YUV420 frame.
    pub fn luma_plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes in each chroma (U, V) plane of one YUV420 frame.
    pub fn chroma_plane_len(&self) -> usize {
        (self.width as usize / 2) * (self.height as usize / 2)
    }
}

/// PCM sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
}

impl SampleFormat {
    /// Maps the decoder's sample format code. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SampleFormat::U8),
            1 => Some(SampleFormat::S16),
            2 => Some(SampleFormat::S32),
            3 => Some(SampleFormat::F32),
            _ => None,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::S16
    }
}

/// Audio stream description as reported by the decoder.
///
/// `sample_format` is the decoder's raw code; see [`SampleFormat::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_format: i32,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Audio output parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioParams {
    /// Byte rate of interleaved PCM in this format.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_format.bytes_per_sample() as u64 * self.channels as u64 * self.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_lengths() {
        let params = VideoParams {
            duration_ms: 10_000,
            pixel_format: 0,
            width: 1280,
            height: 720,
        };
        assert_eq!(params.luma_plane_len(), 921_600);
        assert_eq!(params.chroma_plane_len(), 230_400);
    }

    #[test]
    fn test_odd_dimensions_round_down() {
        let params = VideoParams {
            duration_ms: 0,
            pixel_format: 0,
            width: 5,
            height: 3,
        };
        assert_eq!(params.chroma_plane_len(), 2);
    }

    #[test]
    fn test_sample_format_codes() {
        assert_eq!(SampleFormat::from_code(0), Some(SampleFormat::U8));
        assert_eq!(SampleFormat::from_code(3), Some(SampleFormat::F32));
        assert_eq!(SampleFormat::from_code(9), None);
    }

    #[test]
    fn test_params_serialize_for_host() {
        let params = AudioParams {
            sample_format: SampleFormat::F32,
            channels: 1,
            sample_rate: 8_000,
        };
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["sample_format"], "F32");
        assert_eq!(json["sample_rate"], 8_000);
    }

    #[test]
    fn test_audio_byte_rate() {
        let params = AudioParams {
            sample_format: SampleFormat::S16,
            channels: 2,
            sample_rate: 48_000,
        };
        assert_eq!(params.bytes_per_second(), 192_000);
    }
}
