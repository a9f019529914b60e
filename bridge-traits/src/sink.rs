//! Presentation sinks.
//!
//! The player hands decoded video frames to a [`RenderSink`] and PCM to an
//! [`AudioSink`]. The audio sink's elapsed time is the master clock for A/V
//! synchronization.

use crate::{
    error::Result,
    media::AudioParams,
    platform::{PlatformSend, PlatformSendSync},
};

/// One YUV420 frame ready for upload.
#[derive(Debug, Clone, Copy)]
pub struct VideoPlanes<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub luma_len: usize,
    pub chroma_len: usize,
}

/// Presents video frames (GPU texture upload, window blit, file dump).
pub trait RenderSink: PlatformSendSync {
    fn render_frame(&self, frame: VideoPlanes<'_>) -> Result<()>;
}

/// Audio output device for one playback session.
pub trait AudioSink: PlatformSend {
    /// Queues interleaved PCM samples for playback.
    fn play(&mut self, samples: &[u8]) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Releases the device. The sink is not used again afterwards.
    fn destroy(&mut self) -> Result<()>;

    /// Seconds of playback time since the sink was created, excluding time
    /// spent paused. This is the master clock for A/V synchronization, so it
    /// must keep advancing while the sink is running even if no samples are
    /// queued.
    fn elapsed_time(&self) -> f64;
}

/// Creates audio sinks. Restarting audio after a seek creates a fresh sink,
/// which resets its clock to zero.
pub trait AudioSinkFactory: PlatformSendSync {
    fn create(&self, params: &AudioParams) -> Result<Box<dyn AudioSink>>;
}
