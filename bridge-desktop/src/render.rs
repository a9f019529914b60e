//! Headless render sink.
//!
//! Validates and counts frames without presenting them. Useful for servers,
//! CLIs and tests that drive the player without a window.

use bridge_traits::{
    error::{BridgeError, Result},
    sink::{RenderSink, VideoPlanes},
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
pub struct HeadlessRenderSink {
    frames: AtomicU64,
    width: AtomicU32,
    height: AtomicU32,
}

impl HeadlessRenderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Size of the last accepted frame.
    pub fn last_dimensions(&self) -> Option<(u32, u32)> {
        match self.frames_rendered() {
            0 => None,
            _ => Some((
                self.width.load(Ordering::Relaxed),
                self.height.load(Ordering::Relaxed),
            )),
        }
    }
}

impl RenderSink for HeadlessRenderSink {
    fn render_frame(&self, frame: VideoPlanes<'_>) -> Result<()> {
        let expected = frame.luma_len + 2 * frame.chroma_len;
        if frame.pixels.len() < expected {
            return Err(BridgeError::OperationFailed(format!(
                "Frame holds {} bytes, {}x{} YUV420 needs {}",
                frame.pixels.len(),
                frame.width,
                frame.height,
                expected
            )));
        }

        self.width.store(frame.width, Ordering::Relaxed);
        self.height.store(frame.height, Ordering::Relaxed);
        let count = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(count, width = frame.width, height = frame.height, "Frame rendered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planes(pixels: &[u8]) -> VideoPlanes<'_> {
        VideoPlanes {
            pixels,
            width: 4,
            height: 2,
            luma_len: 8,
            chroma_len: 2,
        }
    }

    #[test]
    fn test_counts_frames() {
        let sink = HeadlessRenderSink::new();
        assert_eq!(sink.last_dimensions(), None);

        let pixels = [0u8; 12];
        sink.render_frame(planes(&pixels)).unwrap();
        sink.render_frame(planes(&pixels)).unwrap();

        assert_eq!(sink.frames_rendered(), 2);
        assert_eq!(sink.last_dimensions(), Some((4, 2)));
    }

    #[test]
    fn test_rejects_short_frame() {
        let sink = HeadlessRenderSink::new();
        assert!(sink.render_frame(planes(&[0u8; 11])).is_err());
        assert_eq!(sink.frames_rendered(), 0);
    }
}
