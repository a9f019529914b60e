//! Wall-clock audio output.
//!
//! Stand-in device for hosts without an audio backend. Samples are accepted
//! and counted, never played. The clock advances with real time while the
//! sink runs, so video sync behaves as if audio were audible.

use bridge_traits::{
    error::{BridgeError, Result},
    media::AudioParams,
    sink::{AudioSink, AudioSinkFactory},
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Creates [`WallClockAudioSink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClockAudioOutput;

impl WallClockAudioOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSinkFactory for WallClockAudioOutput {
    fn create(&self, params: &AudioParams) -> Result<Box<dyn AudioSink>> {
        if params.channels == 0 || params.sample_rate == 0 {
            return Err(BridgeError::OperationFailed(format!(
                "Unsupported audio layout: {} channels at {} Hz",
                params.channels, params.sample_rate
            )));
        }

        debug!(
            sample_format = ?params.sample_format,
            channels = params.channels,
            sample_rate = params.sample_rate,
            "Wall-clock audio sink created"
        );
        Ok(Box::new(WallClockAudioSink::new(*params)))
    }
}

#[derive(Debug)]
pub struct WallClockAudioSink {
    params: AudioParams,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    queued_bytes: u64,
    destroyed: bool,
}

impl WallClockAudioSink {
    pub fn new(params: AudioParams) -> Self {
        Self {
            params,
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
            queued_bytes: 0,
            destroyed: false,
        }
    }

    pub fn params(&self) -> &AudioParams {
        &self.params
    }

    /// Seconds of PCM handed to the sink so far.
    pub fn queued_seconds(&self) -> f64 {
        match self.params.bytes_per_second() {
            0 => 0.0,
            rate => self.queued_bytes as f64 / rate as f64,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(BridgeError::OperationFailed(
                "Audio sink already destroyed".to_string(),
            ));
        }
        Ok(())
    }
}

impl AudioSink for WallClockAudioSink {
    fn play(&mut self, samples: &[u8]) -> Result<()> {
        self.ensure_live()?;
        self.queued_bytes += samples.len() as u64;
        trace!(bytes = samples.len(), "Audio samples queued");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.ensure_live()?;
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.destroyed = true;
        Ok(())
    }

    fn elapsed_time(&self) -> f64 {
        let now = self.paused_at.unwrap_or_else(Instant::now);
        now.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
            .as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::media::SampleFormat;

    fn stereo() -> AudioParams {
        AudioParams {
            sample_format: SampleFormat::S16,
            channels: 2,
            sample_rate: 48_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_excludes_pauses() {
        let mut sink = WallClockAudioOutput::new().create(&stereo()).unwrap();

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert!((sink.elapsed_time() - 1.5).abs() < 1e-6);

        sink.pause().unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!((sink.elapsed_time() - 1.5).abs() < 1e-6);

        sink.resume().unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!((sink.elapsed_time() - 2.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_seconds() {
        let mut sink = WallClockAudioSink::new(stereo());
        sink.play(&vec![0u8; 192_000]).unwrap();
        assert_eq!(sink.queued_seconds(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_sink_rejects_samples() {
        let mut sink = WallClockAudioSink::new(stereo());
        sink.destroy().unwrap();
        assert!(sink.play(&[0u8; 4]).is_err());
        assert!(sink.destroy().is_ok());
    }

    #[test]
    fn test_rejects_empty_layout() {
        let params = AudioParams {
            channels: 0,
            ..stereo()
        };
        assert!(WallClockAudioOutput::new().create(&params).is_err());
    }
}
