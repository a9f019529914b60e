//! Audio-master A/V synchronization.
//!
//! `audioClock = audioElapsed + beginTimeOffset`. The offset is the seek
//! target, or in stream mode the timestamp of the first presented audio frame.
//! Audio frames are always due; a video frame is due once its timestamp is not
//! ahead of the audio clock. Frames that are not due stay queued, there is no
//! drop-frame catch-up.

#[derive(Debug, Clone)]
pub struct AvSync {
    begin_time_offset: f64,
    first_audio_pending: bool,
}

impl Default for AvSync {
    fn default() -> Self {
        Self {
            begin_time_offset: 0.0,
            first_audio_pending: true,
        }
    }
}

impl AvSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_time_offset(&self) -> f64 {
        self.begin_time_offset
    }

    pub fn set_begin_time_offset(&mut self, seconds: f64) {
        self.begin_time_offset = seconds;
    }

    /// Stream mode: the first presented audio frame defines time zero.
    /// Returns `true` when this call adopted the timestamp.
    pub fn adopt_first_audio(&mut self, timestamp: f64) -> bool {
        if !self.first_audio_pending {
            return false;
        }
        self.first_audio_pending = false;
        self.begin_time_offset = timestamp;
        true
    }

    pub fn awaiting_first_audio(&self) -> bool {
        self.first_audio_pending
    }

    pub fn audio_clock(&self, audio_elapsed: f64) -> f64 {
        audio_elapsed + self.begin_time_offset
    }

    /// Whether a video frame may be presented. `clock` of `None` means the
    /// media has no audio stream, which leaves video ungated.
    pub fn is_video_due(&self, timestamp: f64, clock: Option<f64>) -> bool {
        match clock {
            Some(clock) => timestamp - clock <= 0.0,
            None => true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
