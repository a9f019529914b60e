//! # Seek Coordinator
//!
//! Bookkeeping for the two gates a seek must clear before playback resumes.
//!
//! ```text
//!   seek_to(ms) ──> decoder SeekTo ──> NeedData / SeekResult   (gate A)
//!               └─> chunks of the new epoch accumulate          (gate B)
//!
//!   gate A && gate B ──> one deferred resume ──> first frame ──> Seeked
//! ```
//!
//! Every `seek_to` bumps an outstanding-acknowledgment counter. Only the
//! acknowledgment that brings the counter back to zero belongs to the latest
//! seek; earlier ones are consumed silently, which is what makes two seeks in
//! quick succession resume once.

/// State of the seek in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekContext {
    pub target_ms: u64,
    /// Bytes of accepted chunks since the seek
    pub received_bytes: u64,
    /// Gate A: decoder acknowledged and said where data should come from
    pub decoder_acknowledged: bool,
    /// Gate B: enough bytes arrived
    pub bytes_ready: bool,
    pub resume_scheduled: bool,
}

impl SeekContext {
    fn new(target_ms: u64) -> Self {
        Self {
            target_ms,
            received_bytes: 0,
            decoder_acknowledged: false,
            bytes_ready: false,
            resume_scheduled: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct SeekCoordinator {
    context: Option<SeekContext>,
    outstanding_acks: u32,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a seek, replacing any seek in progress.
    pub fn begin(&mut self, target_ms: u64) {
        self.context = Some(SeekContext::new(target_ms));
        self.outstanding_acks += 1;
    }

    pub fn is_seeking(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&SeekContext> {
        self.context.as_ref()
    }

    pub fn outstanding_acks(&self) -> u32 {
        self.outstanding_acks
    }

    /// Consumes one decoder acknowledgment. Returns `true` only for the one
    /// answering the latest seek.
    pub fn take_ack(&mut self) -> bool {
        if self.outstanding_acks == 0 || self.context.is_none() {
            return false;
        }
        self.outstanding_acks -= 1;
        self.outstanding_acks == 0
    }

    /// Gate A cleared.
    pub fn acknowledge(&mut self) {
        if let Some(context) = self.context.as_mut() {
            context.decoder_acknowledged = true;
        }
    }

    /// Both gates cleared at once (decoder already holds everything needed).
    pub fn satisfy_all(&mut self) {
        if let Some(context) = self.context.as_mut() {
            context.decoder_acknowledged = true;
            context.bytes_ready = true;
        }
    }

    /// Counts bytes toward gate B. `wait_len` is the amount required, already
    /// capped by the bytes left in the file.
    pub fn record_bytes(&mut self, len: u64, wait_len: u64) {
        if let Some(context) = self.context.as_mut() {
            context.received_bytes += len;
            if context.received_bytes >= wait_len {
                context.bytes_ready = true;
            }
        }
    }

    /// Returns `true` exactly once, when both gates are clear.
    pub fn take_resume(&mut self) -> bool {
        match self.context.as_mut() {
            Some(context)
                if context.decoder_acknowledged
                    && context.bytes_ready
                    && !context.resume_scheduled =>
            {
                context.resume_scheduled = true;
                true
            }
            _ => false,
        }
    }

    pub fn resume_scheduled(&self) -> bool {
        self.context
            .as_ref()
            .map(|c| c.resume_scheduled)
            .unwrap_or(false)
    }

    /// Ends the seek. Returns the finished context, if one was active.
    pub fn finish(&mut self) -> Option<SeekContext> {
        self.outstanding_acks = 0;
        self.context.take()
    }
}
