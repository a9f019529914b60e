//! # Playback Engine
//!
//! The player state machine. Every command, worker response, timer tick and
//! deferred action goes through [`PlaybackEngine::handle`], which mutates the
//! engine and returns the side effects to perform. The engine never touches a
//! worker, sink or timer itself; the driver in [`crate::player`] does.
//!
//! ## Overview
//!
//! ```text
//!   Input::Command ─┐
//!   Input::Transport┤                       ┌─> Effect::Transport / Decoder
//!   Input::Decoder ─┼──> PlaybackEngine ────┼─> Effect::RenderVideo / *Audio
//!   Input::Tick ────┤      (one input        ├─> Effect::Emit(PlayerEvent)
//!   Input::Deferred ┘       at a time)       └─> Effect::StartTimer / Defer
//! ```
//!
//! Inputs are handled strictly one at a time, so the transitions below never
//! interleave:
//!
//! ```text
//!          play                 pause / seek / stall
//!   Idle ────────> Playing ───────────────────────────> Pausing
//!    ▲               ▲  ◄──────── resume / refill ──────────┘
//!    └─── stop ──────┴──────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut engine = PlaybackEngine::new(PlayerConfig::default(), Capabilities::all());
//! let outcome = engine.handle(Input::Command(Command::Play(PlayRequest::new(url))));
//! assert!(outcome.result.unwrap().success);
//! for effect in outcome.effects {
//!     // dispatch to workers, sinks, timers and subscribers
//! }
//! ```

use bridge_traits::{
    AudioParams, AudioStreamInfo, DecoderRequest, DecoderResponse, TransportRequest,
    TransportResponse, VideoParams, NEED_DATA_BUFFERED, STATUS_OK,
};
use bytes::Bytes;
use core_runtime::events::PlayerEvent;
use core_runtime::logging::strip_url_query;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::av_sync::AvSync;
use crate::config::{PlayRequest, PlayerConfig};
use crate::decode::{audio_params, DecodeSession};
use crate::error::{CommandResult, PlaybackError, Result};
use crate::frame_buffer::FrameBuffer;
use crate::seek::{SeekContext, SeekCoordinator};
use crate::transport::{ChunkVerdict, NextChunk, TransportCoordinator};
use crate::types::{DecoderState, FileDescriptor, Frame, FrameKind, PlayerSnapshot, PlayerState};

// ============================================================================
// Inputs
// ============================================================================

/// Repeating timers owned by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Download pacing
    Download,
    /// `timeupdate` polling
    TrackPoll,
    /// Presentation cadence
    Display,
}

/// Work scheduled to run right after the current input, before anything
/// else is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    DownloadNextChunk,
    ResumeAfterSeek,
}

/// User-facing player commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(PlayRequest),
    Pause,
    Resume,
    Stop,
    SeekTo(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    /// Host visibility changed.
    Visibility(bool),
    Transport(TransportResponse),
    Decoder(DecoderResponse),
    /// A timer fired. `audio_elapsed` is the audio sink's elapsed time when
    /// one exists.
    Tick {
        kind: TimerKind,
        audio_elapsed: Option<f64>,
    },
    Deferred(DeferredAction),
}

// ============================================================================
// Effects
// ============================================================================

/// Side effects requested by the engine, in the order they must happen.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Transport(TransportRequest),
    Decoder(DecoderRequest),
    RenderVideo { payload: Bytes, params: VideoParams },
    PlayAudio(Bytes),
    CreateAudio(AudioParams),
    PauseAudio,
    ResumeAudio,
    /// Recreate the audio sink so its elapsed time starts from zero.
    RestartAudio,
    DestroyAudio,
    Emit(PlayerEvent),
    StartTimer { kind: TimerKind, period: Duration },
    CancelTimer(TimerKind),
    Defer(DeferredAction),
}

/// Result of handling one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Set for commands only.
    pub result: Option<CommandResult>,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub fn events(&self) -> impl Iterator<Item = &PlayerEvent> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Emit(event) => Some(event),
            _ => None,
        })
    }

    pub fn decoder_requests(&self) -> impl Iterator<Item = &DecoderRequest> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Decoder(request) => Some(request),
            _ => None,
        })
    }

    pub fn transport_requests(&self) -> impl Iterator<Item = &TransportRequest> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Transport(request) => Some(request),
            _ => None,
        })
    }
}

/// Which collaborators are configured. Checked by `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub render_target: bool,
    pub transport: bool,
    pub decoder: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            render_target: true,
            transport: true,
            decoder: true,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct PlaybackEngine {
    config: PlayerConfig,
    capabilities: Capabilities,

    state: PlayerState,
    streaming: bool,
    wait_header_length: u64,
    last_request: Option<PlayRequest>,

    transport: TransportCoordinator,
    decoder: DecodeSession,
    frames: FrameBuffer,
    sync: AvSync,
    seek: SeekCoordinator,

    /// Waiting for the frame buffer to fill; presentation is suspended.
    buffering: bool,
    /// Pausing because the frame queue ran dry, not because of a command.
    stalled: bool,
    /// Pausing because the host was hidden.
    hidden_pause: bool,
    loading_visible: bool,
    audio_active: bool,

    current_time: f64,
    /// Timestamp of the last presented video frame; the clock of media
    /// without a running audio sink.
    video_time: Option<f64>,
    duration_ms: u64,
    video: Option<VideoParams>,
    audio: Option<AudioParams>,

    effects: Vec<Effect>,
}

impl PlaybackEngine {
    pub fn new(config: PlayerConfig, capabilities: Capabilities) -> Self {
        Self {
            transport: TransportCoordinator::new(&config),
            decoder: DecodeSession::new(config.decode_interval_ms),
            frames: FrameBuffer::new(config.max_buffer_time_length),
            sync: AvSync::new(),
            seek: SeekCoordinator::new(),
            state: PlayerState::Idle,
            streaming: config.streaming,
            wait_header_length: config.wait_header_length,
            last_request: None,
            buffering: false,
            stalled: false,
            hidden_pause: false,
            loading_visible: false,
            audio_active: false,
            current_time: 0.0,
            video_time: None,
            duration_ms: 0,
            video: None,
            audio: None,
            effects: Vec::new(),
            config,
            capabilities,
        }
    }

    /// Handles one input and returns what must happen as a consequence.
    pub fn handle(&mut self, input: Input) -> Outcome {
        let result = match input {
            Input::Command(command) => Some(CommandResult::from(self.command(command))),
            Input::Visibility(visible) => {
                self.on_visibility(visible);
                None
            }
            Input::Transport(response) => {
                self.on_transport(response);
                None
            }
            Input::Decoder(response) => {
                self.on_decoder(response);
                None
            }
            Input::Tick {
                kind,
                audio_elapsed,
            } => {
                self.on_tick(kind, audio_elapsed);
                None
            }
            Input::Deferred(action) => {
                self.on_deferred(action);
                None
            }
        };

        Outcome {
            result,
            effects: std::mem::take(&mut self.effects),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn decoder_state(&self) -> DecoderState {
        self.decoder.state()
    }

    pub fn is_decoding(&self) -> bool {
        self.decoder.is_decoding()
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn epoch(&self) -> u64 {
        self.transport.epoch()
    }

    pub fn file(&self) -> Option<&FileDescriptor> {
        self.transport.file()
    }

    pub fn frames(&self) -> &FrameBuffer {
        &self.frames
    }

    pub fn seek_context(&self) -> Option<&SeekContext> {
        self.seek.context()
    }

    pub fn begin_time_offset(&self) -> f64 {
        self.sync.begin_time_offset()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            player_state: self.state,
            decoder_state: self.decoder.state(),
            buffering: self.buffering,
            seeking: self.seek.is_seeking(),
            current_time: self.current_time,
            duration_ms: self.duration_ms,
            buffered_frames: self.frames.len(),
            buffered_span: self.frames.span(),
            video: self.video,
            audio: self.audio,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Play(request) => self.play(request),
            Command::Pause => self.pause(),
            Command::Resume => self.resume(false),
            Command::Stop => self.stop(),
            Command::SeekTo(ms) => self.seek_to(ms),
        }
    }

    fn play(&mut self, request: PlayRequest) -> Result<()> {
        match self.state {
            PlayerState::Pausing => return self.resume(false),
            PlayerState::Playing => return Ok(()),
            PlayerState::Idle => {}
        }

        if request.url.is_empty() {
            return Err(PlaybackError::InvalidUrl);
        }
        if !self.capabilities.render_target {
            return Err(PlaybackError::RenderTargetMissing);
        }
        if !self.capabilities.transport {
            return Err(PlaybackError::TransportNotInitialized);
        }
        if !self.capabilities.decoder {
            return Err(PlaybackError::DecoderNotInitialized);
        }

        self.streaming = request.streaming.unwrap_or(self.config.streaming);
        self.wait_header_length = request
            .wait_header_length
            .unwrap_or(self.config.wait_header_length);

        let file = FileDescriptor::new(request.url.clone(), self.config.chunk_size);
        info!(
            url = strip_url_query(&file.url),
            protocol = ?file.protocol,
            streaming = self.streaming,
            wait_header_length = self.wait_header_length,
            "Play"
        );
        let protocol = file.protocol;
        self.transport.begin(file);

        self.state = PlayerState::Playing;
        self.start_timer(TimerKind::TrackPoll, self.config.track_poll_interval());
        self.start_timer(TimerKind::Display, self.config.display_interval());

        if self.streaming {
            self.effects.push(Effect::Transport(TransportRequest::OpenStream {
                url: request.url.clone(),
                sequence: self.transport.epoch(),
            }));
            let init = self.decoder.init(None, self.config.chunk_size);
            self.effects.push(Effect::Decoder(init));
        } else {
            self.effects.push(Effect::Transport(TransportRequest::GetFileInfo {
                url: request.url.clone(),
                protocol,
            }));
        }

        self.buffering = true;
        self.show_loading();
        self.emit(PlayerEvent::Playing);
        self.last_request = Some(request);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.streaming {
            return self.pause_stream();
        }

        if self.state != PlayerState::Playing {
            if self.stalled {
                // A stall already paused output; just make it stick.
                info!("Pause while buffering");
                self.stalled = false;
                self.buffering = false;
                self.hide_loading();
                self.pause_decoding();
                self.emit(PlayerEvent::Pause);
                return Ok(());
            }
            return Err(PlaybackError::NotPlaying);
        }

        info!("Pause");
        self.state = PlayerState::Pausing;
        if self.audio_active {
            self.effects.push(Effect::PauseAudio);
        }
        self.pause_decoding();
        self.cancel_timer(TimerKind::TrackPoll);
        self.emit(PlayerEvent::Pause);
        Ok(())
    }

    fn pause_stream(&mut self) -> Result<()> {
        if self.state != PlayerState::Playing {
            return Err(PlaybackError::NotPlaying);
        }
        info!("Pause stream");
        self.end_playback();
        self.emit(PlayerEvent::Pause);
        Ok(())
    }

    fn resume(&mut self, from_seek: bool) -> Result<()> {
        if self.streaming {
            return self.resume_stream();
        }

        if self.state != PlayerState::Pausing {
            return Err(PlaybackError::NotPausing);
        }

        info!(from_seek, "Resume");
        if !from_seek && self.audio_active {
            self.effects.push(Effect::ResumeAudio);
        }
        self.state = PlayerState::Playing;
        self.stalled = false;
        self.hidden_pause = false;

        if self.decoder.state() == DecoderState::Ready
            && !self.decoder.is_decoding()
            && (from_seek || self.frames.has_room())
        {
            self.start_decoding();
        }

        if !self.seek.is_seeking() {
            self.start_timer(TimerKind::TrackPoll, self.config.track_poll_interval());
            self.ensure_pacing();
        }

        self.emit(PlayerEvent::Play);
        self.emit(PlayerEvent::Playing);
        Ok(())
    }

    fn resume_stream(&mut self) -> Result<()> {
        if self.state != PlayerState::Idle {
            return Err(PlaybackError::NotPausing);
        }
        let Some(request) = self.last_request.clone() else {
            return Err(PlaybackError::NotPausing);
        };
        info!("Resume stream");
        self.play(request)?;
        self.emit(PlayerEvent::Play);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.end_playback();
        Ok(())
    }

    /// Tears the session down and emits `ended`. No-op when idle.
    fn end_playback(&mut self) {
        if self.state == PlayerState::Idle {
            return;
        }

        info!("Stop");
        self.cancel_timer(TimerKind::Download);
        self.cancel_timer(TimerKind::TrackPoll);
        self.cancel_timer(TimerKind::Display);
        self.hide_loading();

        self.transport.reset();
        self.effects.push(Effect::Transport(TransportRequest::Close));

        self.state = PlayerState::Idle;
        self.buffering = false;
        self.stalled = false;
        self.hidden_pause = false;
        self.current_time = 0.0;
        self.video_time = None;
        self.frames.clear();
        self.sync.reset();
        self.seek.finish();

        if self.audio_active {
            self.audio_active = false;
            self.effects.push(Effect::DestroyAudio);
        }

        for request in self.decoder.teardown() {
            self.effects.push(Effect::Decoder(request));
        }

        self.emit(PlayerEvent::Ended);
    }

    fn seek_to(&mut self, ms: u64) -> Result<()> {
        if self.streaming || self.state == PlayerState::Idle {
            return Err(PlaybackError::SeekNotSupported);
        }

        info!(target_ms = ms, state = %self.state, "Seek");
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Pausing;
            self.pause_decoding();
            self.cancel_timer(TimerKind::TrackPoll);
            self.emit(PlayerEvent::Pause);
        } else {
            self.pause_decoding();
        }
        self.stalled = false;

        self.cancel_timer(TimerKind::Download);
        self.transport.stop_pacing();
        self.transport.advance_epoch();
        self.frames.clear();
        self.video_time = None;

        let request = self.decoder.seek(ms);
        self.effects.push(Effect::Decoder(request));
        self.sync.set_begin_time_offset(ms as f64 / 1000.0);
        self.seek.begin(ms);

        self.buffering = true;
        self.show_loading();
        self.emit(PlayerEvent::Seeking { target_ms: ms });
        Ok(())
    }

    fn on_visibility(&mut self, visible: bool) {
        if visible {
            if !self.hidden_pause {
                return;
            }
            self.hidden_pause = false;
            if let Err(err) = self.resume(false) {
                debug!(error = %err, "Ignoring visibility resume");
            }
        } else {
            match self.pause() {
                Ok(()) => self.hidden_pause = true,
                Err(err) => debug!(error = %err, "Ignoring visibility pause"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transport responses
    // ------------------------------------------------------------------------

    fn on_transport(&mut self, response: TransportResponse) {
        if self.state == PlayerState::Idle {
            trace!(sequence = ?response.sequence(), "Dropping transport response while idle");
            return;
        }

        match response {
            TransportResponse::FileInfo { status, size } => self.on_file_info(status, size),
            TransportResponse::ChunkData {
                data,
                start,
                end,
                sequence,
            } => self.on_chunk(data, start, end, sequence),
            TransportResponse::StreamData { data, sequence } => self.on_stream_data(data, sequence),
            TransportResponse::StreamEnded { sequence } => {
                info!(sequence, "Stream ended");
            }
            TransportResponse::Failed {
                sequence,
                status,
                message,
            } => {
                if !self.transport.fail_request(sequence) {
                    trace!(sequence, "Dropping stale failure");
                    return;
                }
                warn!(sequence, status, %message, "Transport request failed");
                self.emit(PlayerEvent::Error {
                    error_code: -1,
                    status: i32::from(status),
                    message,
                });
            }
        }
    }

    fn on_file_info(&mut self, status: u16, size: i64) {
        if self.streaming {
            return;
        }

        if status != STATUS_OK {
            self.report(&PlaybackError::MetadataFailed { status }, status);
            return;
        }
        let Ok(size) = u64::try_from(size) else {
            self.report(&PlaybackError::MetadataFailed { status }, status);
            return;
        };

        info!(size, "File info");
        self.transport.set_total_size(size);
        let init = self.decoder.init(Some(size), self.config.chunk_size);
        self.effects.push(Effect::Decoder(init));
    }

    fn on_chunk(&mut self, data: Bytes, start: u64, end: u64, sequence: u64) {
        let remaining_before = self.transport.remaining();
        let len = match self.transport.accept_chunk(sequence, start, end) {
            ChunkVerdict::Stale => {
                debug!(sequence, epoch = self.transport.epoch(), "Dropping stale chunk");
                return;
            }
            ChunkVerdict::Accepted { len } => len,
        };
        trace!(sequence, start, end, "Chunk accepted");

        if self.state == PlayerState::Pausing && self.seek.is_seeking() {
            let wait_len = remaining_before.min(self.transport.plan().seek_wait_len);
            self.seek.record_bytes(len, wait_len);
            self.schedule_seek_resume();
        }

        self.effects.push(Effect::Decoder(DecoderRequest::FeedData(data)));

        match self.decoder.state() {
            DecoderState::Idle => {
                let (fed, total_size) = self
                    .transport
                    .file()
                    .map(|f| (f.download_offset, f.total_size))
                    .unwrap_or((0, None));
                if self.decoder.should_open(fed, total_size, self.wait_header_length) {
                    info!(fed, "Header buffered, opening decoder");
                    let open = self.decoder.open();
                    self.effects.push(Effect::Decoder(open));
                }
                self.download_next_chunk();
            }
            DecoderState::Initializing => self.download_next_chunk(),
            DecoderState::Ready | DecoderState::Finished => {}
        }

        if self.decoder.is_urgent() {
            self.effects
                .push(Effect::Defer(DeferredAction::DownloadNextChunk));
        }
    }

    fn on_stream_data(&mut self, data: Bytes, sequence: u64) {
        if self.state != PlayerState::Playing {
            trace!(sequence, "Dropping stream data while not playing");
            return;
        }
        if sequence != self.transport.epoch() {
            trace!(sequence, "Dropping stale stream data");
            return;
        }

        for piece in self.transport.split_stream(data) {
            self.effects.push(Effect::Decoder(DecoderRequest::FeedData(piece)));
        }

        if self.decoder.state() == DecoderState::Idle
            && self.transport.stream_received() >= self.wait_header_length
        {
            info!(
                received = self.transport.stream_received(),
                "Stream header buffered, opening decoder"
            );
            let open = self.decoder.open();
            self.effects.push(Effect::Decoder(open));
        }
    }

    // ------------------------------------------------------------------------
    // Decoder responses
    // ------------------------------------------------------------------------

    fn on_decoder(&mut self, response: DecoderResponse) {
        if self.state == PlayerState::Idle {
            trace!("Dropping decoder response while idle");
            return;
        }

        match response {
            DecoderResponse::InitResult { code } => {
                if code != 0 {
                    self.report(&PlaybackError::DecoderFailed { stage: "init", code }, 0);
                    return;
                }
                debug!("Decoder initialized");
                if !self.streaming {
                    self.download_next_chunk();
                }
            }
            DecoderResponse::OpenResult { code, video, audio } => {
                self.on_open(code, video, audio)
            }
            DecoderResponse::VideoFrame { timestamp, data } => {
                self.buffer_frame(FrameKind::Video, timestamp, data)
            }
            DecoderResponse::AudioFrame { timestamp, data } => {
                self.buffer_frame(FrameKind::Audio, timestamp, data)
            }
            DecoderResponse::DecodeFinished => {
                info!(buffered = self.frames.len(), "Decoding finished");
                let request = self.decoder.finish();
                self.effects.push(Effect::Decoder(request));
                if self.buffering {
                    self.stop_buffering();
                }
                if self.state == PlayerState::Playing && self.frames.is_empty() {
                    info!("Decoder finished with nothing left to present");
                    self.end_playback();
                }
            }
            DecoderResponse::NeedData { offset, available } => {
                self.on_need_data(offset, available)
            }
            DecoderResponse::SeekResult { code } => self.on_seek_result(code),
            DecoderResponse::FatalError { code, message } => {
                let message = if message.is_empty() {
                    "decode error".to_string()
                } else {
                    message
                };
                warn!(code, %message, "Decoder error");
                self.emit(PlayerEvent::Error {
                    error_code: code,
                    status: 0,
                    message,
                });
            }
        }
    }

    fn on_open(
        &mut self,
        code: i32,
        video: Option<VideoParams>,
        audio: Option<AudioStreamInfo>,
    ) {
        if code != 0 {
            self.report(&PlaybackError::DecoderFailed { stage: "open", code }, 0);
            return;
        }

        if let Some(params) = video {
            info!(
                duration_ms = params.duration_ms,
                width = params.width,
                height = params.height,
                pixel_format = params.pixel_format,
                "Video parameters"
            );
            self.duration_ms = params.duration_ms;
            self.transport.apply_duration(params.duration_ms, &self.config);
        }
        self.video = video;

        match audio {
            Some(info) => {
                let params = audio_params(&info);
                info!(
                    sample_format = ?params.sample_format,
                    channels = params.channels,
                    sample_rate = params.sample_rate,
                    "Audio parameters"
                );
                self.audio = Some(params);
                self.audio_active = true;
                self.effects.push(Effect::CreateAudio(params));
            }
            None => {
                self.audio = None;
                self.audio_active = false;
            }
        }

        self.emit(PlayerEvent::DurationChange {
            duration_ms: self.duration_ms,
        });

        self.decoder.mark_ready();
        if !self.streaming {
            self.start_pacing();
        }
        self.start_decoding();
    }

    fn buffer_frame(&mut self, kind: FrameKind, timestamp: f64, data: Bytes) {
        if !self.decoder.is_decoding() {
            trace!(?kind, timestamp, "Dropping frame decoded while paused");
            return;
        }

        self.frames.push(kind, timestamp, data);

        if self.frames.is_full() || self.decoder.state() == DecoderState::Finished {
            self.pause_decoding();
            if self.buffering {
                self.stop_buffering();
            }
        }
    }

    fn on_need_data(&mut self, offset: i64, available: u64) {
        if !self.seek.take_ack() {
            trace!(offset, "Ignoring data request of a superseded seek");
            return;
        }

        info!(offset, available, "Decoder needs data after seek");
        if offset == NEED_DATA_BUFFERED {
            if available >= self.transport.remaining() {
                self.seek.satisfy_all();
            } else {
                self.start_pacing();
                self.seek.acknowledge();
            }
        } else {
            match u64::try_from(offset) {
                Ok(offset) if self.transport.seek_to_offset(offset) => {
                    debug!(offset, "Download position moved");
                }
                _ => warn!(offset, "Ignoring invalid seek offset"),
            }
            self.start_pacing();
            self.seek.acknowledge();
        }

        self.schedule_seek_resume();
    }

    fn on_seek_result(&mut self, code: i32) {
        if code == 0 {
            return;
        }
        if !self.seek.take_ack() {
            trace!(code, "Ignoring result of a superseded seek");
            return;
        }

        self.report(&PlaybackError::DecoderFailed { stage: "seek", code }, 0);
        self.seek.finish();
        self.decoder.set_urgent(false);
        self.buffering = false;
        self.hide_loading();
        self.emit(PlayerEvent::Seeked);
    }

    // ------------------------------------------------------------------------
    // Timers and deferred work
    // ------------------------------------------------------------------------

    fn on_tick(&mut self, kind: TimerKind, audio_elapsed: Option<f64>) {
        if self.state == PlayerState::Idle {
            return;
        }

        match kind {
            TimerKind::Download => {
                if self.transport.is_pacing() {
                    self.download_next_chunk();
                }
            }
            TimerKind::TrackPoll => self.update_track_time(audio_elapsed),
            TimerKind::Display => self.display_cycle(audio_elapsed),
        }
    }

    fn on_deferred(&mut self, action: DeferredAction) {
        match action {
            DeferredAction::DownloadNextChunk => {
                if self.state != PlayerState::Idle {
                    self.download_next_chunk();
                }
            }
            DeferredAction::ResumeAfterSeek => {
                if self.seek.resume_scheduled() && self.state == PlayerState::Pausing {
                    if let Err(err) = self.resume(true) {
                        warn!(error = %err, "Resume after seek failed");
                    }
                }
            }
        }
    }

    fn update_track_time(&mut self, audio_elapsed: Option<f64>) {
        if self.state != PlayerState::Playing {
            return;
        }
        let position = if self.audio_active {
            audio_elapsed.map(|elapsed| self.sync.audio_clock(elapsed))
        } else {
            self.video_time
        };
        let Some(position) = position else {
            return;
        };

        self.current_time = position;
        self.emit(PlayerEvent::TimeUpdate {
            current_time: self.current_time,
        });

        if !self.streaming
            && self.duration_ms > 0
            && self.current_time * 1000.0 > self.duration_ms as f64
        {
            info!(current_time = self.current_time, "Reached end of media");
            self.end_playback();
        }
    }

    fn display_cycle(&mut self, audio_elapsed: Option<f64>) {
        if self.state != PlayerState::Playing || self.buffering {
            return;
        }
        if self.frames.is_empty() {
            if self.decoder.state() == DecoderState::Finished {
                info!("All frames presented");
                self.end_playback();
            }
            return;
        }

        let mut elapsed = audio_elapsed;
        for _ in 0..self.config.frames_per_cycle {
            let Some(head) = self.frames.peek() else {
                break;
            };
            let (kind, timestamp) = (head.kind, head.timestamp);

            if self.seek.is_seeking() && self.complete_seek() {
                elapsed = elapsed.map(|_| 0.0);
            }

            let due = match kind {
                FrameKind::Audio => {
                    if self.streaming && self.sync.adopt_first_audio(timestamp) {
                        debug!(timestamp, "Stream time base adopted");
                    }
                    true
                }
                FrameKind::Video => {
                    // No clock before the stream time base exists or
                    // without a running audio sink.
                    let gated = self.audio_active
                        && !(self.streaming && self.sync.awaiting_first_audio());
                    let clock = elapsed
                        .filter(|_| gated)
                        .map(|elapsed| self.sync.audio_clock(elapsed));
                    self.sync.is_video_due(timestamp, clock)
                }
            };
            if !due {
                break;
            }

            if let Some(frame) = self.frames.pop() {
                self.present(frame);
            }
        }

        if self.decoder.state() == DecoderState::Ready
            && !self.decoder.is_decoding()
            && self.frames.has_room()
        {
            self.start_decoding();
        }

        if self.frames.is_empty() {
            if self.decoder.state() == DecoderState::Finished {
                info!("All frames presented");
                self.end_playback();
            } else {
                self.start_stall();
            }
        }
    }

    fn present(&mut self, frame: Frame) {
        match frame.kind {
            FrameKind::Audio => {
                if self.audio_active {
                    self.effects.push(Effect::PlayAudio(frame.payload));
                }
            }
            FrameKind::Video => match self.video {
                Some(params) => {
                    self.video_time = Some(frame.timestamp);
                    self.effects.push(Effect::RenderVideo {
                        payload: frame.payload,
                        params,
                    });
                }
                None => warn!(timestamp = frame.timestamp, "Video frame without video parameters"),
            },
        }
    }

    /// First frame presented after a seek. Returns `true` when the audio
    /// sink was restarted.
    fn complete_seek(&mut self) -> bool {
        let Some(context) = self.seek.finish() else {
            return false;
        };

        info!(target_ms = context.target_ms, "Seek completed");
        let restarted = self.audio_active;
        if restarted {
            self.effects.push(Effect::RestartAudio);
        }
        self.start_timer(TimerKind::TrackPoll, self.config.track_poll_interval());
        self.hide_loading();
        self.decoder.set_urgent(false);
        self.emit(PlayerEvent::Seeked);
        restarted
    }

    fn start_stall(&mut self) {
        info!("Frame queue drained, buffering");
        self.state = PlayerState::Pausing;
        self.stalled = true;
        self.buffering = true;
        if self.audio_active {
            self.effects.push(Effect::PauseAudio);
        }
        self.cancel_timer(TimerKind::TrackPoll);
        self.show_loading();

        if self.decoder.state() == DecoderState::Ready && !self.decoder.is_decoding() {
            self.start_decoding();
        }
    }

    fn stop_buffering(&mut self) {
        self.buffering = false;
        self.hide_loading();

        if self.stalled {
            info!("Buffer refilled");
            self.stalled = false;
            self.state = PlayerState::Playing;
            if self.audio_active {
                self.effects.push(Effect::ResumeAudio);
            }
            self.start_timer(TimerKind::TrackPoll, self.config.track_poll_interval());
            self.emit(PlayerEvent::Playing);
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn download_next_chunk(&mut self) {
        if self.streaming {
            return;
        }

        match self.transport.next_request() {
            NextChunk::Request(request) => {
                let Some(url) = self.transport.file().map(|f| f.url.clone()) else {
                    return;
                };
                trace!(
                    sequence = request.sequence,
                    start = request.start,
                    end = request.end,
                    "Requesting chunk"
                );
                self.effects
                    .push(Effect::Transport(request.to_transport(&url)));
            }
            NextChunk::EndOfFile => {
                self.cancel_timer(TimerKind::Download);
                self.emit(PlayerEvent::CanPlayThrough);
            }
            NextChunk::Complete => self.cancel_timer(TimerKind::Download),
            NextChunk::Idle => {}
        }
    }

    fn start_pacing(&mut self) {
        let epoch = self.transport.start_pacing();
        let period = self.transport.plan().chunk_interval;
        debug!(epoch, period_ms = period.as_millis() as u64, "Pacing downloads");
        self.start_timer(TimerKind::Download, period);
    }

    /// Restarts pacing that a seek or end of file left stopped.
    fn ensure_pacing(&mut self) {
        if !self.streaming
            && !self.transport.is_pacing()
            && self.decoder.state() == DecoderState::Ready
            && !self.transport.is_complete()
        {
            self.start_pacing();
        }
    }

    fn schedule_seek_resume(&mut self) {
        if self.seek.take_resume() {
            debug!("Seek gates cleared");
            self.effects.push(Effect::Defer(DeferredAction::ResumeAfterSeek));
        }
    }

    fn start_decoding(&mut self) {
        let request = self.decoder.start_decoding();
        self.effects.push(Effect::Decoder(request));
    }

    fn pause_decoding(&mut self) {
        if self.decoder.is_decoding() {
            let request = self.decoder.pause_decoding();
            self.effects.push(Effect::Decoder(request));
        }
    }

    fn start_timer(&mut self, kind: TimerKind, period: Duration) {
        self.effects.push(Effect::StartTimer { kind, period });
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        self.effects.push(Effect::CancelTimer(kind));
    }

    fn show_loading(&mut self) {
        if !self.loading_visible {
            self.loading_visible = true;
            self.emit(PlayerEvent::Loading { visible: true });
        }
    }

    fn hide_loading(&mut self) {
        if self.loading_visible {
            self.loading_visible = false;
            self.emit(PlayerEvent::Loading { visible: false });
        }
    }

    fn report(&mut self, err: &PlaybackError, status: u16) {
        warn!(code = err.code(), status, error = %err, "Playback error");
        self.emit(PlayerEvent::Error {
            error_code: err.code(),
            status: i32::from(status),
            message: err.to_string(),
        });
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.effects.push(Effect::Emit(event));
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("state", &self.state)
            .field("decoder", &self.decoder.state())
            .field("epoch", &self.transport.epoch())
            .field("buffered_frames", &self.frames.len())
            .field("seeking", &self.seek.is_seeking())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://media.example/clip.mp4?token=secret";

    fn engine() -> PlaybackEngine {
        PlaybackEngine::new(PlayerConfig::default(), Capabilities::all())
    }

    fn play(engine: &mut PlaybackEngine) -> Outcome {
        engine.handle(Input::Command(Command::Play(PlayRequest::new(URL))))
    }

    #[test]
    fn test_play_preconditions() {
        let mut engine = engine();
        let outcome = engine.handle(Input::Command(Command::Play(PlayRequest::new(""))));
        assert_eq!(outcome.result.unwrap().code, -1);
        assert!(outcome.effects.is_empty());

        for (capabilities, code) in [
            (
                Capabilities {
                    render_target: false,
                    ..Capabilities::all()
                },
                -2,
            ),
            (
                Capabilities {
                    transport: false,
                    ..Capabilities::all()
                },
                -3,
            ),
            (
                Capabilities {
                    decoder: false,
                    ..Capabilities::all()
                },
                -4,
            ),
        ] {
            let mut engine = PlaybackEngine::new(PlayerConfig::default(), capabilities);
            let outcome = play(&mut engine);
            let result = outcome.result.unwrap();
            assert!(!result.success);
            assert_eq!(result.code, code);
            assert_eq!(engine.state(), PlayerState::Idle);
        }
    }

    #[test]
    fn test_play_requests_metadata() {
        let mut engine = engine();
        let outcome = play(&mut engine);

        assert!(outcome.result.as_ref().unwrap().success);
        assert_eq!(engine.state(), PlayerState::Playing);
        assert!(matches!(
            outcome.transport_requests().next(),
            Some(TransportRequest::GetFileInfo { .. })
        ));
        let events: Vec<_> = outcome.events().cloned().collect();
        assert_eq!(
            events,
            vec![PlayerEvent::Loading { visible: true }, PlayerEvent::Playing]
        );

        // A second play is a no-op.
        let outcome = play(&mut engine);
        assert!(outcome.result.unwrap().success);
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_pause_and_resume_preconditions() {
        let mut engine = engine();
        let outcome = engine.handle(Input::Command(Command::Pause));
        assert_eq!(outcome.result.unwrap().message, "Not playing");
        assert!(outcome.effects.is_empty());

        let outcome = engine.handle(Input::Command(Command::Resume));
        assert_eq!(outcome.result.unwrap().message, "Not pausing");

        let outcome = engine.handle(Input::Command(Command::SeekTo(1_000)));
        assert_eq!(outcome.result.unwrap().code, -5);
        assert!(outcome.effects.is_empty());

        let outcome = engine.handle(Input::Command(Command::Stop));
        assert!(outcome.result.unwrap().success);
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_metadata_failure_keeps_state() {
        let mut engine = engine();
        play(&mut engine);

        let outcome = engine.handle(Input::Transport(TransportResponse::FileInfo {
            status: 404,
            size: -1,
        }));
        let events: Vec<_> = outcome.events().cloned().collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlayerEvent::Error {
                error_code, status, ..
            } => {
                assert_eq!(*error_code, -1);
                assert_eq!(*status, 404);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(engine.state(), PlayerState::Playing);
    }

    #[test]
    fn test_hidden_pause_resumes_on_visible() {
        let mut engine = engine();
        play(&mut engine);

        let outcome = engine.handle(Input::Visibility(false));
        assert!(outcome.result.is_none());
        assert_eq!(engine.state(), PlayerState::Pausing);

        engine.handle(Input::Visibility(true));
        assert_eq!(engine.state(), PlayerState::Playing);
    }

    #[test]
    fn test_visible_does_not_override_user_pause() {
        let mut engine = engine();
        play(&mut engine);
        engine.handle(Input::Command(Command::Pause));

        engine.handle(Input::Visibility(false));
        let outcome = engine.handle(Input::Visibility(true));
        assert!(outcome.effects.is_empty());
        assert_eq!(engine.state(), PlayerState::Pausing);
    }

    #[test]
    fn test_responses_dropped_while_idle() {
        let mut engine = engine();
        let outcome = engine.handle(Input::Decoder(DecoderResponse::VideoFrame {
            timestamp: 0.0,
            data: Bytes::new(),
        }));
        assert!(outcome.effects.is_empty());
        assert!(engine.frames().is_empty());

        let outcome = engine.handle(Input::Tick {
            kind: TimerKind::Display,
            audio_elapsed: Some(1.0),
        });
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn test_stop_emits_ended_once() {
        let mut engine = engine();
        play(&mut engine);
        let epoch = engine.epoch();

        let outcome = engine.handle(Input::Command(Command::Stop));
        let ended = outcome
            .events()
            .filter(|e| **e == PlayerEvent::Ended)
            .count();
        assert_eq!(ended, 1);
        assert!(engine.epoch() > epoch);
        assert!(engine.file().is_none());
        assert_eq!(
            outcome.decoder_requests().cloned().collect::<Vec<_>>(),
            vec![DecoderRequest::Close, DecoderRequest::Uninit]
        );

        let outcome = engine.handle(Input::Command(Command::Stop));
        assert!(outcome.events().next().is_none());
    }
}
