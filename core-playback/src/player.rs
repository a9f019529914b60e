//! # Player Driver
//!
//! Runs a [`PlaybackEngine`] on a Tokio task and performs the effects it
//! requests.
//!
//! ## Overview
//!
//! The driver owns every collaborator: both worker channels, the render sink,
//! the audio sink and its factory, the repeating timers and the event bus.
//! One loop multiplexes commands, worker responses and timer ticks, so the
//! engine only ever sees one input at a time. Deferred actions queued by an
//! input run before the loop waits again.
//!
//! ```text
//!  Player (handle) ──Command + oneshot──┐
//!  LifecycleObserver ──Visibility───────┤
//!  transport worker ──responses─────────┼──> Driver ──> PlaybackEngine
//!  decoder worker ──responses───────────┤        │
//!  TimerRegistry ──ticks────────────────┘        ▼
//!                                   effects: workers, sinks, timers, EventBus
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let core = CoreConfig::builder()
//!     .transport(transport)
//!     .decoder(decoder)
//!     .render_sink(sink)
//!     .build()?;
//! let player = Player::spawn(core, PlayerConfig::default())?;
//!
//! let mut events = player.events();
//! let result = player.play(PlayRequest::new("https://cdn.example/movie.mp4")).await;
//! assert!(result.success);
//! ```

use bridge_traits::{
    AudioParams, AudioSink, AudioSinkFactory, DecoderRequest, DecoderResponse, LifecycleObserver,
    RenderSink, TransportRequest, TransportResponse, VideoParams, VideoPlanes, WorkerChannel,
};
use bytes::Bytes;
use core_async::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use core_async::sync::{oneshot, CancellationToken};
use core_async::task::JoinHandle;
use core_async::timer::{TimerRegistry, TimerTick};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream, PlayerEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{PlayRequest, PlayerConfig};
use crate::engine::{Capabilities, Command, DeferredAction, Effect, Input, PlaybackEngine, TimerKind};
use crate::error::{CommandResult, PlaybackError, Result};
use crate::types::{PlayerSnapshot, PlayerState};

enum DriverMessage {
    Command {
        command: Command,
        reply: oneshot::Sender<CommandResult>,
    },
    Visibility(bool),
}

// ============================================================================
// Player Handle
// ============================================================================

/// Handle to a running player.
///
/// Commands resolve once the driver has applied them. Dropping the handle
/// stops the driver.
pub struct Player {
    messages: UnboundedSender<DriverMessage>,
    snapshot: Arc<RwLock<PlayerSnapshot>>,
    events: EventBus,
    shutdown: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    /// Starts the workers and the driver task. Must be called from within a
    /// Tokio runtime.
    ///
    /// A worker that fails to start is logged and treated as missing, so
    /// `play` reports it through its result code.
    pub fn spawn(core: CoreConfig, config: PlayerConfig) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;
        core.validate()
            .map_err(|err| PlaybackError::InvalidConfig(err.to_string()))?;

        let transport = core.transport.as_ref().and_then(|worker| {
            worker
                .spawn()
                .map_err(|err| warn!(error = %err, "Transport worker failed to start"))
                .ok()
        });
        let decoder = core.decoder.as_ref().and_then(|worker| {
            worker
                .spawn()
                .map_err(|err| warn!(error = %err, "Decoder worker failed to start"))
                .ok()
        });

        let capabilities = Capabilities {
            render_target: core.render_sink.is_some(),
            transport: transport.is_some(),
            decoder: decoder.is_some(),
        };
        info!(?capabilities, "Starting player");

        let engine = PlaybackEngine::new(config, capabilities);
        let snapshot = Arc::new(RwLock::new(engine.snapshot()));
        let events = EventBus::new(core.event_buffer_size);
        let shutdown = CancellationToken::new();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        if core.features.follow_visibility {
            if let Some(observer) = core.lifecycle_observer.clone() {
                follow_visibility(observer, message_tx.clone(), shutdown.clone());
            }
        }

        let driver = Driver {
            engine,
            transport: transport.map(|channel| WorkerLink::new("transport", channel)),
            decoder: decoder.map(|channel| WorkerLink::new("decoder", channel)),
            render_sink: core.render_sink.clone(),
            audio_output: Arc::clone(&core.audio_output),
            audio_sink: None,
            audio_params: None,
            timers: TimerRegistry::new(tick_tx),
            ticks: tick_rx,
            deferred: VecDeque::new(),
            messages: message_rx,
            events: events.clone(),
            snapshot: Arc::clone(&snapshot),
            shutdown: shutdown.clone(),
            session: None,
        };
        let handle = core_async::spawn(driver.run().instrument(info_span!("player")));

        Ok(Self {
            messages: message_tx,
            snapshot,
            events,
            shutdown,
            driver: Mutex::new(Some(handle)),
        })
    }

    pub async fn play(&self, request: PlayRequest) -> CommandResult {
        self.send(Command::Play(request)).await
    }

    pub async fn pause(&self) -> CommandResult {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> CommandResult {
        self.send(Command::Resume).await
    }

    pub async fn stop(&self) -> CommandResult {
        self.send(Command::Stop).await
    }

    /// Seeks to `ms` milliseconds from the start of the media.
    pub async fn seek_to(&self, ms: u64) -> CommandResult {
        self.send(Command::SeekTo(ms)).await
    }

    pub fn get_state(&self) -> PlayerState {
        self.snapshot.read().player_state
    }

    /// State as of the last input the driver handled.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.read().clone()
    }

    /// Subscribes to events emitted from now on.
    pub fn events(&self) -> EventStream {
        self.events.stream()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Stops playback, releases every collaborator and waits for the driver
    /// to exit. Later commands fail with [`PlaybackError::DriverStopped`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.driver.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "Player driver panicked");
            }
        }
    }

    async fn send(&self, command: Command) -> CommandResult {
        let (reply, response) = oneshot::channel();
        if self
            .messages
            .send(DriverMessage::Command { command, reply })
            .is_err()
        {
            return CommandResult::failure(&PlaybackError::DriverStopped);
        }
        response
            .await
            .unwrap_or_else(|_| CommandResult::failure(&PlaybackError::DriverStopped))
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.get_state())
            .field("events", &self.events)
            .finish()
    }
}

fn follow_visibility(
    observer: Arc<dyn LifecycleObserver>,
    messages: UnboundedSender<DriverMessage>,
    shutdown: CancellationToken,
) {
    core_async::spawn(async move {
        let mut changes = match observer.subscribe_changes().await {
            Ok(changes) => changes,
            Err(err) => {
                warn!(error = %err, "Lifecycle changes unavailable");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                state = changes.next() => {
                    let Some(state) = state else { break };
                    debug!(?state, "Lifecycle changed");
                    if messages.send(DriverMessage::Visibility(state.is_visible())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

// ============================================================================
// Driver
// ============================================================================

/// Player side of a worker whose response stream may have ended.
struct WorkerLink<Req, Resp> {
    name: &'static str,
    requests: UnboundedSender<Req>,
    responses: Option<UnboundedReceiver<Resp>>,
}

impl<Req, Resp> WorkerLink<Req, Resp> {
    fn new(name: &'static str, channel: WorkerChannel<Req, Resp>) -> Self {
        let (requests, responses) = channel.into_parts();
        Self {
            name,
            requests,
            responses: Some(responses),
        }
    }

    fn send(&self, request: Req) {
        if self.requests.send(request).is_err() {
            warn!(worker = self.name, "Worker stopped receiving requests");
        }
    }
}

/// Next response of an optional worker; pends forever once it is gone.
async fn next_response<Req, Resp>(link: &mut Option<WorkerLink<Req, Resp>>) -> Option<Resp> {
    match link.as_mut().and_then(|link| link.responses.as_mut()) {
        Some(responses) => responses.recv().await,
        None => std::future::pending().await,
    }
}

fn close_responses<Req, Resp>(link: &mut Option<WorkerLink<Req, Resp>>) {
    if let Some(link) = link.as_mut() {
        warn!(worker = link.name, "Worker exited");
        link.responses = None;
    }
}

struct Driver {
    engine: PlaybackEngine,
    transport: Option<WorkerLink<TransportRequest, TransportResponse>>,
    decoder: Option<WorkerLink<DecoderRequest, DecoderResponse>>,
    render_sink: Option<Arc<dyn RenderSink>>,
    audio_output: Arc<dyn AudioSinkFactory>,
    audio_sink: Option<Box<dyn AudioSink>>,
    audio_params: Option<AudioParams>,
    timers: TimerRegistry<TimerKind>,
    ticks: UnboundedReceiver<TimerTick<TimerKind>>,
    deferred: VecDeque<DeferredAction>,
    messages: UnboundedReceiver<DriverMessage>,
    events: EventBus,
    snapshot: Arc<RwLock<PlayerSnapshot>>,
    shutdown: CancellationToken,
    session: Option<Uuid>,
}

impl Driver {
    async fn run(mut self) {
        debug!("Player driver started");

        loop {
            while let Some(action) = self.deferred.pop_front() {
                self.dispatch(Input::Deferred(action));
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                message = self.messages.recv() => match message {
                    Some(DriverMessage::Command { command, reply }) => {
                        let result = self
                            .dispatch(Input::Command(command))
                            .unwrap_or_else(CommandResult::success);
                        if reply.send(result).is_err() {
                            debug!("Command caller went away");
                        }
                    }
                    Some(DriverMessage::Visibility(visible)) => {
                        self.dispatch(Input::Visibility(visible));
                    }
                    None => break,
                },
                response = next_response(&mut self.transport) => match response {
                    Some(response) => {
                        self.dispatch(Input::Transport(response));
                    }
                    None => close_responses(&mut self.transport),
                },
                response = next_response(&mut self.decoder) => match response {
                    Some(response) => {
                        self.dispatch(Input::Decoder(response));
                    }
                    None => close_responses(&mut self.decoder),
                },
                Some(tick) = self.ticks.recv() => {
                    if self.timers.accept(&tick) {
                        let audio_elapsed = self.audio_sink.as_ref().map(|sink| sink.elapsed_time());
                        self.dispatch(Input::Tick {
                            kind: tick.kind,
                            audio_elapsed,
                        });
                    }
                }
            }
        }

        self.dispatch(Input::Command(Command::Stop));
        self.timers.cancel_all();
        debug!("Player driver stopped");
    }

    fn dispatch(&mut self, input: Input) -> Option<CommandResult> {
        let outcome = self.engine.handle(input);
        for effect in outcome.effects {
            self.apply(effect);
        }
        *self.snapshot.write() = self.engine.snapshot();
        outcome.result
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Transport(request) => match self.transport.as_ref() {
                Some(link) => link.send(request),
                None => debug!("No transport worker"),
            },
            Effect::Decoder(request) => match self.decoder.as_ref() {
                Some(link) => link.send(request),
                None => debug!("No decoder worker"),
            },
            Effect::RenderVideo { payload, params } => self.render(&payload, &params),
            Effect::PlayAudio(samples) => {
                if let Some(sink) = self.audio_sink.as_mut() {
                    if let Err(err) = sink.play(&samples) {
                        warn!(error = %err, "Audio playback failed");
                    }
                }
            }
            Effect::CreateAudio(params) => self.create_audio(params),
            Effect::PauseAudio => {
                if let Some(sink) = self.audio_sink.as_mut() {
                    if let Err(err) = sink.pause() {
                        warn!(error = %err, "Audio pause failed");
                    }
                }
            }
            Effect::ResumeAudio => {
                if let Some(sink) = self.audio_sink.as_mut() {
                    if let Err(err) = sink.resume() {
                        warn!(error = %err, "Audio resume failed");
                    }
                }
            }
            Effect::RestartAudio => {
                if let Some(params) = self.audio_params {
                    self.destroy_audio();
                    self.create_audio(params);
                }
            }
            Effect::DestroyAudio => {
                self.destroy_audio();
                self.audio_params = None;
            }
            Effect::Emit(event) => self.emit(event),
            Effect::StartTimer { kind, period } => {
                self.timers.start(kind, period);
            }
            Effect::CancelTimer(kind) => {
                self.timers.cancel(&kind);
            }
            Effect::Defer(action) => self.deferred.push_back(action),
        }
    }

    fn render(&self, payload: &Bytes, params: &VideoParams) {
        let Some(sink) = self.render_sink.as_ref() else {
            return;
        };
        let planes = VideoPlanes {
            pixels: payload,
            width: params.width,
            height: params.height,
            luma_len: params.luma_plane_len(),
            chroma_len: params.chroma_plane_len(),
        };
        if let Err(err) = sink.render_frame(planes) {
            warn!(error = %err, "Render failed");
        }
    }

    fn create_audio(&mut self, params: AudioParams) {
        self.destroy_audio();
        match self.audio_output.create(&params) {
            Ok(sink) => {
                self.audio_sink = Some(sink);
                self.audio_params = Some(params);
            }
            Err(err) => {
                let err = PlaybackError::from(err);
                error!(error = %err, "Audio output unavailable");
                self.emit(PlayerEvent::Error {
                    error_code: err.code(),
                    status: 0,
                    message: err.to_string(),
                });
            }
        }
    }

    fn destroy_audio(&mut self) {
        if let Some(mut sink) = self.audio_sink.take() {
            if let Err(err) = sink.destroy() {
                warn!(error = %err, "Audio teardown failed");
            }
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        match &event {
            PlayerEvent::Playing if self.session.is_none() => {
                let session = Uuid::new_v4();
                info!(%session, "Playback session started");
                self.session = Some(session);
            }
            PlayerEvent::Ended => {
                if let Some(session) = self.session.take() {
                    info!(%session, "Playback session ended");
                }
            }
            _ => {}
        }

        // No subscribers is not an error.
        let _ = self.events.emit(event);
    }
}
