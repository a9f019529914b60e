//! # Host Bridge Traits
//!
//! Contracts between the playback core and the things it orchestrates but
//! does not implement.
//!
//! ## Overview
//!
//! The player coordinates three independently scheduled collaborators. Each
//! one is reached through a trait defined here and implemented per platform:
//!
//! ### Workers (message passing)
//! - [`TransportWorker`](transport::TransportWorker) - metadata, byte ranges, live streams
//! - [`DecoderWorker`](decoder::DecoderWorker) - container/codec decoding
//!
//! Workers talk over a [`WorkerChannel`](worker::WorkerChannel): one
//! send-only request handle, one receive-only response handle, closed
//! message enums on both sides.
//!
//! ### Sinks (direct calls)
//! - [`RenderSink`](sink::RenderSink) - video presentation
//! - [`AudioSink`](sink::AudioSink) / [`AudioSinkFactory`](sink::AudioSinkFactory) - PCM output and master clock
//!
//! ### Host integration
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - visibility changes
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to the host
//!
//! ## Platform Implementations
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Worker-side
//! failures that belong to the media (bad status, decode error) travel as
//! response messages instead, so the player can report them as events.

pub mod decoder;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod media;
pub mod platform;
pub mod sink;
pub mod transport;
pub mod worker;

pub use error::BridgeError;

pub use decoder::{DecoderRequest, DecoderResponse, DecoderWorker, NEED_DATA_BUFFERED};
pub use lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{AudioParams, AudioStreamInfo, SampleFormat, VideoParams};
pub use sink::{AudioSink, AudioSinkFactory, RenderSink, VideoPlanes};
pub use transport::{ProtocolKind, TransportRequest, TransportResponse, TransportWorker, STATUS_OK};
pub use worker::{worker_channel, WorkerChannel, WorkerEndpoint};
