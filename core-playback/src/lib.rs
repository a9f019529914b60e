//! # Playback Core
//!
//! Orchestrates progressive download, decoding, buffering and presentation of
//! one media resource at a time.
//!
//! ## Overview
//!
//! The crate coordinates collaborators it does not implement: a transport
//! worker, a decoder worker, a render sink and an audio sink (see
//! `bridge-traits`). Playback logic is split into small state holders driven
//! by one state machine:
//!
//! - [`transport`]: range request pacing, download epochs, stale-chunk rejection
//! - [`decode`]: decoder lifecycle and the decoding toggle
//! - [`frame_buffer`]: decoded frame queue with span-based backpressure
//! - [`av_sync`]: audio-master clock and the video presentation gate
//! - [`seek`]: the two gates a seek must clear before playback resumes
//! - [`engine`]: the player state machine tying the above together
//! - [`player`]: the async driver and the [`Player`] handle hosts use
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{Player, PlayerConfig, PlayRequest};
//!
//! let player = Player::spawn(core_config, PlayerConfig::default())?;
//! let mut events = player.events();
//!
//! player.play(PlayRequest::new("https://cdn.example/movie.mp4")).await;
//! player.seek_to(90_000).await;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.name());
//! }
//! ```

pub mod av_sync;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod frame_buffer;
pub mod player;
pub mod seek;
pub mod transport;
pub mod types;

pub use config::{PlayRequest, PlayerConfig};
pub use engine::{Capabilities, Command, Effect, Input, Outcome, PlaybackEngine, TimerKind};
pub use error::{CommandResult, PlaybackError, Result};
pub use player::Player;
pub use types::{format_time, DecoderState, FrameKind, PlayerSnapshot, PlayerState};
