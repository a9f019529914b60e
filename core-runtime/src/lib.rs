//! # Core Runtime
//!
//! Shared runtime infrastructure for the video playback core:
//! - Logging and tracing setup ([`logging`])
//! - Bridge wiring and validation ([`config`])
//! - Player event broadcasting ([`events`])
//!
//! ## Overview
//!
//! `core-playback` builds on this crate for everything that is not playback
//! logic: it receives a validated [`config::CoreConfig`] holding the host
//! bridges, publishes [`events::PlayerEvent`]s on an [`events::EventBus`],
//! and logs through the subscriber installed by [`logging::init_logging`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
