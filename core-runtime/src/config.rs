//! # Core Configuration Module
//!
//! Wires the host bridges the player needs into one validated `CoreConfig`.
//!
//! ## Overview
//!
//! The configuration uses a builder to collect bridge implementations and
//! runtime sizing. Media tunables (header length, chunk size, buffering
//! thresholds) live in `core_playback::config::PlayerConfig`; this module only
//! deals with *what the player talks to*.
//!
//! ## Required Dependencies
//!
//! - `AudioSinkFactory` - PCM output and master clock
//!
//! ## Optional Dependencies
//!
//! - `TransportWorker` - metadata/range/stream fetching (desktop default: reqwest + tokio fs)
//! - `DecoderWorker` - decoding backend
//! - `RenderSink` - video presentation
//! - `LifecycleObserver` - visibility driven pause/resume
//!
//! A missing transport, decoder or render sink is not a build error: the
//! player rejects `play` with a precondition failure instead, so hosts may
//! attach a render target late.
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for
//! `TransportWorker` and `AudioSinkFactory` are injected if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .decoder(Arc::new(MyDecoderWorker::new()))
//!     .render_sink(Arc::new(MyRenderSink::new()))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    AudioSinkFactory, DecoderWorker, LifecycleObserver, RenderSink, TransportWorker,
};
use std::sync::Arc;

/// Upper bound accepted for the event bus capacity.
pub const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Bridges and runtime sizing for one player instance.
#[derive(Clone)]
pub struct CoreConfig {
    /// Transport worker factory (optional with desktop default)
    pub transport: Option<Arc<dyn TransportWorker>>,

    /// Decoder worker factory (optional)
    pub decoder: Option<Arc<dyn DecoderWorker>>,

    /// Video presentation target (optional)
    pub render_sink: Option<Arc<dyn RenderSink>>,

    /// Audio output (required, desktop default available)
    pub audio_output: Arc<dyn AudioSinkFactory>,

    /// Visibility observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Events buffered per subscriber before it lags
    pub event_buffer_size: usize,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("transport", &self.transport.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("render_sink", &self.render_sink.is_some())
            .field("audio_output", &"<AudioSinkFactory>")
            .field("lifecycle_observer", &self.lifecycle_observer.is_some())
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Optional behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Pause when the host surface is hidden, resume when it is shown again.
    pub follow_visibility: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            follow_visibility: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates sizing and feature/bridge consistency.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.features.follow_visibility && self.lifecycle_observer.is_none() {
            return Err(Error::Config(
                "Visibility following enabled but no LifecycleObserver provided. \
                 Disable the feature or inject a LifecycleObserver implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn audio_output_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioSinkFactory".to_string(),
        message: "An audio output is required; its clock drives A/V sync. \
                 Desktop: enable the 'desktop-shims' feature to use the default WallClockAudioOutput. \
                 Other hosts: inject a platform audio device adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_output() -> Result<Arc<dyn AudioSinkFactory>> {
    let output: Arc<dyn AudioSinkFactory> = Arc::new(bridge_desktop::WallClockAudioOutput::new());
    Ok(output)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_output() -> Result<Arc<dyn AudioSinkFactory>> {
    Err(audio_output_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_transport() -> Result<Option<Arc<dyn TransportWorker>>> {
    let transport = bridge_desktop::DesktopTransportWorker::new().map_err(|e| {
        Error::Internal(format!("Failed to create default transport worker: {}", e))
    })?;
    let transport: Arc<dyn TransportWorker> = Arc::new(transport);
    Ok(Some(transport))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_transport() -> Result<Option<Arc<dyn TransportWorker>>> {
    Ok(None)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    transport: Option<Arc<dyn TransportWorker>>,
    decoder: Option<Arc<dyn DecoderWorker>>,
    render_sink: Option<Arc<dyn RenderSink>>,
    audio_output: Option<Arc<dyn AudioSinkFactory>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    event_buffer_size: Option<usize>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    pub fn transport(mut self, transport: Arc<dyn TransportWorker>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn DecoderWorker>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn render_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.render_sink = Some(sink);
        self
    }

    pub fn audio_output(mut self, output: Arc<dyn AudioSinkFactory>) -> Self {
        self.audio_output = Some(output);
        self
    }

    /// Sets the visibility observer and turns visibility following on.
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// Visibility following defaults to on only when an observer was given.
    pub fn build(self) -> Result<CoreConfig> {
        let audio_output = match self.audio_output {
            Some(output) => output,
            None => provide_default_audio_output()?,
        };

        let transport = match self.transport {
            Some(transport) => Some(transport),
            None => provide_default_transport()?,
        };

        let features = self.features.unwrap_or(FeatureFlags {
            follow_visibility: self.lifecycle_observer.is_some(),
        });

        let config = CoreConfig {
            transport,
            decoder: self.decoder,
            render_sink: self.render_sink,
            audio_output,
            lifecycle_observer: self.lifecycle_observer,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features,
        };

        config.validate()?;

        Ok(config)
    }
}
