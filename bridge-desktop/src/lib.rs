//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `DesktopTransportWorker`: `http(s)://` via `reqwest`, `file://` via `tokio::fs`
//! - `WallClockAudioOutput`: silent audio device whose clock follows real time
//! - `HeadlessRenderSink`: validates and counts frames without a window
//! - `DesktopLifecycleObserver`: always foreground unless the app reports otherwise
//!
//! There is no desktop decoder worker; hosts inject one.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopTransportWorker, HeadlessRenderSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let core = CoreConfig::builder()
//!         .transport(Arc::new(DesktopTransportWorker::new()?))
//!         .decoder(decoder)
//!         .render_sink(Arc::new(HeadlessRenderSink::new()))
//!         .build()?;
//!     Ok(())
//! }
//! ```

mod audio;
mod filesystem;
mod http;
mod lifecycle;
mod render;
mod transport;

pub use audio::{WallClockAudioOutput, WallClockAudioSink};
pub use http::HttpFetcher;
pub use lifecycle::{DesktopLifecycleObserver, VisibilityHandle};
pub use render::HeadlessRenderSink;
pub use transport::{DesktopTransportWorker, DEFAULT_REQUEST_TIMEOUT};
