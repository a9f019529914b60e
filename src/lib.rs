//! Workspace facade crate.
//!
//! Re-exports the player and its host contracts so applications can depend on
//! `vpc-workspace` alone. The `desktop-shims` feature (default) also exposes
//! the desktop bridge implementations and lets `CoreConfig::builder()` fall
//! back to them.
//!
//! ```ignore
//! use vpc_workspace::{CoreConfig, PlayRequest, Player, PlayerConfig};
//!
//! let core = CoreConfig::builder()
//!     .decoder(decoder)
//!     .render_sink(sink)
//!     .build()?;
//! let player = Player::spawn(core, PlayerConfig::default())?;
//! player.play(PlayRequest::new("https://cdn.example/movie.mp4")).await;
//! ```

pub use bridge_traits;
pub use core_playback::{
    CommandResult, PlayRequest, PlaybackError, Player, PlayerConfig, PlayerSnapshot, PlayerState,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{EventBus, EventStream, PlayerEvent};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
