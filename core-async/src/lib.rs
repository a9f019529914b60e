//! Async abstraction layer for the Video Playback Core.
//!
//! Every core-* crate depends on this crate instead of reaching for tokio
//! directly, so the executor surface used by the playback engine stays in one
//! place.
//!
//! # Modules
//!
//! - `task`: Task spawning
//! - `time`: Sleep, intervals and instants
//! - `sync`: Channels, locks and cancellation
//! - `runtime`: Runtime handles and a blocking entry point
//! - `timer`: Cancelable repeating timers that deliver ticks over a channel
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;
pub mod timer;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
pub use timer::{RepeatingTimer, TimerTick};
