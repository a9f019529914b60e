//! Synchronization primitives.
//!
//! Re-exports the tokio channel and lock types used across the workspace and
//! `tokio_util`'s cancellation token.
//!
//! ```rust
//! use core_async::sync::mpsc;
//!
//! async fn example() {
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     tx.send(7).unwrap();
//!     assert_eq!(rx.recv().await, Some(7));
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

pub use tokio_util::sync::CancellationToken;
