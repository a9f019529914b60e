//! Marker traits that keep bridge trait bounds in one place.
//!
//! Every bridge object is shared between the player driver task and the
//! worker tasks it spawns, so implementations must be `Send + Sync`.

/// Marker trait for bridge objects shared across tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait for bridge objects moved into a single task.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
