//! Host visibility and lifecycle.
//!
//! Hosts report whether the player surface is visible. The player pauses when
//! the surface goes to the background and resumes when it comes back.

use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    platform::{PlatformSend, PlatformSendSync},
};

/// Lifecycle state of the surface hosting the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Visible and active
    Foreground,
    /// Hidden (tab switched, window minimized)
    Background,
    /// About to be suspended by the OS
    Suspended,
}

impl LifecycleState {
    pub fn is_visible(&self) -> bool {
        matches!(self, LifecycleState::Foreground)
    }
}

/// Notifies the core about visibility transitions.
///
/// # Platform Support
///
/// - **Desktop**: window focus/minimize events
/// - **Web**: Page Visibility API
/// - **Mobile**: activity / scene lifecycle callbacks
///
/// # Example
///
/// ```ignore
/// use bridge_traits::lifecycle::{LifecycleObserver, LifecycleState};
///
/// async fn follow(observer: &dyn LifecycleObserver) -> Result<()> {
///     let mut changes = observer.subscribe_changes().await?;
///     while let Some(state) = changes.next().await {
///         if state.is_visible() { resume() } else { pause() }
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LifecycleObserver: PlatformSendSync {
    /// Current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait::async_trait]
pub trait LifecycleChangeStream: PlatformSend {
    /// Next state update, `None` once the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}
