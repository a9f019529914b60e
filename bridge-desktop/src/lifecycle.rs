//! Desktop visibility.
//!
//! Desktop windows are treated as always visible unless the embedding
//! application reports otherwise through a [`VisibilityHandle`].

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState},
};
use tokio::sync::watch;

/// Desktop lifecycle observer.
pub struct DesktopLifecycleObserver {
    state: watch::Receiver<LifecycleState>,
    // Keeps the channel open for observers without a handle.
    _owned: Option<watch::Sender<LifecycleState>>,
}

/// Reports window visibility changes to a [`DesktopLifecycleObserver`].
#[derive(Debug)]
pub struct VisibilityHandle(watch::Sender<LifecycleState>);

impl VisibilityHandle {
    pub fn set(&self, state: LifecycleState) {
        self.0.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

impl DesktopLifecycleObserver {
    /// Always in the foreground; the change stream never emits.
    pub fn new() -> Self {
        let (sender, state) = watch::channel(LifecycleState::Foreground);
        Self {
            state,
            _owned: Some(sender),
        }
    }

    /// Observer driven by window events of the embedding application.
    pub fn with_handle() -> (Self, VisibilityHandle) {
        let (sender, state) = watch::channel(LifecycleState::Foreground);
        (
            Self {
                state,
                _owned: None,
            },
            VisibilityHandle(sender),
        )
    }
}

impl Default for DesktopLifecycleObserver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for DesktopLifecycleObserver {
    async fn get_state(&self) -> Result<LifecycleState> {
        Ok(*self.state.borrow())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>> {
        let mut changes = self.state.clone();
        changes.mark_unchanged();
        Ok(Box::new(DesktopLifecycleChangeStream(changes)))
    }
}

struct DesktopLifecycleChangeStream(watch::Receiver<LifecycleState>);

#[async_trait]
impl LifecycleChangeStream for DesktopLifecycleChangeStream {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.0.changed().await.ok()?;
        Some(*self.0.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_default_is_foreground() {
        let observer = DesktopLifecycleObserver::new();
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Foreground
        );

        let mut changes = observer.subscribe_changes().await.unwrap();
        let next = tokio::time::timeout(Duration::from_millis(20), changes.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_handle_reports_changes() {
        let (observer, handle) = DesktopLifecycleObserver::with_handle();
        let mut changes = observer.subscribe_changes().await.unwrap();

        handle.set(LifecycleState::Background);
        assert_eq!(changes.next().await, Some(LifecycleState::Background));
        assert_eq!(
            observer.get_state().await.unwrap(),
            LifecycleState::Background
        );

        handle.set(LifecycleState::Foreground);
        assert_eq!(changes.next().await, Some(LifecycleState::Foreground));

        drop(handle);
        assert_eq!(changes.next().await, None);
    }
}
