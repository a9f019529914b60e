//! Integration tests for core-async on native platforms.

use core_async::sync::{self, mpsc, CancellationToken};
use core_async::timer::TimerRegistry;
use core_async::{task, time};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_mutex() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mutex_clone = mutex.clone();

    task::spawn(async move {
        *mutex_clone.lock().await += 1;
    })
    .await
    .unwrap();

    assert_eq!(*mutex.lock().await, 1);
}

#[tokio::test]
async fn test_cancellation_token_stops_worker() {
    let token = CancellationToken::new();
    let child = token.clone();

    let handle = task::spawn(async move {
        child.cancelled().await;
        "stopped"
    });

    token.cancel();
    assert_eq!(handle.await.unwrap(), "stopped");
}

#[tokio::test(start_paused = true)]
async fn test_timer_registry_restart_leaves_only_fresh_ticks() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut timers = TimerRegistry::new(tx);

    let first = timers.start("download", time::Duration::from_millis(20));
    let second = timers.start("download", time::Duration::from_millis(20));
    assert_ne!(first, second);

    let tick = rx.recv().await.unwrap();
    assert_eq!(tick.generation, second);
    assert!(timers.accept(&tick));
}
