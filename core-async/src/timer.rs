//! # Scheduled Tasks
//!
//! Repeating timers owned by a single controller and delivered as messages.
//!
//! ## Overview
//!
//! A [`RepeatingTimer`] runs a background task that pushes a [`TimerTick`]
//! into an unbounded channel every period until it is cancelled or dropped.
//! The owner receives ticks in its own event loop, so no callback ever runs
//! outside the owner's control.
//!
//! Every timer carries a generation number. A tick that was already queued
//! when its timer got cancelled still arrives, but its generation no longer
//! matches the registry, so [`TimerRegistry::accept`] rejects it.
//!
//! ```text
//!  ┌──────────────┐   TimerTick{kind, generation}   ┌──────────────┐
//!  │RepeatingTimer├────────────────────────────────>│  owner loop  │
//!  └──────┬───────┘          (mpsc)                 └──────┬───────┘
//!         │ cancel()                                       │ accept(tick)
//!         ▼                                                ▼
//!  CancellationToken                               TimerRegistry
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_async::sync::mpsc;
//! use core_async::time::Duration;
//! use core_async::timer::TimerRegistry;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let mut timers = TimerRegistry::new(tx);
//! timers.start("poll", Duration::from_millis(5));
//!
//! let tick = rx.recv().await.unwrap();
//! assert!(timers.accept(&tick));
//!
//! timers.cancel(&"poll");
//! assert!(!timers.is_running(&"poll"));
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::time::Duration;

/// Shortest period a timer accepts; zero periods are raised to this.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

/// A single tick delivered by a [`RepeatingTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick<K> {
    /// Which timer fired.
    pub kind: K,
    /// Generation of the timer at the time it was started.
    pub generation: u64,
}

/// A cancelable periodic timer. Dropping the timer cancels it.
pub struct RepeatingTimer {
    token: CancellationToken,
    period: Duration,
    generation: u64,
    handle: JoinHandle<()>,
}

impl RepeatingTimer {
    /// Starts a timer that sends a tick every `period`, first tick one period
    /// from now. Must be called from within a Tokio runtime.
    pub fn start<K>(
        kind: K,
        generation: u64,
        period: Duration,
        sink: UnboundedSender<TimerTick<K>>,
    ) -> Self
    where
        K: Copy + Debug + Send + 'static,
    {
        let period = period.max(MIN_TIMER_PERIOD);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if sink.send(TimerTick { kind, generation }).is_err() {
                            break;
                        }
                    }
                }
            }
            trace!(?kind, generation, "Timer task exited");
        });

        Self {
            token,
            period,
            generation,
            handle,
        }
    }

    /// Stops the timer. Ticks already queued are left for the owner to reject.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.handle.is_finished()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Owns at most one running timer per kind and filters stale ticks.
pub struct TimerRegistry<K> {
    sink: UnboundedSender<TimerTick<K>>,
    timers: HashMap<K, RepeatingTimer>,
    next_generation: u64,
}

impl<K> TimerRegistry<K>
where
    K: Copy + Debug + Eq + Hash + Send + 'static,
{
    pub fn new(sink: UnboundedSender<TimerTick<K>>) -> Self {
        Self {
            sink,
            timers: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Starts (or restarts) the timer for `kind`. A running timer of the same
    /// kind is cancelled first and its pending ticks become stale.
    pub fn start(&mut self, kind: K, period: Duration) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        let generation = self.next_generation;
        let timer = RepeatingTimer::start(kind, generation, period, self.sink.clone());
        if let Some(previous) = self.timers.insert(kind, timer) {
            previous.cancel();
        }
        generation
    }

    /// Cancels the timer for `kind`, if any. Returns whether one was running.
    pub fn cancel(&mut self, kind: &K) -> bool {
        match self.timers.remove(kind) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.cancel();
        }
    }

    pub fn is_running(&self, kind: &K) -> bool {
        self.timers.contains_key(kind)
    }

    pub fn period(&self, kind: &K) -> Option<Duration> {
        self.timers.get(kind).map(RepeatingTimer::period)
    }

    /// Returns `true` when the tick belongs to the currently running timer of
    /// its kind.
    pub fn accept(&self, tick: &TimerTick<K>) -> bool {
        self.timers
            .get(&tick.kind)
            .map(|timer| timer.generation() == tick.generation)
            .unwrap_or(false)
    }
}

impl<K> Drop for TimerRegistry<K> {
    fn drop(&mut self) {
        for timer in self.timers.values() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Fast,
        Slow,
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_every_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = RepeatingTimer::start(Kind::Fast, 7, Duration::from_millis(10), tx);

        for _ in 0..3 {
            let tick = rx.recv().await.unwrap();
            assert_eq!(tick.kind, Kind::Fast);
            assert_eq!(tick.generation, 7);
        }
        assert_eq!(timer.period(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel::<TimerTick<Kind>>();
        let timer = RepeatingTimer::start(Kind::Fast, 1, Duration::ZERO, tx);
        assert_eq!(timer.period(), MIN_TIMER_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = RepeatingTimer::start(Kind::Slow, 1, Duration::from_millis(10), tx);
        drop(timer);

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Sender dropped with the task, channel drains to None.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_rejects_stale_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);

        timers.start(Kind::Fast, Duration::from_millis(10));
        let stale = rx.recv().await.unwrap();
        assert!(timers.accept(&stale));

        timers.start(Kind::Fast, Duration::from_millis(10));
        assert!(!timers.accept(&stale));

        let fresh = rx.recv().await.unwrap();
        assert!(timers.accept(&fresh));

        timers.cancel(&Kind::Fast);
        assert!(!timers.accept(&fresh));
        assert!(!timers.is_running(&Kind::Fast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_tracks_kinds_independently() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);

        timers.start(Kind::Fast, Duration::from_millis(5));
        timers.start(Kind::Slow, Duration::from_millis(50));
        assert_eq!(timers.period(&Kind::Slow), Some(Duration::from_millis(50)));

        assert!(timers.cancel(&Kind::Fast));
        assert!(!timers.cancel(&Kind::Fast));
        assert!(timers.is_running(&Kind::Slow));

        timers.cancel_all();
        assert!(!timers.is_running(&Kind::Slow));
    }
}
