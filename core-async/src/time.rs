//! Time-related abstractions.
//!
//! Thin re-exports over `tokio::time` plus the standard duration types.
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(5)).await;
//!     assert!(start.elapsed() >= Duration::from_millis(5));
//! }
//! ```

pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep,
    Timeout,
};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Converts fractional milliseconds into a [`Duration`], clamping negatives
/// and non-finite values to zero.
pub fn duration_from_millis_f64(millis: f64) -> Duration {
    if millis.is_finite() && millis > 0.0 {
        Duration::from_secs_f64(millis / 1000.0)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_millis_f64() {
        assert_eq!(duration_from_millis_f64(31.25), Duration::from_micros(31_250));
        assert_eq!(duration_from_millis_f64(-4.0), Duration::ZERO);
        assert_eq!(duration_from_millis_f64(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_millis_f64(f64::INFINITY), Duration::ZERO);
    }
}
