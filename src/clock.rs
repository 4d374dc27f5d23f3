//! Millisecond timestamp sources used to stamp appended values.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of the timestamp recorded with every append.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Milliseconds elapsed since the clock was created. Never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Wall-clock milliseconds since the UNIX epoch.
///
/// Follows system clock adjustments, so consecutive stamps may decrease.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => since.as_secs_f64() * 1000.0,
            // clock set before 1970
            Err(err) => -(err.duration().as_secs_f64() * 1000.0),
        }
    }
}

impl<F> Clock for F
where
    F: Fn() -> f64 + Send + Sync,
{
    #[inline]
    fn now_ms(&self) -> f64 {
        self()
    }
}
