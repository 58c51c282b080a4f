//! Clock abstraction.
//!
//! Worklist membership is a pure function of the stores and the current
//! instant, so every read path takes its notion of "now" from an injected
//! clock rather than calling `Utc::now()` inline. Production code uses
//! [`SystemClock`]; tests use [`ManualClock`] to travel through the grace
//! window deterministically.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Abstraction over time sources for testability.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current wall-clock instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
///
/// Starts at a fixed instant and only moves when told to via [`set`](Self::set)
/// or [`advance`](Self::advance).
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a manual clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps the clock to an absolute instant (forwards or backwards).
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = instant;
    }

    /// Moves the clock forward (or backward, for negative durations).
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
