//! Clock adapters.
//!
//! - [`MonotonicClock`] wraps `std::time::Instant` for real-time runs.
//! - [`SimClock`] is advanced by hand, for accelerated simulation and
//!   tests.

use std::cell::Cell;
use std::time::Instant;

use crate::app::ports::ClockPort;

/// Milliseconds since construction, from the OS monotonic clock.
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since construction.
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl ClockPort for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually advanced clock. Never goes backwards.
#[derive(Debug, Default)]
pub struct SimClock {
    now_ms: Cell<u64>,
}

impl SimClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }

    /// Jump to `ms`; earlier values are ignored.
    pub fn set(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().max(ms));
    }
}

impl ClockPort for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
