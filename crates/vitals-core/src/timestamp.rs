//! Wall-clock timestamps for readings
//!
//! Readings carry Unix-epoch seconds. The system clock can step backwards
//! (NTP corrections, manual changes), so [`MonotonicWallClock`] clamps each
//! value to the previous one and never goes back in time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in fractional seconds
pub fn unix_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Non-decreasing Unix-seconds source, one per simulator
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicWallClock {
    last: f64,
}

impl MonotonicWallClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp for the next reading
    pub fn now(&mut self) -> f64 {
        self.observe(unix_secs_f64())
    }

    /// Last timestamp handed out, 0.0 before the first call
    pub fn last(&self) -> f64 {
        self.last
    }

    fn observe(&mut self, wall: f64) -> f64 {
        if wall > self.last {
            self.last = wall;
        }
        self.last
    }
}
