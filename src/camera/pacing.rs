//! Fixed-cadence pacing of acquisition calls.

use std::time::{Duration, Instant};

/// Default output cadence of the tri-camera drivers (10 Hz).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Holds each call's return back until a fixed period has elapsed since the
/// call began.
///
/// A call that already overran the period is released immediately; missed
/// time is never made up on later calls.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    period: Duration,
}

impl Pacer {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until `start + period`. Returns `true` when the work since
    /// `start` had already exceeded the period and no sleep happened.
    pub fn pace(&self, start: Instant) -> bool {
        let deadline = start + self.period;
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(deadline - now);
        false
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}
