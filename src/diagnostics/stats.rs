use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::camera::error::ErrorKind;

/// Acquisition statistics for one multi-camera driver.
pub struct AcquisitionStats {
    observation_count: u64,
    failures: HashMap<ErrorKind, u64>,
    overrun_count: u64,
    start_time: Instant,
    last_call_start: Option<Instant>,
    period_total_us: u64,
    period_samples: u64,
    last_spread_us: u64,
}

/// Snapshot of acquisition stats for logging or serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub rate_hz: f64,
    pub observation_count: u64,
    pub failure_count: u64,
    pub failures: HashMap<ErrorKind, u64>,
    pub overrun_count: u64,
    pub overrun_rate: f64,
    pub mean_period_ms: f64,
    pub last_spread_ms: f64,
}

impl AcquisitionStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            observation_count: 0,
            failures: HashMap::new(),
            overrun_count: 0,
            start_time: Instant::now(),
            last_call_start: None,
            period_total_us: 0,
            period_samples: 0,
            last_spread_us: 0,
        }
    }

    /// Record a completed call. `spread_secs` is the distance between the
    /// earliest and latest camera timestamp; `overran` marks a call whose
    /// grabs alone exceeded the pacing period.
    pub fn record_observation(&mut self, call_start: Instant, spread_secs: f64, overran: bool) {
        self.mark_call(call_start);
        self.observation_count += 1;
        self.last_spread_us = (spread_secs.max(0.0) * 1e6) as u64;
        if overran {
            self.overrun_count += 1;
        }
    }

    /// Record a call that returned no observation.
    pub fn record_failure(&mut self, call_start: Instant, kind: ErrorKind) {
        self.mark_call(call_start);
        *self.failures.entry(kind).or_default() += 1;
    }

    fn mark_call(&mut self, call_start: Instant) {
        if let Some(prev) = self.last_call_start {
            let period = call_start.saturating_duration_since(prev);
            self.period_total_us += period.as_micros() as u64;
            self.period_samples += 1;
        }
        self.last_call_start = Some(call_start);
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Successful observations per second since creation or last reset.
    pub fn rate_hz(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.observation_count as f64 / elapsed
    }

    /// Share of successful calls that overran the period (0.0 - 100.0).
    pub fn overrun_rate(&self) -> f64 {
        if self.observation_count == 0 {
            return 0.0;
        }
        (self.overrun_count as f64 / self.observation_count as f64) * 100.0
    }

    /// Mean start-to-start interval between calls in milliseconds.
    pub fn mean_period_ms(&self) -> f64 {
        if self.period_samples == 0 {
            return 0.0;
        }
        self.period_total_us as f64 / self.period_samples as f64 / 1000.0
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rate_hz: self.rate_hz(),
            observation_count: self.observation_count,
            failure_count: self.failure_count(),
            failures: self.failures.clone(),
            overrun_count: self.overrun_count,
            overrun_rate: self.overrun_rate(),
            mean_period_ms: self.mean_period_ms(),
            last_spread_ms: self.last_spread_us as f64 / 1000.0,
        }
    }
}

impl Default for AcquisitionStats {
    fn default() -> Self {
        Self::new()
    }
}
