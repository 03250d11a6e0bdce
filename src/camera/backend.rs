use std::time::{SystemTime, UNIX_EPOCH};

use crate::camera::error::Result;

/// Uniform acquisition contract shared by every capture backend and by the
/// composed tri-camera drivers.
///
/// Each call blocks until an observation is available or the backend's
/// failure condition is met. A failed call yields no observation at all; a
/// backend never substitutes a zero-filled or stale value.
pub trait SensorDriver {
    /// Value produced by one acquisition.
    type Observation;

    /// Acquire one fresh observation.
    fn get_observation(&mut self) -> Result<Self::Observation>;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    type Observation = D::Observation;

    fn get_observation(&mut self) -> Result<Self::Observation> {
        (**self).get_observation()
    }
}

/// Wall-clock time in seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
