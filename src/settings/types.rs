use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::grabber::api::GrabStrategy;
use crate::camera::types::NUM_CAMERAS;
use crate::imaging::convert::RawPixelFormat;

/// Acquisition parameters applied to every frame-grabber device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GrabberConfig {
    /// Frame buffers the driver may allocate.
    pub buffer_depth: usize,
    pub exposure_time_us: f64,
    pub frame_rate_hz: f64,
    /// Value written to the white-balance auto node.
    pub balance_white_auto: String,
    pub output_format: RawPixelFormat,
    pub strategy: GrabStrategy,
    pub retrieve_timeout_ms: u64,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            buffer_depth: 5,
            exposure_time_us: 1500.0,
            frame_rate_hz: 100.0,
            balance_white_auto: "Once".to_string(),
            output_format: RawPixelFormat::Bgr8Packed,
            strategy: GrabStrategy::LatestImageOnly,
            retrieve_timeout_ms: 5000,
        }
    }
}

impl GrabberConfig {
    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieve_timeout_ms)
    }
}

/// Settings for the three-camera rig.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriCameraConfig {
    /// User-defined device names, one per camera; empty selects the first
    /// enumerated device.
    pub device_ids: [String; NUM_CAMERAS],
    /// Halve image width and height before returning observations.
    pub downsample: bool,
    /// Minimum wall-clock time between the start and the return of a call.
    pub period_ms: u64,
    pub grabber: GrabberConfig,
}

impl Default for TriCameraConfig {
    fn default() -> Self {
        Self {
            device_ids: [
                "camera60".to_string(),
                "camera180".to_string(),
                "camera300".to_string(),
            ],
            downsample: true,
            period_ms: 100,
            grabber: GrabberConfig::default(),
        }
    }
}

impl TriCameraConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}
