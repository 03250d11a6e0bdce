//! Frame-grabber SDK abstraction.
//!
//! A vendor binding, the `SimulatedGrabberSdk` and the `MockGrabberSdk` all
//! implement this trait, so `FrameGrabberBackend<S>` is generic over the SDK.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::error::Result;
use crate::imaging::convert::RawPixelFormat;

/// Opaque device handle used across the API boundary.
///
/// It is the device's index in the most recent enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub usize);

/// Identity of an enumerated frame-grabber device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// User-assigned name; the key requested device identifiers match against.
    pub user_defined_name: String,
    pub model_name: String,
    pub serial_number: String,
}

/// Buffering policy applied while grabbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabStrategy {
    /// Keep only the newest completed frame; older ones are discarded.
    LatestImageOnly,
    /// Deliver frames in order from a bounded FIFO.
    OneByOne,
}

/// Outcome of one retrieved grab.
#[derive(Debug, Clone)]
pub struct GrabResult {
    pub succeeded: bool,
    /// SDK error text when `succeeded` is false.
    pub error_description: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: RawPixelFormat,
    pub buffer: Vec<u8>,
}

impl GrabResult {
    pub fn success(width: u32, height: u32, pixel_format: RawPixelFormat, buffer: Vec<u8>) -> Self {
        Self {
            succeeded: true,
            error_description: String::new(),
            width,
            height,
            pixel_format,
            buffer,
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_description: description.into(),
            width: 0,
            height: 0,
            pixel_format: RawPixelFormat::Mono8,
            buffer: Vec::new(),
        }
    }
}

/// Abstraction over frame-grabber SDK operations.
///
/// All methods take `&self`; implementations manage interior mutability.
pub trait GrabberSdk: Send + Sync {
    /// Initialise the process-wide SDK state. Called once per context.
    fn initialize(&self) -> Result<()>;

    /// Release the process-wide SDK state.
    fn terminate(&self);

    /// List attached devices in enumeration order.
    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Open a device for exclusive use.
    fn open(&self, device: DeviceHandle) -> Result<()>;

    /// Close a previously opened device.
    fn close(&self, device: DeviceHandle) -> Result<()>;

    /// Set how many frame buffers the driver may allocate.
    fn set_max_buffers(&self, device: DeviceHandle, count: usize) -> Result<()>;

    /// Select the pixel format the driver delivers.
    fn set_output_format(&self, device: DeviceHandle, format: RawPixelFormat) -> Result<()>;

    /// Write a floating-point node (e.g. `ExposureTime`).
    fn set_float(&self, device: DeviceHandle, node: &str, value: f64) -> Result<()>;

    /// Write an enumeration node (e.g. `BalanceWhiteAuto`).
    fn set_enum(&self, device: DeviceHandle, node: &str, value: &str) -> Result<()>;

    /// Start free-running acquisition with the given buffering policy.
    fn start_grabbing(&self, device: DeviceHandle, strategy: GrabStrategy) -> Result<()>;

    /// Stop acquisition. Must be safe to call when not grabbing.
    fn stop_grabbing(&self, device: DeviceHandle) -> Result<()>;

    /// Wait up to `timeout` for the next grab result.
    ///
    /// Returns `Ok(None)` when the timeout expires.
    fn retrieve_result(&self, device: DeviceHandle, timeout: Duration)
        -> Result<Option<GrabResult>>;
}

/// Node names written during configuration.
pub mod nodes {
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    pub const ACQUISITION_FRAME_RATE: &str = "AcquisitionFrameRate";
    pub const BALANCE_WHITE_AUTO: &str = "BalanceWhiteAuto";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_result_carries_description() {
        let r = GrabResult::failure("buffer incomplete");
        assert!(!r.succeeded);
        assert_eq!(r.error_description, "buffer incomplete");
        assert!(r.buffer.is_empty());
    }

    #[test]
    fn device_info_serialises_camel_case() {
        let info = DeviceInfo {
            user_defined_name: "camera60".to_string(),
            model_name: "acA720-520uc".to_string(),
            serial_number: "2242".to_string(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["userDefinedName"], "camera60");
    }

    /// Verify the trait is object-safe (can be used as `dyn GrabberSdk`).
    #[test]
    fn trait_is_object_safe() {
        fn _accepts_dyn(_sdk: &dyn GrabberSdk) {}
    }

    #[test]
    fn trait_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn GrabberSdk>>();
    }
}
