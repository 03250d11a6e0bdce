//! Device selection among enumerated frame grabbers.

use crate::camera::error::{CameraError, Result};

use super::api::{DeviceHandle, DeviceInfo};

/// Pick the device to bind for `requested`.
///
/// A non-empty identifier must equal a device's user-defined name exactly.
/// An empty identifier selects the first enumerated device and logs a
/// warning.
///
/// # Errors
///
/// `NoDevices` when `devices` is empty (checked before any matching),
/// `DeviceNotFound` when a non-empty identifier matches nothing.
pub fn select_device(devices: &[DeviceInfo], requested: &str) -> Result<DeviceHandle> {
    if devices.is_empty() {
        return Err(CameraError::NoDevices);
    }

    if requested.is_empty() {
        tracing::warn!(
            "no device identifier given, using first enumerated device '{}'",
            devices[0].user_defined_name
        );
        return Ok(DeviceHandle(0));
    }

    devices
        .iter()
        .position(|d| d.user_defined_name == requested)
        .map(DeviceHandle)
        .ok_or_else(|| CameraError::DeviceNotFound(requested.to_string()))
}
