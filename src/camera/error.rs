use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Camera subsystem errors.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("no frame-grabber devices present, please connect one")]
    NoDevices,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("no frame retrieved within {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error("SDK call failed: {0}")]
    Sdk(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Fieldless discriminant of [`CameraError`], for branching on the failure
/// kind without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoDevices,
    DeviceNotFound,
    AcquisitionTimeout,
    Acquisition,
    Sdk,
    Config,
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevices => ErrorKind::NoDevices,
            Self::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            Self::AcquisitionTimeout(_) => ErrorKind::AcquisitionTimeout,
            Self::Acquisition(_) => ErrorKind::Acquisition,
            Self::Sdk(_) => ErrorKind::Sdk,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
