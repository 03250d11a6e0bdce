//! Generic capture backend for commodity video devices.
//!
//! Retrieval is a plain blocking "read next frame" with no timeout and no
//! buffering policy beyond what the device stream does natively.

use crate::camera::backend::{now_timestamp, SensorDriver};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{Image, Observation};

/// A streaming video device.
pub trait VideoSource {
    /// Whether the device stream is currently open.
    fn is_opened(&self) -> bool;

    /// Block until the next frame is available and return it.
    fn read_frame(&mut self) -> Result<Image>;
}

/// Single-camera driver over any [`VideoSource`].
pub struct GenericCaptureBackend<V: VideoSource> {
    name: String,
    source: V,
}

impl<V: VideoSource> GenericCaptureBackend<V> {
    /// Bind to an already constructed source.
    ///
    /// # Errors
    ///
    /// `Acquisition` if the source reports that it could not be opened. No
    /// retry is attempted.
    pub fn new(name: impl Into<String>, source: V) -> Result<Self> {
        let name = name.into();
        if !source.is_opened() {
            tracing::error!("could not open video device '{name}'");
            return Err(CameraError::Acquisition(format!(
                "could not open video device '{name}'"
            )));
        }
        tracing::info!("video device '{name}' opened");
        Ok(Self { name, source })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &V {
        &self.source
    }
}

impl<V: VideoSource> SensorDriver for GenericCaptureBackend<V> {
    type Observation = Observation;

    fn get_observation(&mut self) -> Result<Observation> {
        if !self.source.is_opened() {
            return Err(CameraError::Acquisition(format!(
                "video device '{}' is not open",
                self.name
            )));
        }
        let image = self.source.read_frame()?;
        Ok(Observation::new(image, now_timestamp()))
    }
}
