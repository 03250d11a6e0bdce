//! Webcam video source using nokhwa.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::camera::error::{CameraError, Result};
use crate::camera::generic::{GenericCaptureBackend, VideoSource};
use crate::camera::types::{Image, PixelLayout};
use crate::imaging::convert::{convert_to_bgr8, RawPixelFormat};

/// Commodity camera addressed by its system device index.
pub struct WebcamSource {
    camera: Camera,
    frames: u64,
}

impl WebcamSource {
    /// Open the camera with the given system index and start its stream.
    ///
    /// A device that cannot be opened yields a source whose `is_opened`
    /// is false, so `GenericCaptureBackend::new` reports the failure.
    pub fn open(index: u32) -> Result<Self> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| CameraError::DeviceNotFound(format!("webcam {index}: {e}")))?;

        if let Err(e) = camera.open_stream() {
            tracing::warn!("webcam {index} stream failed to open: {e}");
        } else {
            let resolution = camera.resolution();
            tracing::info!(
                "webcam {index} opened: {}x{} @ {} fps",
                resolution.width(),
                resolution.height(),
                camera.frame_rate()
            );
        }

        Ok(Self { camera, frames: 0 })
    }

    /// Human-readable names of the webcams visible to the host.
    pub fn list_devices() -> Result<Vec<String>> {
        let devices = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CameraError::Sdk(format!("webcam query failed: {e}")))?;
        Ok(devices
            .into_iter()
            .map(|info| format!("{}: {}", info.index(), info.human_name()))
            .collect())
    }
}

impl VideoSource for WebcamSource {
    fn is_opened(&self) -> bool {
        self.camera.is_stream_open()
    }

    fn read_frame(&mut self) -> Result<Image> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| CameraError::Acquisition(e.to_string()))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Acquisition(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let mut bgr = Vec::new();
        convert_to_bgr8(
            RawPixelFormat::Rgb8Packed,
            width,
            height,
            decoded.as_raw(),
            &mut bgr,
        )?;
        self.frames += 1;
        tracing::trace!("webcam frame {} ({width}x{height})", self.frames);

        Image::from_vec(width, height, PixelLayout::Bgr8, bgr)
            .ok_or_else(|| CameraError::Acquisition("webcam frame size mismatch".to_string()))
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        if self.camera.is_stream_open() {
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("failed to stop webcam stream: {e}");
            }
        }
    }
}

/// Open webcam `index` as a single-camera driver.
pub fn open_webcam(index: u32) -> Result<GenericCaptureBackend<WebcamSource>> {
    GenericCaptureBackend::new(format!("webcam {index}"), WebcamSource::open(index)?)
}
