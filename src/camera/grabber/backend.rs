//! Single-camera driver on a frame-grabber SDK.
//!
//! Generic over `S: GrabberSdk` so tests use `MockGrabberSdk` while
//! production uses a vendor binding.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::camera::backend::{now_timestamp, SensorDriver};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{Image, Observation, PixelLayout};
use crate::imaging::convert::convert_to_bgr8;
use crate::settings::types::GrabberConfig;

use super::api::{nodes, DeviceHandle, DeviceInfo, GrabberSdk};
use super::discovery::select_device;
use super::sdk::{SdkContext, SdkLease};

/// Lifecycle of a frame-grabber backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabberState {
    Uninitialized,
    DeviceBound,
    Streaming,
    Closed,
}

/// Single-camera driver bound to one frame-grabber device.
///
/// Construction runs discovery, opens and configures the device and starts
/// grabbing. Dropping the backend (or calling [`close`](Self::close)) stops
/// grabbing, closes the device and releases its SDK lease.
pub struct FrameGrabberBackend<S: GrabberSdk> {
    sdk: SdkLease<S>,
    device: DeviceHandle,
    info: DeviceInfo,
    state: GrabberState,
    opened: bool,
    timeout: Duration,
    /// Reused conversion target; observations receive a copy.
    converted: Vec<u8>,
}

impl<S: GrabberSdk> FrameGrabberBackend<S> {
    /// Bind to the device whose user-defined name equals `device_id` and
    /// start streaming. An empty `device_id` binds the first device.
    ///
    /// # Errors
    ///
    /// `NoDevices` if nothing is attached, `DeviceNotFound` if the name
    /// matches no device, `Sdk` if another backend already holds the device
    /// or opening or configuring fails. The SDK lease and any opened device
    /// are released before returning an error.
    pub fn new(ctx: &Arc<SdkContext<S>>, device_id: &str, config: &GrabberConfig) -> Result<Self> {
        let sdk = ctx.acquire()?;
        let devices = sdk.enumerate_devices()?;
        let device = select_device(&devices, device_id)?;
        let info = devices[device.0].clone();
        sdk.bind(device)?;

        let mut backend = Self {
            sdk,
            device,
            info,
            state: GrabberState::DeviceBound,
            opened: false,
            timeout: config.retrieve_timeout(),
            converted: Vec::new(),
        };
        backend.start_streaming(config)?;

        tracing::info!(
            "frame grabber '{}' ({} {}) streaming",
            backend.info.user_defined_name,
            backend.info.model_name,
            backend.info.serial_number
        );
        Ok(backend)
    }

    /// DeviceBound -> Streaming. On failure `Drop` undoes what was done.
    fn start_streaming(&mut self, config: &GrabberConfig) -> Result<()> {
        let dev = self.device;
        self.sdk.open(dev)?;
        self.opened = true;

        self.sdk.set_max_buffers(dev, config.buffer_depth)?;
        self.sdk.set_output_format(dev, config.output_format)?;
        self.sdk
            .set_float(dev, nodes::EXPOSURE_TIME, config.exposure_time_us)?;
        self.sdk
            .set_float(dev, nodes::ACQUISITION_FRAME_RATE, config.frame_rate_hz)?;
        self.sdk
            .set_enum(dev, nodes::BALANCE_WHITE_AUTO, &config.balance_white_auto)?;

        self.sdk.start_grabbing(dev, config.strategy)?;
        self.state = GrabberState::Streaming;
        Ok(())
    }

    pub fn state(&self) -> GrabberState {
        self.state
    }

    /// Identity of the bound device.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Streaming -> Closed. Idempotent.
    pub fn close(&mut self) {
        if self.state == GrabberState::Closed {
            return;
        }
        if self.state == GrabberState::Streaming {
            if let Err(e) = self.sdk.stop_grabbing(self.device) {
                tracing::warn!("stop grabbing '{}' failed: {e}", self.info.user_defined_name);
            }
        }
        if self.opened {
            if let Err(e) = self.sdk.close(self.device) {
                tracing::warn!("closing '{}' failed: {e}", self.info.user_defined_name);
            }
            self.opened = false;
        }
        self.sdk.unbind(self.device);
        self.state = GrabberState::Closed;
        tracing::info!("frame grabber '{}' closed", self.info.user_defined_name);
    }
}

impl<S: GrabberSdk> SensorDriver for FrameGrabberBackend<S> {
    type Observation = Observation;

    fn get_observation(&mut self) -> Result<Observation> {
        if self.state != GrabberState::Streaming {
            return Err(CameraError::Acquisition(format!(
                "'{}' is not streaming ({:?})",
                self.info.user_defined_name, self.state
            )));
        }

        let result = self
            .sdk
            .retrieve_result(self.device, self.timeout)
            .map_err(|e| match e {
                CameraError::Sdk(msg) => CameraError::Acquisition(msg),
                other => other,
            })?
            .ok_or(CameraError::AcquisitionTimeout(self.timeout))?;
        let timestamp = now_timestamp();

        if !result.succeeded {
            return Err(CameraError::Acquisition(format!(
                "grab on '{}' failed: {}",
                self.info.user_defined_name, result.error_description
            )));
        }

        convert_to_bgr8(
            result.pixel_format,
            result.width,
            result.height,
            &result.buffer,
            &mut self.converted,
        )?;
        // One copy per frame: the conversion buffer is overwritten next call.
        let image = Image::from_vec(
            result.width,
            result.height,
            PixelLayout::Bgr8,
            self.converted.clone(),
        )
        .ok_or_else(|| CameraError::Acquisition("converted buffer has wrong length".to_string()))?;

        Ok(Observation::new(image, timestamp))
    }
}

impl<S: GrabberSdk> Drop for FrameGrabberBackend<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::grabber::api::{GrabResult, GrabStrategy};
    use crate::camera::grabber::mock::MockGrabberSdk;
    use crate::imaging::convert::RawPixelFormat;

    fn config() -> GrabberConfig {
        GrabberConfig {
            retrieve_timeout_ms: 50,
            ..GrabberConfig::default()
        }
    }

    fn rgb_frame(width: u32, height: u32, rgb: [u8; 3]) -> GrabResult {
        let buffer = rgb.repeat((width * height) as usize);
        GrabResult::success(width, height, RawPixelFormat::Rgb8Packed, buffer)
    }

    #[test]
    fn zero_devices_fails_with_no_devices() {
        let ctx = SdkContext::new(MockGrabberSdk::new());
        let err = FrameGrabberBackend::new(&ctx, "camera60", &config())
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::NoDevices));
        assert_eq!(ctx.users(), 0);
        assert_eq!(ctx.api().terminate_count(), 1);
    }

    #[test]
    fn unknown_identifier_fails_without_fallback() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(2));
        let err = FrameGrabberBackend::new(&ctx, "camera999", &config())
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::DeviceNotFound(id) if id == "camera999"));
        assert!(!ctx.api().is_open(0));
        assert!(!ctx.api().is_open(1));
        assert_eq!(ctx.users(), 0);
    }

    #[test]
    fn empty_identifier_binds_and_streams_first_device() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(3));
        let backend = FrameGrabberBackend::new(&ctx, "", &config()).unwrap();

        assert_eq!(backend.device_info().user_defined_name, "camera0");
        assert_eq!(backend.state(), GrabberState::Streaming);
        assert!(ctx.api().is_open(0));
        assert_eq!(
            ctx.api().strategy(0),
            Some(GrabStrategy::LatestImageOnly)
        );
    }

    #[test]
    fn matched_identifier_applies_configuration() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(3));
        let _backend = FrameGrabberBackend::new(&ctx, "camera2", &config()).unwrap();

        let api = ctx.api();
        assert!(api.is_open(2));
        assert_eq!(api.max_buffers(2), Some(5));
        assert_eq!(api.output_format(2), Some(RawPixelFormat::Bgr8Packed));
        assert_eq!(api.float_node(2, nodes::EXPOSURE_TIME), Some(1500.0));
        assert_eq!(api.float_node(2, nodes::ACQUISITION_FRAME_RATE), Some(100.0));
        assert_eq!(
            api.enum_node(2, nodes::BALANCE_WHITE_AUTO).as_deref(),
            Some("Once")
        );
        assert_eq!(api.strategy(2), Some(GrabStrategy::LatestImageOnly));
    }

    #[test]
    fn configuration_failure_closes_device_and_releases_sdk() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(1).with_error(
            "set_float",
            CameraError::Sdk("node not writable".to_string()),
        ));
        let err = FrameGrabberBackend::new(&ctx, "camera0", &config())
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::Sdk(_)));
        assert!(!ctx.api().is_open(0));
        assert_eq!(ctx.users(), 0);
    }

    #[test]
    fn observation_is_converted_to_bgr_and_timestamped_after_call_start() {
        let ctx = SdkContext::new(
            MockGrabberSdk::new()
                .with_devices(1)
                .with_result(0, rgb_frame(4, 2, [1, 2, 3]))
                .with_retrieve_delay(Duration::from_millis(2)),
        );
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        let before = now_timestamp();
        let obs = backend.get_observation().unwrap();

        assert!(obs.timestamp > before);
        assert_eq!((obs.image.width(), obs.image.height()), (4, 2));
        assert_eq!(obs.image.layout(), PixelLayout::Bgr8);
        assert_eq!(&obs.image.data()[..3], &[3, 2, 1]);
    }

    #[test]
    fn observation_owns_its_pixels() {
        let ctx = SdkContext::new(
            MockGrabberSdk::new()
                .with_devices(1)
                .with_result(0, rgb_frame(2, 2, [10, 10, 10]))
                .with_result(0, rgb_frame(2, 2, [99, 99, 99])),
        );
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        let first = backend.get_observation().unwrap();
        let second = backend.get_observation().unwrap();
        assert!(first.image.data().iter().all(|&v| v == 10));
        assert!(second.image.data().iter().all(|&v| v == 99));
    }

    #[test]
    fn expired_wait_is_timeout_and_backend_stays_usable() {
        let ctx = SdkContext::new(
            MockGrabberSdk::new()
                .with_devices(1)
                .with_timeout(0)
                .with_continuous_frames(2, 2),
        );
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        let err = backend.get_observation().unwrap_err();
        assert!(matches!(err, CameraError::AcquisitionTimeout(d) if d == Duration::from_millis(50)));
        assert!(backend.get_observation().is_ok());
    }

    #[test]
    fn failed_grab_is_acquisition_error() {
        let ctx = SdkContext::new(
            MockGrabberSdk::new()
                .with_devices(1)
                .with_result(0, GrabResult::failure("payload incomplete")),
        );
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        let err = backend.get_observation().unwrap_err();
        assert!(matches!(err, CameraError::Acquisition(msg) if msg.contains("payload incomplete")));
    }

    #[test]
    fn sdk_retrieve_error_is_acquisition_error() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(1).with_error(
            "retrieve_result",
            CameraError::Sdk("device removed".to_string()),
        ));
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();
        assert!(matches!(
            backend.get_observation(),
            Err(CameraError::Acquisition(_))
        ));
    }

    #[test]
    fn closed_backend_refuses_observations() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(1).with_continuous_frames(1, 1));
        let mut backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        backend.close();
        backend.close();
        assert_eq!(backend.state(), GrabberState::Closed);
        assert!(matches!(
            backend.get_observation(),
            Err(CameraError::Acquisition(_))
        ));
        assert!(!ctx.api().is_open(0));
        // Lease is held until the backend itself is dropped.
        assert_eq!(ctx.users(), 1);
    }

    #[test]
    fn drop_stops_grabbing_closes_device_and_terminates_sdk() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(1));
        let backend = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();
        drop(backend);

        assert!(!ctx.api().is_open(0));
        assert_eq!(ctx.api().strategy(0), None);
        assert_eq!(ctx.users(), 0);
        assert_eq!(ctx.api().terminate_count(), 1);
    }

    #[test]
    fn sibling_backends_share_one_initialisation() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(2));
        let a = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();
        let b = FrameGrabberBackend::new(&ctx, "camera1", &config()).unwrap();
        assert_eq!(ctx.api().init_count(), 1);

        drop(a);
        assert_eq!(ctx.api().terminate_count(), 0);
        drop(b);
        assert_eq!(ctx.api().terminate_count(), 1);
    }

    #[test]
    fn device_already_held_is_refused_before_opening() {
        let ctx = SdkContext::new(MockGrabberSdk::new().with_devices(1));
        let first = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();

        let err = FrameGrabberBackend::new(&ctx, "", &config()).err().unwrap();
        assert!(matches!(err, CameraError::Sdk(_)));
        assert_eq!(ctx.api().open_count(0), 1);
        assert_eq!(first.state(), GrabberState::Streaming);
        assert_eq!(ctx.users(), 1);

        drop(first);
        assert!(!ctx.is_bound(DeviceHandle(0)));
        let again = FrameGrabberBackend::new(&ctx, "camera0", &config()).unwrap();
        assert_eq!(again.state(), GrabberState::Streaming);
    }

    #[test]
    fn backend_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<FrameGrabberBackend<MockGrabberSdk>>();
    }
}
