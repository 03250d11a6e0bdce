//! Simulated frame-grabber SDK.
//!
//! Each device free-runs a producer thread at its configured acquisition
//! frame rate, pushing synthetic frames into a `GrabQueue` that honours the
//! requested grab strategy. Every pixel of frame `n` has the value `n % 256`,
//! which lets tests tell fresh frames from stale ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::camera::error::{CameraError, Result};
use crate::imaging::convert::RawPixelFormat;

use super::api::{nodes, DeviceHandle, DeviceInfo, GrabResult, GrabStrategy, GrabberSdk};
use super::queue::GrabQueue;

const DEFAULT_WIDTH: u32 = 720;
const DEFAULT_HEIGHT: u32 = 540;
const DEFAULT_FRAME_RATE_HZ: f64 = 100.0;
const DEFAULT_MAX_BUFFERS: usize = 10;

/// Simulated SDK exposing a fixed list of named devices.
pub struct SimulatedGrabberSdk {
    width: u32,
    height: u32,
    state: Mutex<Vec<SimDevice>>,
}

struct SimDevice {
    info: DeviceInfo,
    open: bool,
    max_buffers: usize,
    frame_rate_hz: f64,
    format: RawPixelFormat,
    session: Option<GrabSession>,
}

/// Running producer thread for one device.
struct GrabSession {
    queue: Arc<GrabQueue>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl GrabSession {
    fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl SimulatedGrabberSdk {
    /// Create devices with the given user-defined names.
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let devices = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| SimDevice {
                info: DeviceInfo {
                    user_defined_name: name.into(),
                    model_name: "Simulated Grabber".to_string(),
                    serial_number: format!("SIM{:04}", i + 1),
                },
                open: false,
                max_buffers: DEFAULT_MAX_BUFFERS,
                frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
                format: RawPixelFormat::BayerRg8,
                session: None,
            })
            .collect();
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            state: Mutex::new(devices),
        }
    }

    /// Override the sensor resolution of every device.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Frames produced so far by a grabbing device.
    pub fn frames_produced(&self, device: DeviceHandle) -> u64 {
        self.state
            .lock()
            .get(device.0)
            .and_then(|d| d.session.as_ref())
            .map_or(0, |s| s.queue.produced())
    }

    /// Frames discarded before delivery by a grabbing device.
    pub fn frames_dropped(&self, device: DeviceHandle) -> u64 {
        self.state
            .lock()
            .get(device.0)
            .and_then(|d| d.session.as_ref())
            .map_or(0, |s| s.queue.dropped())
    }

    fn with_open_device<T>(
        &self,
        device: DeviceHandle,
        f: impl FnOnce(&mut SimDevice) -> T,
    ) -> Result<T> {
        let mut devices = self.state.lock();
        let dev = devices
            .get_mut(device.0)
            .ok_or_else(|| CameraError::DeviceNotFound(format!("simulated device {}", device.0)))?;
        if !dev.open {
            return Err(CameraError::Sdk(format!("device {} is not open", device.0)));
        }
        Ok(f(dev))
    }
}

impl GrabberSdk for SimulatedGrabberSdk {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn terminate(&self) {}

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.state.lock().iter().map(|d| d.info.clone()).collect())
    }

    fn open(&self, device: DeviceHandle) -> Result<()> {
        let mut devices = self.state.lock();
        let dev = devices
            .get_mut(device.0)
            .ok_or_else(|| CameraError::DeviceNotFound(format!("simulated device {}", device.0)))?;
        if dev.open {
            return Err(CameraError::Sdk(format!(
                "device '{}' is already open",
                dev.info.user_defined_name
            )));
        }
        dev.open = true;
        Ok(())
    }

    fn close(&self, device: DeviceHandle) -> Result<()> {
        let session = {
            let mut devices = self.state.lock();
            match devices.get_mut(device.0) {
                Some(dev) => {
                    dev.open = false;
                    dev.session.take()
                }
                None => None,
            }
        };
        if let Some(session) = session {
            session.stop();
        }
        Ok(())
    }

    fn set_max_buffers(&self, device: DeviceHandle, count: usize) -> Result<()> {
        self.with_open_device(device, |d| d.max_buffers = count)
    }

    fn set_output_format(&self, device: DeviceHandle, format: RawPixelFormat) -> Result<()> {
        self.with_open_device(device, |d| d.format = format)
    }

    fn set_float(&self, device: DeviceHandle, node: &str, value: f64) -> Result<()> {
        let frame_rate = node == nodes::ACQUISITION_FRAME_RATE;
        if frame_rate && !(value.is_finite() && value > 0.0) {
            return Err(CameraError::Sdk(format!("{node} out of range: {value}")));
        }
        self.with_open_device(device, |d| {
            if frame_rate {
                d.frame_rate_hz = value;
            }
        })
    }

    fn set_enum(&self, device: DeviceHandle, _node: &str, _value: &str) -> Result<()> {
        self.with_open_device(device, |_| ())
    }

    fn start_grabbing(&self, device: DeviceHandle, strategy: GrabStrategy) -> Result<()> {
        let (width, height) = (self.width, self.height);
        let mut devices = self.state.lock();
        let dev = devices
            .get_mut(device.0)
            .filter(|d| d.open)
            .ok_or_else(|| CameraError::Sdk(format!("device {} is not open", device.0)))?;
        if dev.session.is_some() {
            return Ok(());
        }

        let queue = Arc::new(GrabQueue::new(strategy, dev.max_buffers));
        let running = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_secs_f64(1.0 / dev.frame_rate_hz);
        let format = dev.format;

        let thread = {
            let queue = Arc::clone(&queue);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name(format!("sim-grab-{}", device.0))
                .spawn(move || {
                    produce_frames(&queue, &running, interval, width, height, format);
                })
                .map_err(|e| CameraError::Sdk(format!("failed to spawn grab thread: {e}")))?
        };

        dev.session = Some(GrabSession {
            queue,
            running,
            thread: Some(thread),
        });
        Ok(())
    }

    fn stop_grabbing(&self, device: DeviceHandle) -> Result<()> {
        let session = self
            .state
            .lock()
            .get_mut(device.0)
            .and_then(|d| d.session.take());
        if let Some(session) = session {
            session.stop();
        }
        Ok(())
    }

    fn retrieve_result(
        &self,
        device: DeviceHandle,
        timeout: Duration,
    ) -> Result<Option<GrabResult>> {
        let queue = self
            .state
            .lock()
            .get(device.0)
            .and_then(|d| d.session.as_ref())
            .map(|s| Arc::clone(&s.queue))
            .ok_or_else(|| CameraError::Sdk(format!("device {} is not grabbing", device.0)))?;
        Ok(queue.pop(timeout))
    }
}

impl Drop for SimulatedGrabberSdk {
    fn drop(&mut self) {
        let sessions: Vec<_> = self
            .state
            .get_mut()
            .iter_mut()
            .filter_map(|d| d.session.take())
            .collect();
        for session in sessions {
            session.stop();
        }
    }
}

/// Producer loop that runs on the grab thread.
fn produce_frames(
    queue: &GrabQueue,
    running: &AtomicBool,
    interval: Duration,
    width: u32,
    height: u32,
    format: RawPixelFormat,
) {
    let len = width as usize * height as usize * format.bytes_per_pixel();
    let mut seq: u64 = 0;
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        queue.push(GrabResult::success(
            width,
            height,
            format,
            vec![(seq % 256) as u8; len],
        ));
        seq += 1;
    }
}
