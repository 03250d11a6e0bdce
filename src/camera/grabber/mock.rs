//! Mock frame-grabber SDK for testing without hardware.
//!
//! Uses a builder pattern to configure devices, scripted grab results,
//! retrieval delay and error injection.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;

use crate::camera::error::{CameraError, Result};
use crate::imaging::convert::RawPixelFormat;

use super::api::{DeviceHandle, DeviceInfo, GrabResult, GrabStrategy, GrabberSdk};

/// One scripted outcome of `retrieve_result`.
#[derive(Debug, Clone)]
enum MockGrab {
    Result(GrabResult),
    /// Reported as an expired wait without actually sleeping.
    Timeout,
}

/// A simulated device in the mock.
#[derive(Debug, Clone)]
struct MockDevice {
    info: DeviceInfo,
    open: bool,
    strategy: Option<GrabStrategy>,
    max_buffers: Option<usize>,
    output_format: Option<RawPixelFormat>,
    float_nodes: HashMap<String, f64>,
    enum_nodes: HashMap<String, String>,
    script: VecDeque<MockGrab>,
    retrieved: u32,
    opened_total: u32,
}

/// Configurable error injection for a specific operation.
#[derive(Debug, Clone)]
struct ErrorInjection {
    operation: &'static str,
    device: Option<usize>,
    error: CameraError,
}

/// Mock SDK implementation.
///
/// All state is behind a `Mutex` so the mock satisfies `Send + Sync`.
pub struct MockGrabberSdk {
    state: Mutex<MockState>,
}

#[derive(Debug)]
struct MockState {
    devices: Vec<MockDevice>,
    continuous: Option<GrabResult>,
    retrieve_delay: Duration,
    error_injections: Vec<ErrorInjection>,
    init_count: u32,
    terminate_count: u32,
}

impl Default for MockGrabberSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGrabberSdk {
    /// Create a new empty mock (no devices).
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                devices: Vec::new(),
                continuous: None,
                retrieve_delay: Duration::ZERO,
                error_injections: Vec::new(),
                init_count: 0,
                terminate_count: 0,
            }),
        }
    }

    /// Add a device with the given user-defined name.
    pub fn with_device(self, user_defined_name: &str) -> Self {
        {
            let mut state = self.state.lock();
            let serial = format!("MOCK{:04}", state.devices.len() + 1);
            state.devices.push(MockDevice {
                info: DeviceInfo {
                    user_defined_name: user_defined_name.to_string(),
                    model_name: "Mock Grabber".to_string(),
                    serial_number: serial,
                },
                open: false,
                strategy: None,
                max_buffers: None,
                output_format: None,
                float_nodes: HashMap::new(),
                enum_nodes: HashMap::new(),
                script: VecDeque::new(),
                retrieved: 0,
                opened_total: 0,
            });
        }
        self
    }

    /// Add devices named `camera0`, `camera1`, ...
    pub fn with_devices(self, count: usize) -> Self {
        let mut result = self;
        for i in 0..count {
            result = result.with_device(&format!("camera{i}"));
        }
        result
    }

    /// Queue a grab result for the device at `device_idx`.
    pub fn with_result(self, device_idx: usize, result: GrabResult) -> Self {
        self.push_script(device_idx, MockGrab::Result(result))
    }

    /// Queue an expired wait for the device at `device_idx`.
    pub fn with_timeout(self, device_idx: usize) -> Self {
        self.push_script(device_idx, MockGrab::Timeout)
    }

    /// Deliver a uniform BGR frame whenever a device's script is empty.
    pub fn with_continuous_frames(self, width: u32, height: u32) -> Self {
        {
            let len = width as usize * height as usize * 3;
            self.state.lock().continuous = Some(GrabResult::success(
                width,
                height,
                RawPixelFormat::Bgr8Packed,
                vec![0x80; len],
            ));
        }
        self
    }

    /// Block every `retrieve_result` call for `delay` (capped at its timeout).
    pub fn with_retrieve_delay(self, delay: Duration) -> Self {
        self.state.lock().retrieve_delay = delay;
        self
    }

    /// Inject an error for a specific operation name on any device.
    ///
    /// Operation names match the `GrabberSdk` method names. Each injection
    /// fires once.
    pub fn with_error(self, operation: &'static str, error: CameraError) -> Self {
        self.inject(operation, None, error)
    }

    /// Inject an error for an operation on one device only.
    pub fn with_device_error(
        self,
        device_idx: usize,
        operation: &'static str,
        error: CameraError,
    ) -> Self {
        self.inject(operation, Some(device_idx), error)
    }

    fn inject(self, operation: &'static str, device: Option<usize>, error: CameraError) -> Self {
        self.state.lock().error_injections.push(ErrorInjection {
            operation,
            device,
            error,
        });
        self
    }

    fn push_script(self, device_idx: usize, grab: MockGrab) -> Self {
        if let Some(dev) = self.state.lock().devices.get_mut(device_idx) {
            dev.script.push_back(grab);
        }
        self
    }

    pub fn init_count(&self) -> u32 {
        self.state.lock().init_count
    }

    pub fn terminate_count(&self) -> u32 {
        self.state.lock().terminate_count
    }

    pub fn is_open(&self, device_idx: usize) -> bool {
        self.state
            .lock()
            .devices
            .get(device_idx)
            .is_some_and(|d| d.open)
    }

    /// How many times the device has been opened in total.
    pub fn open_count(&self, device_idx: usize) -> u32 {
        self.state
            .lock()
            .devices
            .get(device_idx)
            .map_or(0, |d| d.opened_total)
    }

    /// Active grab strategy, `None` when not grabbing.
    pub fn strategy(&self, device_idx: usize) -> Option<GrabStrategy> {
        self.state.lock().devices.get(device_idx)?.strategy
    }

    pub fn max_buffers(&self, device_idx: usize) -> Option<usize> {
        self.state.lock().devices.get(device_idx)?.max_buffers
    }

    pub fn output_format(&self, device_idx: usize) -> Option<RawPixelFormat> {
        self.state.lock().devices.get(device_idx)?.output_format
    }

    pub fn float_node(&self, device_idx: usize, node: &str) -> Option<f64> {
        let state = self.state.lock();
        state.devices.get(device_idx)?.float_nodes.get(node).copied()
    }

    pub fn enum_node(&self, device_idx: usize, node: &str) -> Option<String> {
        let state = self.state.lock();
        state.devices.get(device_idx)?.enum_nodes.get(node).cloned()
    }

    /// Number of `retrieve_result` calls that reached the device.
    pub fn retrieved(&self, device_idx: usize) -> u32 {
        self.state
            .lock()
            .devices
            .get(device_idx)
            .map_or(0, |d| d.retrieved)
    }
}

impl MockState {
    /// Check for injected errors for the given operation.
    fn check_error(&mut self, operation: &str, device: Option<DeviceHandle>) -> Result<()> {
        let device = device.map(|d| d.0);
        if let Some(pos) = self.error_injections.iter().position(|e| {
            e.operation == operation && (e.device.is_none() || e.device == device)
        }) {
            let injection = self.error_injections.remove(pos);
            return Err(injection.error);
        }
        Ok(())
    }

    fn device_mut(&mut self, handle: DeviceHandle) -> Result<&mut MockDevice> {
        self.devices
            .get_mut(handle.0)
            .ok_or_else(|| CameraError::DeviceNotFound(format!("mock device {}", handle.0)))
    }

    fn open_device_mut(&mut self, handle: DeviceHandle) -> Result<&mut MockDevice> {
        let dev = self.device_mut(handle)?;
        if !dev.open {
            return Err(CameraError::Sdk(format!("device {} is not open", handle.0)));
        }
        Ok(dev)
    }
}

impl GrabberSdk for MockGrabberSdk {
    fn initialize(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("initialize", None)?;
        state.init_count += 1;
        Ok(())
    }

    fn terminate(&self) {
        self.state.lock().terminate_count += 1;
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut state = self.state.lock();
        state.check_error("enumerate_devices", None)?;
        Ok(state.devices.iter().map(|d| d.info.clone()).collect())
    }

    fn open(&self, device: DeviceHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("open", Some(device))?;
        let dev = state.device_mut(device)?;
        if dev.open {
            return Err(CameraError::Sdk(format!(
                "device {} is already open",
                device.0
            )));
        }
        dev.open = true;
        dev.opened_total += 1;
        Ok(())
    }

    fn close(&self, device: DeviceHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("close", Some(device))?;
        let dev = state.device_mut(device)?;
        dev.open = false;
        dev.strategy = None;
        Ok(())
    }

    fn set_max_buffers(&self, device: DeviceHandle, count: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("set_max_buffers", Some(device))?;
        state.open_device_mut(device)?.max_buffers = Some(count);
        Ok(())
    }

    fn set_output_format(&self, device: DeviceHandle, format: RawPixelFormat) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("set_output_format", Some(device))?;
        state.open_device_mut(device)?.output_format = Some(format);
        Ok(())
    }

    fn set_float(&self, device: DeviceHandle, node: &str, value: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("set_float", Some(device))?;
        state
            .open_device_mut(device)?
            .float_nodes
            .insert(node.to_string(), value);
        Ok(())
    }

    fn set_enum(&self, device: DeviceHandle, node: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("set_enum", Some(device))?;
        state
            .open_device_mut(device)?
            .enum_nodes
            .insert(node.to_string(), value.to_string());
        Ok(())
    }

    fn start_grabbing(&self, device: DeviceHandle, strategy: GrabStrategy) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("start_grabbing", Some(device))?;
        state.open_device_mut(device)?.strategy = Some(strategy);
        Ok(())
    }

    fn stop_grabbing(&self, device: DeviceHandle) -> Result<()> {
        let mut state = self.state.lock();
        state.check_error("stop_grabbing", Some(device))?;
        state.device_mut(device)?.strategy = None;
        Ok(())
    }

    fn retrieve_result(
        &self,
        device: DeviceHandle,
        timeout: Duration,
    ) -> Result<Option<GrabResult>> {
        let delay = {
            let mut state = self.state.lock();
            state.check_error("retrieve_result", Some(device))?;
            if state.open_device_mut(device)?.strategy.is_none() {
                return Err(CameraError::Sdk(format!(
                    "device {} is not grabbing",
                    device.0
                )));
            }
            state.retrieve_delay
        };

        if !delay.is_zero() {
            std::thread::sleep(delay.min(timeout));
        }

        let mut state = self.state.lock();
        let continuous = state.continuous.clone();
        let dev = state.device_mut(device)?;
        dev.retrieved += 1;
        match dev.script.pop_front() {
            Some(MockGrab::Result(result)) => Ok(Some(result)),
            Some(MockGrab::Timeout) => Ok(None),
            None => Ok(continuous),
        }
    }
}
