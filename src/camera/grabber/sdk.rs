//! Process-wide SDK lifetime with lease-based RAII.
//!
//! Every backend holds an `SdkLease`. The first lease initialises the SDK and
//! the last one to drop terminates it, on every exit path including a failed
//! construction. The context also records which devices are bound, so no two
//! backends drive the same device whatever the vendor binding allows.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::camera::error::{CameraError, Result};

use super::api::{DeviceHandle, GrabberSdk};

/// Shared SDK instance plus the number of live leases.
///
/// Create one per process (per SDK) and hand clones of the `Arc` to every
/// backend.
pub struct SdkContext<S: GrabberSdk> {
    api: S,
    users: Mutex<usize>,
    bound: Mutex<HashSet<DeviceHandle>>,
}

impl<S: GrabberSdk> SdkContext<S> {
    pub fn new(api: S) -> Arc<Self> {
        Arc::new(Self {
            api,
            users: Mutex::new(0),
            bound: Mutex::new(HashSet::new()),
        })
    }

    /// Take a lease, initialising the SDK if this is the first one.
    ///
    /// # Errors
    ///
    /// Propagates the SDK's `initialize` failure; the user count is left
    /// unchanged in that case.
    pub fn acquire(self: &Arc<Self>) -> Result<SdkLease<S>> {
        let mut users = self.users.lock();
        if *users == 0 {
            self.api.initialize()?;
            tracing::debug!("frame-grabber SDK initialised");
        }
        *users += 1;
        Ok(SdkLease {
            ctx: Arc::clone(self),
        })
    }

    /// Number of live leases.
    pub fn users(&self) -> usize {
        *self.users.lock()
    }

    /// Whether a backend currently holds `device`.
    pub fn is_bound(&self, device: DeviceHandle) -> bool {
        self.bound.lock().contains(&device)
    }

    /// Direct access to the SDK, bypassing lease accounting.
    pub fn api(&self) -> &S {
        &self.api
    }
}

/// Proof that the SDK is initialised. Dereferences to the SDK.
pub struct SdkLease<S: GrabberSdk> {
    ctx: Arc<SdkContext<S>>,
}

impl<S: GrabberSdk> SdkLease<S> {
    /// Reserve `device` for the lease holder.
    ///
    /// # Errors
    ///
    /// `Sdk` if another backend already holds the device.
    pub fn bind(&self, device: DeviceHandle) -> Result<()> {
        if !self.ctx.bound.lock().insert(device) {
            return Err(CameraError::Sdk(format!(
                "device {} is already bound to another backend",
                device.0
            )));
        }
        Ok(())
    }

    /// Give `device` back. Unbinding a device that is not bound is a no-op.
    pub fn unbind(&self, device: DeviceHandle) {
        self.ctx.bound.lock().remove(&device);
    }
}

impl<S: GrabberSdk> Deref for SdkLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.ctx.api
    }
}

impl<S: GrabberSdk> Drop for SdkLease<S> {
    fn drop(&mut self) {
        let mut users = self.ctx.users.lock();
        *users -= 1;
        if *users == 0 {
            self.ctx.api.terminate();
            tracing::debug!("frame-grabber SDK terminated");
        }
    }
}
