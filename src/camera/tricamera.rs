//! Synchronised acquisition from three cameras.
//!
//! One call grabs the latest frame of each camera, assembles the triple and
//! then holds the return back until the pacing period has elapsed since the
//! call began. Each camera grabs in latest-only mode, so pacing the caller
//! to the sensors' native rate keeps every triple fresh without throttling
//! below that rate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::camera::backend::SensorDriver;
use crate::camera::error::{CameraError, Result};
use crate::camera::grabber::api::GrabberSdk;
use crate::camera::grabber::backend::FrameGrabberBackend;
use crate::camera::grabber::sdk::SdkContext;
use crate::camera::pacing::Pacer;
use crate::camera::types::{Observation, TriObservation, NUM_CAMERAS};
use crate::diagnostics::stats::AcquisitionStats;
use crate::imaging::resize::downsample_half;
use crate::settings::types::{GrabberConfig, TriCameraConfig};

/// Composes three single-camera drivers into one paced triple source.
pub struct TriCameraDriver<D> {
    cameras: [D; NUM_CAMERAS],
    downsample: bool,
    pacer: Pacer,
    stats: AcquisitionStats,
}

impl<D> TriCameraDriver<D>
where
    D: SensorDriver<Observation = Observation> + Send,
{
    /// Compose already constructed drivers, paced at the default period.
    pub fn from_drivers(cameras: [D; NUM_CAMERAS], downsample: bool) -> Self {
        Self {
            cameras,
            downsample,
            pacer: Pacer::default(),
            stats: AcquisitionStats::new(),
        }
    }

    /// Replace the pacing period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.pacer = Pacer::new(period);
        self
    }

    pub fn period(&self) -> Duration {
        self.pacer.period()
    }

    pub fn downsample(&self) -> bool {
        self.downsample
    }

    pub fn cameras(&self) -> &[D; NUM_CAMERAS] {
        &self.cameras
    }

    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    /// Grab from all cameras concurrently and wait for every one of them.
    ///
    /// On failure the error of the first failing camera, in camera order,
    /// is returned.
    fn fetch_all(&mut self) -> Result<Vec<Observation>> {
        let results: Vec<Result<Observation>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .cameras
                .iter_mut()
                .map(|camera| scope.spawn(move || camera.get_observation()))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(CameraError::Acquisition("camera thread panicked".to_string()))
                    })
                })
                .collect()
        });

        for (index, result) in results.iter().enumerate() {
            if let Err(e) = result {
                tracing::warn!("camera {index} failed: {e}");
            }
        }
        results.into_iter().collect()
    }

    fn assemble(&self, mut observations: Vec<Observation>) -> Result<TriObservation> {
        if self.downsample {
            for obs in &mut observations {
                obs.image = downsample_half(&obs.image)?;
            }
        }
        let cameras: [Observation; NUM_CAMERAS] = observations
            .try_into()
            .map_err(|_| CameraError::Acquisition("incomplete camera triple".to_string()))?;
        Ok(TriObservation { cameras })
    }
}

impl<D> SensorDriver for TriCameraDriver<D>
where
    D: SensorDriver<Observation = Observation> + Send,
{
    type Observation = TriObservation;

    fn get_observation(&mut self) -> Result<TriObservation> {
        let start = Instant::now();
        let assembled = self
            .fetch_all()
            .and_then(|observations| self.assemble(observations));

        match assembled {
            Ok(tri) => {
                let overran = self.pacer.pace(start);
                if overran {
                    tracing::debug!(
                        "acquisition took {:?}, longer than the {:?} period",
                        start.elapsed(),
                        self.pacer.period()
                    );
                }
                self.stats
                    .record_observation(start, tri.timestamp_spread(), overran);
                Ok(tri)
            }
            Err(e) => {
                self.stats.record_failure(start, e.kind());
                Err(e)
            }
        }
    }
}

impl<S: GrabberSdk> TriCameraDriver<FrameGrabberBackend<S>> {
    /// Bind one frame-grabber backend per device identifier with the default
    /// acquisition settings.
    ///
    /// Construction is all-or-nothing: if any backend fails, the ones
    /// already built are closed before the error is returned.
    pub fn new(
        ctx: &Arc<SdkContext<S>>,
        device_ids: [&str; NUM_CAMERAS],
        downsample: bool,
    ) -> Result<Self> {
        let cameras = open_backends(ctx, device_ids, &GrabberConfig::default())?;
        Ok(Self::from_drivers(cameras, downsample))
    }

    /// Same as [`TriCameraDriver::new`], with every setting taken from
    /// `config`.
    pub fn from_config(ctx: &Arc<SdkContext<S>>, config: &TriCameraConfig) -> Result<Self> {
        let [a, b, c] = &config.device_ids;
        let cameras = open_backends(ctx, [a.as_str(), b.as_str(), c.as_str()], &config.grabber)?;
        Ok(Self::from_drivers(cameras, config.downsample).with_period(config.period()))
    }

    /// Stop streaming on all three devices and release them.
    pub fn close(&mut self) {
        for camera in &mut self.cameras {
            camera.close();
        }
    }
}

fn open_backends<S: GrabberSdk>(
    ctx: &Arc<SdkContext<S>>,
    device_ids: [&str; NUM_CAMERAS],
    config: &GrabberConfig,
) -> Result<[FrameGrabberBackend<S>; NUM_CAMERAS]> {
    let [first, second, third] = device_ids;
    let first = FrameGrabberBackend::new(ctx, first, config)?;
    let second = FrameGrabberBackend::new(ctx, second, config)?;
    let third = FrameGrabberBackend::new(ctx, third, config)?;
    tracing::info!(
        "tri-camera bound to '{}', '{}', '{}'",
        first.device_info().user_defined_name,
        second.device_info().user_defined_name,
        third.device_info().user_defined_name
    );
    Ok([first, second, third])
}
