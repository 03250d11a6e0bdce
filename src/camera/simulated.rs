//! Tri-camera driver for simulated environments.
//!
//! A [`TriImageSource`] hands over three raw single-channel (Bayer) frames per
//! call; how it renders them is up to the simulator. The driver stamps them,
//! optionally halves them and paces the return like the hardware driver.

use std::time::{Duration, Instant};

use crate::camera::backend::{now_timestamp, SensorDriver};
use crate::camera::error::Result;
use crate::camera::pacing::Pacer;
use crate::camera::types::{
    Image, Observation, PixelLayout, TriObservation, DEFAULT_HEIGHT, DEFAULT_WIDTH, NUM_CAMERAS,
};
use crate::diagnostics::stats::AcquisitionStats;
use crate::imaging::resize::{decimate_bayer_half, downsample_half};

/// Producer of three simulated camera frames.
pub trait TriImageSource {
    fn fetch_images(&mut self) -> Result<[Image; NUM_CAMERAS]>;
}

/// Synthetic source rendering a diagonal ramp that shifts by one step per
/// frame. Each camera is offset so the three images differ.
#[derive(Debug, Clone)]
pub struct PatternSource {
    width: u32,
    height: u32,
    frame: u64,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: 0,
        }
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn render(&self, camera: usize) -> Image {
        let shift = self.frame + camera as u64 * 85;
        let data = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x as u64 + y as u64 + shift) % 256))
            .map(|v| v as u8)
            .collect();
        Image::from_vec(self.width, self.height, PixelLayout::Mono8, data)
            .unwrap_or_else(|| Image::zeros(self.width, self.height, PixelLayout::Mono8))
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl TriImageSource for PatternSource {
    fn fetch_images(&mut self) -> Result<[Image; NUM_CAMERAS]> {
        let images = [self.render(0), self.render(1), self.render(2)];
        self.frame += 1;
        Ok(images)
    }
}

/// Paced tri-camera driver over a [`TriImageSource`].
pub struct SimulatedTriCameraDriver<R> {
    source: R,
    downsample: bool,
    pacer: Pacer,
    stats: AcquisitionStats,
}

impl<R: TriImageSource> SimulatedTriCameraDriver<R> {
    /// Wrap `source`, paced at the default period. Raw frames are passed on
    /// unscaled unless `downsample` is set, in which case single-channel
    /// mosaics drop every other 2x2 cell instead of being averaged.
    pub fn new(source: R, downsample: bool) -> Self {
        Self {
            source,
            downsample,
            pacer: Pacer::default(),
            stats: AcquisitionStats::new(),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.pacer = Pacer::new(period);
        self
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    fn acquire(&mut self) -> Result<TriObservation> {
        let images = self.source.fetch_images()?;
        let timestamp = now_timestamp();
        let mut tri = TriObservation {
            cameras: images.map(|image| Observation::new(image, timestamp)),
        };
        if self.downsample {
            for obs in &mut tri.cameras {
                obs.image = match obs.image.layout() {
                    PixelLayout::Mono8 => decimate_bayer_half(&obs.image)?,
                    PixelLayout::Bgr8 => downsample_half(&obs.image)?,
                };
            }
        }
        Ok(tri)
    }
}

impl<R: TriImageSource> SensorDriver for SimulatedTriCameraDriver<R> {
    type Observation = TriObservation;

    fn get_observation(&mut self) -> Result<TriObservation> {
        let start = Instant::now();
        match self.acquire() {
            Ok(tri) => {
                let overran = self.pacer.pace(start);
                self.stats.record_observation(start, 0.0, overran);
                Ok(tri)
            }
            Err(e) => {
                tracing::warn!("simulated cameras failed: {e}");
                self.stats.record_failure(start, e.kind());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::error::{CameraError, ErrorKind};
    use crate::imaging::convert::{convert_to_bgr8, RawPixelFormat};

    /// Uniformly coloured RGGB mosaic on every camera.
    struct SolidBayerSource {
        red: u8,
        green: u8,
        blue: u8,
    }

    impl TriImageSource for SolidBayerSource {
        fn fetch_images(&mut self) -> Result<[Image; NUM_CAMERAS]> {
            let (red, green, blue) = (self.red, self.green, self.blue);
            let data = (0..4)
                .flat_map(|y| {
                    (0..4).map(move |x| match (y % 2, x % 2) {
                        (0, 0) => red,
                        (1, 1) => blue,
                        _ => green,
                    })
                })
                .collect::<Vec<u8>>();
            let image = Image::from_vec(4, 4, PixelLayout::Mono8, data).unwrap();
            Ok([image.clone(), image.clone(), image])
        }
    }

    struct FailingSource;

    impl TriImageSource for FailingSource {
        fn fetch_images(&mut self) -> Result<[Image; NUM_CAMERAS]> {
            Err(CameraError::Acquisition("renderer unavailable".to_string()))
        }
    }

    #[test]
    fn pattern_images_differ_per_camera_and_frame() {
        let mut source = PatternSource::new(6, 4);
        let first = source.fetch_images().unwrap();
        let second = source.fetch_images().unwrap();
        assert_ne!(first[0].data(), first[1].data());
        assert_eq!(first[0].data()[0], 0);
        assert_eq!(second[0].data()[0], 1);
        assert_eq!(first[1].data()[0], 85);
        assert_eq!(source.frame(), 2);
    }

    #[test]
    fn default_source_uses_default_size() {
        let mut source = PatternSource::default();
        let images = source.fetch_images().unwrap();
        assert_eq!(images[2].width(), DEFAULT_WIDTH);
        assert_eq!(images[2].height(), DEFAULT_HEIGHT);
        assert_eq!(images[2].layout(), PixelLayout::Mono8);
    }

    #[test]
    fn observations_are_stamped_and_raw() {
        let mut driver = SimulatedTriCameraDriver::new(PatternSource::new(8, 8), false)
            .with_period(Duration::from_millis(1));
        let before = now_timestamp();
        let tri = driver.get_observation().unwrap();
        for obs in &tri.cameras {
            assert!(obs.timestamp > before);
            assert_eq!(obs.image.width(), 8);
        }
    }

    #[test]
    fn downsampling_halves_images() {
        let mut driver = SimulatedTriCameraDriver::new(PatternSource::new(8, 6), true)
            .with_period(Duration::from_millis(1));
        let tri = driver.get_observation().unwrap();
        assert_eq!((tri.cameras[0].image.width(), tri.cameras[0].image.height()), (4, 3));
    }

    #[test]
    fn downsampled_mosaic_keeps_its_colour() {
        let source = SolidBayerSource {
            red: 200,
            green: 100,
            blue: 10,
        };
        let mut driver =
            SimulatedTriCameraDriver::new(source, true).with_period(Duration::from_millis(1));
        let tri = driver.get_observation().unwrap();

        let image = &tri.cameras[0].image;
        assert_eq!((image.width(), image.height()), (2, 2));
        let mut bgr = Vec::new();
        convert_to_bgr8(
            RawPixelFormat::BayerRg8,
            image.width(),
            image.height(),
            image.data(),
            &mut bgr,
        )
        .unwrap();
        for px in bgr.chunks_exact(3) {
            assert_eq!(px, [10, 100, 200]);
        }
    }

    #[test]
    fn calls_are_paced() {
        let mut driver = SimulatedTriCameraDriver::new(PatternSource::new(4, 4), false)
            .with_period(Duration::from_millis(40));
        for _ in 0..2 {
            let start = Instant::now();
            driver.get_observation().unwrap();
            assert!(start.elapsed() >= Duration::from_millis(40));
        }
        assert_eq!(driver.stats().observation_count(), 2);
        assert_eq!(driver.source().frame(), 2);
    }

    #[test]
    fn source_failure_returns_no_observation() {
        let mut driver = SimulatedTriCameraDriver::new(FailingSource, false);
        let start = Instant::now();
        let err = driver.get_observation().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(driver.stats().failure_count(), 1);
    }
}
