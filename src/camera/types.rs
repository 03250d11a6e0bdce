//! Image and observation data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default observation image width in pixels.
pub const DEFAULT_WIDTH: u32 = 270;
/// Default observation image height in pixels.
pub const DEFAULT_HEIGHT: u32 = 270;

/// Number of cameras composed by the tri-camera drivers.
pub const NUM_CAMERAS: usize = 3;

/// Channel layout of an [`Image`]. Samples are always one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// Single channel (grayscale or raw Bayer mosaic).
    Mono8,
    /// Three interleaved channels in blue, green, red order.
    Bgr8,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            Self::Mono8 => 1,
            Self::Bgr8 => 3,
        }
    }
}

/// A 2-D array of byte samples, row-major with no row padding.
///
/// The pixel buffer is owned; an image never aliases memory held by a
/// capture backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ImageRepr")]
pub struct Image {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl Image {
    /// Create a zero-filled image.
    pub fn zeros(width: u32, height: u32, layout: PixelLayout) -> Self {
        let len = width as usize * height as usize * layout.channels();
        Self {
            width,
            height,
            layout,
            data: vec![0; len],
        }
    }

    /// Wrap an owned buffer. Returns `None` when the buffer length does not
    /// match `width * height * channels`.
    pub fn from_vec(width: u32, height: u32, layout: PixelLayout, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Unchecked wire form of [`Image`]; deserialization goes through
/// [`Image::from_vec`].
#[derive(Deserialize)]
struct ImageRepr {
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Vec<u8>,
}

impl TryFrom<ImageRepr> for Image {
    type Error = String;

    fn try_from(repr: ImageRepr) -> Result<Self, Self::Error> {
        let len = repr.data.len();
        Image::from_vec(repr.width, repr.height, repr.layout, repr.data).ok_or_else(|| {
            format!(
                "{len} bytes do not fit a {}x{} {:?} image",
                repr.width, repr.height, repr.layout
            )
        })
    }
}

// Pixel data is omitted; a 1080p frame would flood the log.
impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One image together with the time it became available to the caller.
///
/// `timestamp` is seconds since the Unix epoch, taken after the blocking
/// retrieval returned (not the sensor's exposure time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub image: Image,
    pub timestamp: f64,
}

impl Observation {
    pub fn new(image: Image, timestamp: f64) -> Self {
        Self { image, timestamp }
    }
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            image: Image::zeros(DEFAULT_WIDTH, DEFAULT_HEIGHT, PixelLayout::Mono8),
            timestamp: 0.0,
        }
    }
}

/// Observations of all three cameras from one synchronised acquisition.
///
/// Every slot is populated; the timestamps are independent per camera.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriObservation {
    pub cameras: [Observation; NUM_CAMERAS],
}

impl TriObservation {
    /// Spread between the earliest and the latest camera timestamp, in seconds.
    pub fn timestamp_spread(&self) -> f64 {
        let (min, max) = self
            .cameras
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), obs| {
                (lo.min(obs.timestamp), hi.max(obs.timestamp))
            });
        max - min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Image {
        let data = (0..width * height).map(|i| (i % 251) as u8).collect();
        Image::from_vec(width, height, PixelLayout::Mono8, data).unwrap()
    }

    #[test]
    fn default_observation_is_zeroed_default_size() {
        let obs = Observation::default();
        assert_eq!(obs.image.width(), DEFAULT_WIDTH);
        assert_eq!(obs.image.height(), DEFAULT_HEIGHT);
        assert_eq!(obs.image.layout(), PixelLayout::Mono8);
        assert!(obs.image.data().iter().all(|&b| b == 0));
        assert_eq!(obs.timestamp, 0.0);
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(Image::from_vec(4, 4, PixelLayout::Bgr8, vec![0; 16]).is_none());
        assert!(Image::from_vec(4, 4, PixelLayout::Bgr8, vec![0; 48]).is_some());
    }

    #[test]
    fn observation_survives_json_round_trip() {
        let obs = Observation::new(gradient(7, 5), 1_712_345_678.123_456_7);
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();

        assert_eq!(back.image, obs.image);
        assert_eq!(back.timestamp.to_bits(), obs.timestamp.to_bits());
    }

    #[test]
    fn deserializing_mismatched_buffer_fails() {
        let json = r#"{"width":4,"height":4,"layout":"bgr8","data":[1]}"#;
        let err = serde_json::from_str::<Image>(json).unwrap_err();
        assert!(err.to_string().contains("1 bytes"), "unexpected error: {err}");

        let json = r#"{"image":{"width":2,"height":1,"layout":"mono8","data":[1,2,3]},"timestamp":1.5}"#;
        assert!(serde_json::from_str::<Observation>(json).is_err());
    }

    #[test]
    fn deserializing_consistent_buffer_succeeds() {
        let json = r#"{"width":2,"height":1,"layout":"bgr8","data":[1,2,3,4,5,6]}"#;
        let img: Image = serde_json::from_str(json).unwrap();
        assert_eq!((img.width(), img.height()), (2, 1));
        assert_eq!(img.data(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn tri_observation_round_trip_keeps_every_camera() {
        let mut tri = TriObservation::default();
        for (i, cam) in tri.cameras.iter_mut().enumerate() {
            *cam = Observation::new(gradient(3 + i as u32, 2), 100.0 + i as f64 * 0.001);
        }
        let json = serde_json::to_string(&tri).unwrap();
        let back: TriObservation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tri);
    }

    #[test]
    fn timestamp_spread_is_max_minus_min() {
        let mut tri = TriObservation::default();
        tri.cameras[0].timestamp = 10.02;
        tri.cameras[1].timestamp = 10.00;
        tri.cameras[2].timestamp = 10.05;
        assert!((tri.timestamp_spread() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn debug_output_omits_pixels() {
        let img = Image::zeros(2, 2, PixelLayout::Bgr8);
        let text = format!("{img:?}");
        assert!(text.contains("bytes: 12"));
    }
}
