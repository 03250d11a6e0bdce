//! Synchronised tri-camera image acquisition.
//!
//! Every capture backend implements [`SensorDriver`]. [`TriCameraDriver`]
//! composes three of them into one paced [`TriObservation`] source.

pub mod camera;
pub mod diagnostics;
pub mod imaging;
pub mod settings;

pub use camera::backend::SensorDriver;
pub use camera::error::{CameraError, ErrorKind, Result};
pub use camera::generic::{GenericCaptureBackend, VideoSource};
pub use camera::grabber::api::GrabberSdk;
pub use camera::grabber::backend::{FrameGrabberBackend, GrabberState};
pub use camera::grabber::sdk::SdkContext;
pub use camera::simulated::{PatternSource, SimulatedTriCameraDriver, TriImageSource};
pub use camera::tricamera::TriCameraDriver;
pub use camera::types::{Image, Observation, PixelLayout, TriObservation};
pub use settings::types::{GrabberConfig, TriCameraConfig};
