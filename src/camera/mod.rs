// Camera domain: backends, synchronisation and pacing.

pub mod backend;
pub mod error;
pub mod generic;
pub mod grabber;
pub mod pacing;
pub mod simulated;
pub mod tricamera;
pub mod types;
#[cfg(feature = "webcam")]
pub mod webcam;
