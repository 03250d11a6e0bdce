// Pixel-level helpers: raw format conversion and resolution reduction.

pub mod convert;
pub mod resize;
