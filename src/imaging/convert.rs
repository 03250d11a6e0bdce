//! Conversion of raw sensor buffers into packed BGR.

use serde::{Deserialize, Serialize};

use crate::camera::error::{CameraError, Result};

/// Pixel format of a buffer as delivered by the frame grabber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawPixelFormat {
    Mono8,
    /// Bayer mosaic, red at (0, 0), blue at (1, 1).
    BayerRg8,
    Rgb8Packed,
    Bgr8Packed,
}

impl RawPixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Mono8 | Self::BayerRg8 => 1,
            Self::Rgb8Packed | Self::Bgr8Packed => 3,
        }
    }
}

/// Convert `src` into packed BGR, replacing the contents of `dst`.
///
/// `dst` is reused across frames so its allocation is kept.
pub fn convert_to_bgr8(
    format: RawPixelFormat,
    width: u32,
    height: u32,
    src: &[u8],
    dst: &mut Vec<u8>,
) -> Result<()> {
    let (w, h) = (width as usize, height as usize);
    let expected = w * h * format.bytes_per_pixel();
    if src.len() != expected {
        return Err(CameraError::Acquisition(format!(
            "raw {format:?} buffer is {} bytes, expected {expected} for {width}x{height}",
            src.len()
        )));
    }

    dst.clear();
    dst.reserve(w * h * 3);

    match format {
        RawPixelFormat::Bgr8Packed => dst.extend_from_slice(src),
        RawPixelFormat::Rgb8Packed => {
            for px in src.chunks_exact(3) {
                dst.extend_from_slice(&[px[2], px[1], px[0]]);
            }
        }
        RawPixelFormat::Mono8 => {
            for &v in src {
                dst.extend_from_slice(&[v, v, v]);
            }
        }
        RawPixelFormat::BayerRg8 => demosaic_rggb(src, w, h, dst),
    }
    Ok(())
}

/// Nearest-cell demosaic: every pixel of a 2x2 RGGB cell gets the cell's
/// red, mean green and blue. Odd trailing rows/columns reuse the edge sample.
fn demosaic_rggb(src: &[u8], w: usize, h: usize, dst: &mut Vec<u8>) {
    let at = |x: usize, y: usize| src[y.min(h - 1) * w + x.min(w - 1)];
    for y in 0..h {
        let cy = y & !1;
        for x in 0..w {
            let cx = x & !1;
            let r = at(cx, cy);
            let g = ((u16::from(at(cx + 1, cy)) + u16::from(at(cx, cy + 1))) / 2) as u8;
            let b = at(cx + 1, cy + 1);
            dst.extend_from_slice(&[b, g, r]);
        }
    }
}
