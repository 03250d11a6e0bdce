use fast_image_resize as fr;
use fr::images::Image as FrImage;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::{Image, PixelLayout};

/// Reduce an image to half its width and height (at least 1x1).
///
/// Uses a box filter so every output pixel is the mean of its 2x2 source
/// block.
pub fn downsample_half(image: &Image) -> Result<Image> {
    let dst_width = (image.width() / 2).max(1);
    let dst_height = (image.height() / 2).max(1);
    let pixel_type = match image.layout() {
        PixelLayout::Mono8 => fr::PixelType::U8,
        PixelLayout::Bgr8 => fr::PixelType::U8x3,
    };

    let src = FrImage::from_vec_u8(
        image.width(),
        image.height(),
        image.data().to_vec(),
        pixel_type,
    )
    .map_err(|e| CameraError::Acquisition(format!("invalid source image: {e}")))?;
    let mut dst = FrImage::new(dst_width, dst_height, pixel_type);

    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Box));
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|e| CameraError::Acquisition(format!("downsampling failed: {e}")))?;

    Image::from_vec(dst_width, dst_height, image.layout(), dst.into_vec())
        .ok_or_else(|| CameraError::Acquisition("resized buffer has wrong length".to_string()))
}

/// Halve a raw Bayer mosaic by keeping every other 2x2 cell in each
/// direction, so the colour filter pattern survives (at least 1x1).
pub fn decimate_bayer_half(image: &Image) -> Result<Image> {
    if image.layout() != PixelLayout::Mono8 {
        return Err(CameraError::Acquisition(format!(
            "Bayer decimation needs a single-channel image, got {:?}",
            image.layout()
        )));
    }
    let (src_w, src_h) = (image.width() as usize, image.height() as usize);
    let dst_w = (src_w / 2).max(1);
    let dst_h = (src_h / 2).max(1);
    // Output column x maps to source column 4 * (x / 2) + x % 2.
    let source_index = |x: usize| 4 * (x / 2) + x % 2;

    let src = image.data();
    let mut data = Vec::with_capacity(dst_w * dst_h);
    for y in 0..dst_h {
        let row = source_index(y).min(src_h.saturating_sub(1)) * src_w;
        for x in 0..dst_w {
            data.push(src[row + source_index(x).min(src_w.saturating_sub(1))]);
        }
    }
    Image::from_vec(dst_w as u32, dst_h as u32, PixelLayout::Mono8, data)
        .ok_or_else(|| CameraError::Acquisition("decimated buffer has wrong length".to_string()))
}
