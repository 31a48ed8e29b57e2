use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use rayon::prelude::*;

use crate::{error::VerifyError, types::Frame};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropSettings {
    /// Padding around the landmark box, as a fraction of the frame size.
    pub padding: f32,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            padding: 0.2,
            max_dimension: 256,
            jpeg_quality: 70,
        }
    }
}

#[derive(Debug)]
pub struct RgbImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Crop the padded hand box out of `frame`, downscale it and encode as JPEG.
pub fn encode_hand_jpeg(
    frame: &Frame,
    bounds: [f32; 4],
    settings: &CropSettings,
) -> Result<Vec<u8>, VerifyError> {
    let cropped = crop_hand(frame, bounds, settings.padding)?;
    let resized = downscale(cropped, settings.max_dimension)?;

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, settings.jpeg_quality.clamp(1, 100)).encode(
        &resized.pixels,
        resized.width,
        resized.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

/// RGB copy of the normalized `[min_x, min_y, max_x, max_y]` box grown by
/// `padding` on every side and clamped to the frame.
pub fn crop_hand(frame: &Frame, bounds: [f32; 4], padding: f32) -> Result<RgbImage, VerifyError> {
    let (width, height) = (frame.width as usize, frame.height as usize);
    if width == 0 || height == 0 || frame.rgba.len() < width * height * 4 {
        return Err(VerifyError::EmptyCrop);
    }

    let to_px = |v: f32, size: usize| (v.clamp(0.0, 1.0) * size as f32).round() as usize;
    let x0 = to_px(bounds[0] - padding, width);
    let y0 = to_px(bounds[1] - padding, height);
    let x1 = to_px(bounds[2] + padding, width).min(width);
    let y1 = to_px(bounds[3] + padding, height).min(height);
    if x1 <= x0 || y1 <= y0 {
        return Err(VerifyError::EmptyCrop);
    }

    let crop_w = x1 - x0;
    let crop_h = y1 - y0;
    let stride = width * 4;
    let mut pixels = vec![0u8; crop_w * crop_h * 3];
    pixels
        .par_chunks_mut(crop_w * 3)
        .enumerate()
        .for_each(|(row, dst)| {
            let start = (y0 + row) * stride + x0 * 4;
            let src = &frame.rgba[start..start + crop_w * 4];
            for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
                d.copy_from_slice(&s[..3]);
            }
        });

    Ok(RgbImage {
        pixels,
        width: crop_w as u32,
        height: crop_h as u32,
    })
}

/// Shrink so the longer side is at most `max_dimension`. Smaller images pass
/// through untouched.
pub fn downscale(image: RgbImage, max_dimension: u32) -> Result<RgbImage, VerifyError> {
    let longest = image.width.max(image.height);
    if max_dimension == 0 || longest <= max_dimension {
        return Ok(image);
    }

    let scale = max_dimension as f32 / longest as f32;
    let new_w = ((image.width as f32 * scale).round() as u32).max(1);
    let new_h = ((image.height as f32 * scale).round() as u32).max(1);

    let src = Image::from_vec_u8(image.width, image.height, image.pixels, PixelType::U8x3)
        .map_err(|err| VerifyError::Resize(err.to_string()))?;
    let mut dst = Image::new(new_w, new_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(|err| VerifyError::Resize(err.to_string()))?;

    Ok(RgbImage {
        pixels: dst.into_vec(),
        width: new_w,
        height: new_h,
    })
}
