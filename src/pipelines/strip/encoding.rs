// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding for captures, processed frames and strips

use image::{ExtendedColorType, GrayImage, ImageError, RgbImage};
use std::path::Path;
use tracing::debug;

fn encode_jpeg(
    raw: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
    quality: u8,
) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder.encode(raw, width, height, color)?;

    Ok(buffer)
}

/// Encode an RGB image as JPEG
pub fn encode_rgb_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    encode_jpeg(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
        quality,
    )
}

/// Encode a single-channel image as grayscale JPEG
pub fn encode_luma_jpeg(image: &GrayImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    encode_jpeg(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::L8,
        quality,
    )
}

/// Encode and write a grayscale JPEG to `path`
pub fn save_luma_jpeg(image: &GrayImage, path: &Path, quality: u8) -> Result<(), ImageError> {
    let data = encode_luma_jpeg(image, quality)?;
    std::fs::write(path, &data).map_err(ImageError::IoError)?;
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        size = data.len(),
        "Saved grayscale JPEG"
    );
    Ok(())
}
