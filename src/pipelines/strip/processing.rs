// SPDX-License-Identifier: MPL-2.0

//! Black & white tone processing for captured photos
//!
//! Steps run in a fixed order:
//!
//! 1. Grayscale (ITU-R 601 luma)
//! 2. Contrast against the mean luma
//! 3. Brightness multiplier
//! 4. Optional shadow lift below the midpoint
//! 5. Downscale into the photo box, preserving aspect ratio
//!
//! Every step clamps to `0..=255`.

use crate::config::{StripConfig, ToneConfig};
use crate::errors::ProcessError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use tracing::debug;

/// Image filter capability
pub trait ImageFilter: Send {
    fn transform(&self, image: &DynamicImage) -> Result<GrayImage, ProcessError>;
}

/// Tone curve plus downscale, parameterised by configuration
#[derive(Debug, Clone)]
pub struct ToneFilter {
    tone: ToneConfig,
    box_width: u32,
    box_height: u32,
}

impl ToneFilter {
    pub fn new(tone: ToneConfig, strip: &StripConfig) -> Self {
        Self {
            tone,
            box_width: strip.photo_width,
            box_height: strip.photo_height,
        }
    }
}

impl ImageFilter for ToneFilter {
    fn transform(&self, image: &DynamicImage) -> Result<GrayImage, ProcessError> {
        let mut gray = image.to_luma8();

        apply_contrast(&mut gray, self.tone.contrast);
        apply_brightness(&mut gray, self.tone.brightness);
        if self.tone.shadow_lift_enabled {
            for pixel in gray.pixels_mut() {
                pixel[0] = shadow_lift(pixel[0], self.tone.midpoint, self.tone.shadow_lift);
            }
        }

        let (width, height) = fit_within(
            gray.width(),
            gray.height(),
            self.box_width,
            self.box_height,
        );
        debug!(
            from_width = gray.width(),
            from_height = gray.height(),
            width,
            height,
            "Tone processing complete"
        );

        if (width, height) == gray.dimensions() {
            Ok(gray)
        } else {
            Ok(imageops::resize(&gray, width, height, FilterType::Lanczos3))
        }
    }
}

/// Rounded mean luma
fn mean_luma(image: &GrayImage) -> f32 {
    let count = image.as_raw().len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = image.as_raw().iter().map(|&p| p as u64).sum();
    (sum as f64 / count as f64).round() as f32
}

/// Scale the distance of every pixel from the mean luma by `factor`
pub fn apply_contrast(image: &mut GrayImage, factor: f32) {
    let mean = mean_luma(image);
    for pixel in image.pixels_mut() {
        let value = mean + (pixel[0] as f32 - mean) * factor;
        pixel[0] = value.round().clamp(0.0, 255.0) as u8;
    }
}

/// Multiply every pixel by `factor`
pub fn apply_brightness(image: &mut GrayImage, factor: f32) {
    for pixel in image.pixels_mut() {
        pixel[0] = (pixel[0] as f32 * factor).round().clamp(0.0, 255.0) as u8;
    }
}

/// Lift a pixel below `midpoint` by `lift`, saturating at 255
///
/// Values at or above `midpoint` are returned unchanged.
pub fn shadow_lift(value: u8, midpoint: u8, lift: f32) -> u8 {
    if value >= midpoint {
        return value;
    }
    (value as f32 * lift).floor().clamp(0.0, 255.0) as u8
}

/// Largest size with the source aspect ratio inside the box, never upscaled
pub fn fit_within(width: u32, height: u32, box_width: u32, box_height: u32) -> (u32, u32) {
    if width <= box_width && height <= box_height {
        return (width, height);
    }
    let (w, h) = (width as u64, height as u64);
    let (bw, bh) = (box_width as u64, box_height as u64);
    if w * bh >= h * bw {
        (box_width, ((h * bw / w) as u32).max(1))
    } else {
        (((w * bh / h) as u32).max(1), box_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn test_shadow_lift_never_overflows_and_spares_highlights() {
        for lift in [1.0_f32, 1.15, 1.5, 2.0, 10.0, 255.0] {
            for midpoint in [0_u8, 1, 128, 200, 255] {
                for value in 0..=255_u8 {
                    let lifted = shadow_lift(value, midpoint, lift);
                    if value >= midpoint {
                        assert_eq!(lifted, value);
                    } else {
                        assert!(lifted >= value, "lift {lift} lowered {value}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_shadow_lift_floors() {
        assert_eq!(shadow_lift(100, 128, 1.5), 150);
        assert_eq!(shadow_lift(127, 128, 1.15), 146);
        assert_eq!(shadow_lift(120, 128, 3.0), 255);
        assert_eq!(shadow_lift(0, 128, 1.15), 0);
    }

    #[test]
    fn test_contrast_spreads_around_mean() {
        let mut image = GrayImage::from_raw(2, 1, vec![100, 200]).unwrap();
        apply_contrast(&mut image, 2.0);
        // mean 150: 150 - 100 = 50, 150 + 100 = 250
        assert_eq!(image.as_raw(), &[50, 250]);

        let mut image = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        apply_contrast(&mut image, 3.0);
        assert_eq!(image.as_raw(), &[0, 255]);
    }

    #[test]
    fn test_brightness_clamps() {
        let mut image = GrayImage::from_raw(3, 1, vec![0, 100, 230]).unwrap();
        apply_brightness(&mut image, 1.3);
        assert_eq!(image.as_raw(), &[0, 130, 255]);
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(1920, 1080, 280, 280), (280, 157));
        assert_eq!(fit_within(1080, 1920, 280, 280), (157, 280));
        assert_eq!(fit_within(100, 50, 280, 280), (100, 50));
        assert_eq!(fit_within(560, 560, 280, 280), (280, 280));
    }

    #[test]
    fn test_tone_filter_output_is_gray_and_boxed() {
        let filter = ToneFilter::new(ToneConfig::default(), &StripConfig::default());
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([30, 60, 90])));
        let out = filter.transform(&source).unwrap();
        assert_eq!(out.dimensions(), (280, 210));
    }

    #[test]
    fn test_identity_tone() {
        let tone = ToneConfig {
            contrast: 1.0,
            brightness: 1.0,
            shadow_lift_enabled: false,
            ..ToneConfig::default()
        };
        let filter = ToneFilter::new(tone, &StripConfig::default());
        let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(10, 10, Luma([77])));
        let out = filter.transform(&source).unwrap();
        assert!(out.pixels().all(|p| p[0] == 77));
    }
}
