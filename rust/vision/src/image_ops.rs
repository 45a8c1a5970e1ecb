// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image processing operations on 8-bit images

use crate::field::Field;
use image::{GrayImage, Luma, RgbImage};

/// Apply Canny edge detection
pub fn canny_edges(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    imageproc::edges::canny(image, low_threshold, high_threshold)
}

/// Morphological dilation - expands white regions
pub fn dilate(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::dilate(image, imageproc::distance_transform::Norm::L1, radius)
}

/// Morphological erosion - shrinks white regions
pub fn erode(image: &GrayImage, radius: u8) -> GrayImage {
    imageproc::morphology::erode(image, imageproc::distance_transform::Norm::L1, radius)
}

/// Morphological closing (dilate then erode) - fills small gaps
pub fn morphological_close(image: &GrayImage, radius: u8) -> GrayImage {
    let dilated = dilate(image, radius);
    erode(&dilated, radius)
}

/// Morphological opening (erode then dilate) - removes small noise
pub fn morphological_open(image: &GrayImage, radius: u8) -> GrayImage {
    let eroded = erode(image, radius);
    dilate(&eroded, radius)
}

/// Invert a binary image
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut result = image.clone();
    for pixel in result.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    result
}

/// Simple threshold - pixels above threshold become white, below become black
pub fn threshold(image: &GrayImage, threshold_value: u8) -> GrayImage {
    let mut result = GrayImage::new(image.width(), image.height());

    for (x, y, pixel) in image.enumerate_pixels() {
        let value = if pixel.0[0] >= threshold_value { 255 } else { 0 };
        result.put_pixel(x, y, Luma([value]));
    }

    result
}

/// White wherever the source is darker than `threshold_value`
pub fn dark_mask(image: &GrayImage, threshold_value: u8) -> GrayImage {
    invert(&threshold(image, threshold_value))
}

/// HSV planes on the 8-bit convention: hue in [0,180), saturation and value
/// in [0,255]
#[derive(Debug, Clone)]
pub struct HsvPlanes {
    pub hue: Field,
    pub saturation: Field,
    pub value: Field,
}

/// Split an RGB image into HSV planes
pub fn rgb_to_hsv(rgb: &RgbImage) -> HsvPlanes {
    let (width, height) = rgb.dimensions();
    let mut hue = Field::new(width, height);
    let mut saturation = Field::new(width, height);
    let mut value = Field::new(width, height);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(|c| c as f32);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
        let h_deg = if delta <= 0.0 {
            0.0
        } else if max == r {
            60.0 * (g - b) / delta
        } else if max == g {
            120.0 + 60.0 * (b - r) / delta
        } else {
            240.0 + 60.0 * (r - g) / delta
        };
        let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

        hue.set(x, y, (h_deg / 2.0) % 180.0);
        saturation.set(x, y, s);
        value.set(x, y, max);
    }

    HsvPlanes {
        hue,
        saturation,
        value,
    }
}
