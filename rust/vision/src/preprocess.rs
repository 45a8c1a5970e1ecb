// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Image loading, resolution capping and derived colour planes

use crate::error::{Error, Result};
use crate::field::Field;
use crate::image_ops::{rgb_to_hsv, HsvPlanes};
use image::imageops::FilterType;
use image::{GrayImage, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Resolution policy applied at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longer side cap in pixels; larger images are downsampled to fit
    pub max_dimension: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { max_dimension: 640 }
    }
}

/// An image at working resolution with every derived view the cues need
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    pub rgb: RgbImage,
    pub gray: GrayImage,
    /// Hue [0,180), saturation and value [0,255]
    pub hsv: HsvPlanes,
    /// Size of the decoded source before capping
    pub original_width: u32,
    pub original_height: u32,
    /// Working size / original size (1.0 when no downsampling happened)
    pub scale: f64,
}

impl PreprocessedImage {
    /// Cap an in-memory image and derive its planes
    pub fn from_rgb(rgb: RgbImage, config: &PreprocessConfig) -> Self {
        let (original_width, original_height) = rgb.dimensions();
        let longer = original_width.max(original_height);
        let cap = config.max_dimension.max(2);

        let (rgb, scale) = if longer > cap {
            let scale = cap as f64 / longer as f64;
            let width = ((original_width as f64 * scale).round() as u32).max(1);
            let height = ((original_height as f64 * scale).round() as u32).max(1);
            tracing::debug!(
                from = %format!("{original_width}x{original_height}"),
                to = %format!("{width}x{height}"),
                "Downsampling input"
            );
            (
                image::imageops::resize(&rgb, width, height, FilterType::Lanczos3),
                scale,
            )
        } else {
            (rgb, 1.0)
        };

        let gray = image::imageops::grayscale(&rgb);
        let hsv = rgb_to_hsv(&rgb);
        Self {
            rgb,
            gray,
            hsv,
            original_width,
            original_height,
            scale,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    /// Grayscale intensities as a float grid
    pub fn gray_field(&self) -> Field {
        Field::from_gray(&self.gray)
    }
}

/// Read and decode an image file, then cap its resolution.
///
/// The format is sniffed from the content, so a mislabelled extension still
/// loads and a non-image file fails with [`Error::Load`].
pub fn load_image(path: &Path, config: &PreprocessConfig) -> Result<PreprocessedImage> {
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| Error::Load {
            path: path.to_path_buf(),
            source,
        })?;

    let (width, height) = (decoded.width(), decoded.height());
    if width < 2 || height < 2 {
        return Err(Error::ImageTooSmall {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let image = PreprocessedImage::from_rgb(decoded.to_rgb8(), config);
    tracing::info!(
        path = %path.display(),
        original = %format!("{width}x{height}"),
        working = %format!("{}x{}", image.width(), image.height()),
        "Loaded image"
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_small_images_are_not_resized() {
        let image = PreprocessedImage::from_rgb(RgbImage::new(300, 200), &PreprocessConfig::default());
        assert_eq!(image.dimensions(), (300, 200));
        assert_eq!(image.scale, 1.0);
        assert_eq!(image.gray.dimensions(), (300, 200));
        assert_eq!(image.hsv.value.dimensions(), (300, 200));
    }

    #[test]
    fn test_cap_preserves_aspect_ratio() {
        let config = PreprocessConfig { max_dimension: 64 };
        let image = PreprocessedImage::from_rgb(RgbImage::new(200, 90), &config);
        assert_eq!(image.dimensions(), (64, 29));
        assert_eq!((image.original_width, image.original_height), (200, 90));
        assert!((image.scale - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_planes_agree_with_rgb() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([0, 0, 200]));
        let image = PreprocessedImage::from_rgb(rgb, &PreprocessConfig::default());
        // Rec. 709 luma: 0.0722 * 200
        assert_eq!(image.gray.get_pixel(0, 0).0[0], 14);
        assert_eq!(image.hsv.saturation.get(1, 1), 255.0);
        assert_eq!(image.hsv.hue.get(1, 1), 120.0);
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = load_image(Path::new("/definitely/not/here.png"), &PreprocessConfig::default())
            .unwrap_err();
        assert!(err.is_load_error());
        assert_eq!(err.stage(), "load");
    }
}
