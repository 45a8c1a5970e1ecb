// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::Field;
use crate::preprocess::PreprocessedImage;

/// Aerial perspective: distant surfaces are hazier, flatter and desaturated.
///
/// Haze is scored from inverted saturation, inverted local contrast and raw
/// brightness; the cue returns `1 - haze` so clear, saturated, contrasty
/// regions come out near.
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let (width, height) = image.dimensions();
    let gray = image.gray_field();

    let desaturation = image.hsv.saturation.normalized().inverted();
    let flatness = gray
        .local_variance(params.contrast_window)
        .normalized()
        .inverted();
    let brightness = gray.normalized();

    let [w_sat, w_contrast, w_bright] = params.atmospheric_weights;
    let haze = Field::weighted_sum(
        width,
        height,
        &[
            (&desaturation, w_sat),
            (&flatness, w_contrast),
            (&brightness, w_bright),
        ],
    );
    haze.normalized().inverted()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::prepare;
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_pale_sky_is_far_and_saturated_ground_is_near() {
        let rgb = RgbImage::from_fn(60, 60, |x, y| {
            if y < 30 {
                Rgb([205, 215, 225])
            } else if (x + y) % 4 < 2 {
                Rgb([30, 140, 20])
            } else {
                Rgb([60, 110, 10])
            }
        });
        let field = estimate(&prepare(rgb), &CueParams::default());
        let sky = field.get(30, 5);
        let ground = field.get(30, 55);
        assert!(ground > sky + 0.5, "ground {ground} sky {sky}");
    }
}
