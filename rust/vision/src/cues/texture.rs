// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::{Field, Kernel};
use crate::preprocess::PreprocessedImage;
use rayon::prelude::*;
use std::f32::consts::PI;

#[rustfmt::skip]
const SHARPEN: [f32; 9] = [
    -1.0, -1.0, -1.0,
    -1.0,  9.0, -1.0,
    -1.0, -1.0, -1.0,
];

#[rustfmt::skip]
const LAPLACIAN: [f32; 9] = [
    0.0,  1.0, 0.0,
    1.0, -4.0, 1.0,
    0.0,  1.0, 0.0,
];

/// Texture energy: fine detail survives only on close, in-focus surfaces.
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let (width, height) = image.dimensions();
    let gray = image.gray_field();

    let high_pass = gray
        .filter3x3(&SHARPEN)
        .zip_map(&gray, |s, g| (s - g).abs());
    let laplacian = gray.filter3x3(&LAPLACIAN).map(f32::abs);
    let gabor = gabor_energy(&gray, params);

    let [w_high, w_lap, w_gabor] = params.texture_weights;
    let energy = Field::weighted_sum(
        width,
        height,
        &[
            (&high_pass.normalized(), w_high),
            (&laplacian.normalized(), w_lap),
            (&gabor.normalized(), w_gabor),
        ],
    );
    energy.gaussian_blur(params.texture_blur, 0.0)
}

/// Summed response magnitude of a Gabor bank at evenly spaced orientations
fn gabor_energy(gray: &Field, params: &CueParams) -> Field {
    let orientations = params.gabor_orientations.max(1);
    let responses: Vec<Field> = (0..orientations)
        .into_par_iter()
        .map(|i| {
            let theta = PI * i as f32 / orientations as f32;
            let kernel = Kernel::gabor(
                params.gabor_size,
                params.gabor_sigma,
                theta,
                params.gabor_lambda,
                params.gabor_gamma,
                0.0,
            );
            gray.correlate(&kernel)
        })
        .collect();

    responses
        .iter()
        .fold(Field::new(gray.width(), gray.height()), |energy, response| {
            energy.zip_map(response, |acc, r| acc + r.abs())
        })
}
