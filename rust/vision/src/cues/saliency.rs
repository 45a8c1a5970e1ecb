// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::Field;
use crate::preprocess::PreprocessedImage;
use nalgebra::Complex;
use rayon::prelude::*;
use std::f64::consts::TAU;

/// Spectral-residual saliency: whatever the log amplitude spectrum does not
/// explain by its local average is unexpected, and unexpected regions
/// attract the eye (and tend to be foreground).
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let (width, height) = image.dimensions();
    let n = params.saliency_size.max(8);
    let small = image.gray_field().resize(n, n);
    let n = n as usize;

    let mut spectrum: Vec<Complex<f64>> = small
        .data()
        .iter()
        .map(|&v| Complex::new(v as f64, 0.0))
        .collect();
    dft_2d(&mut spectrum, n, false);

    let log_amplitude = Field::from_fn(n as u32, n as u32, |x, y| {
        (spectrum[y as usize * n + x as usize].norm() + 1.0).ln() as f32
    });
    let average = log_amplitude.box_mean(params.saliency_residual_window);
    let residual = log_amplitude.zip_map(&average, |l, a| l - a);

    for (value, &r) in spectrum.iter_mut().zip(residual.data()) {
        *value = Complex::from_polar((r as f64).exp(), value.arg());
    }
    dft_2d(&mut spectrum, n, true);

    let scale = 1.0 / (n * n) as f64;
    let saliency = Field::from_fn(n as u32, n as u32, |x, y| {
        (spectrum[y as usize * n + x as usize].norm() * scale) as f32
    });

    saliency
        .resize(width, height)
        .gaussian_blur(params.saliency_blur, 0.0)
}

/// Unnormalised 2D DFT of a row-major `n`×`n` grid, in place
fn dft_2d(data: &mut [Complex<f64>], n: usize, inverse: bool) {
    let sign = if inverse { 1.0 } else { -1.0 };
    let twiddles: Vec<Complex<f64>> = (0..n)
        .map(|k| Complex::from_polar(1.0, sign * TAU * k as f64 / n as f64))
        .collect();

    let transform_rows = |data: &mut [Complex<f64>]| {
        data.par_chunks_mut(n).for_each(|row| {
            let out = dft_1d(row, &twiddles);
            row.copy_from_slice(&out);
        });
    };

    transform_rows(data);
    transpose(data, n);
    transform_rows(data);
    transpose(data, n);
}

fn dft_1d(input: &[Complex<f64>], twiddles: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let n = input.len();
    (0..n)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(j, &x)| x * twiddles[(j * k) % n])
                .sum()
        })
        .collect()
}

fn transpose(data: &mut [Complex<f64>], n: usize) {
    for i in 0..n {
        for j in (i + 1)..n {
            data.swap(i * n + j, j * n + i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::prepare;
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_dft_round_trip() {
        let n = 8;
        let original: Vec<Complex<f64>> = (0..n * n)
            .map(|i| Complex::new((i % 7) as f64 - 3.0, 0.0))
            .collect();
        let mut data = original.clone();
        dft_2d(&mut data, n, false);
        // DC term is the sum of the input
        let sum: f64 = original.iter().map(|c| c.re).sum();
        assert_relative_eq!(data[0].re, sum, epsilon = 1e-9);

        dft_2d(&mut data, n, true);
        for (a, b) in data.iter().zip(&original) {
            assert_relative_eq!(a.re / (n * n) as f64, b.re, epsilon = 1e-9);
            assert_relative_eq!(a.im / (n * n) as f64, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_isolated_blob_is_salient() {
        let rgb = RgbImage::from_fn(96, 96, |x, y| {
            let dx = x as i32 - 70;
            let dy = y as i32 - 30;
            if dx * dx + dy * dy < 64 {
                Rgb([250, 250, 250])
            } else {
                Rgb([40, 40, 40])
            }
        });
        let params = CueParams {
            saliency_size: 32,
            ..CueParams::default()
        };
        let field = estimate(&prepare(rgb), &params).normalized();
        assert!(field.get(70, 30) > 0.5);
        assert!(field.get(15, 80) < field.get(70, 30));
    }
}
