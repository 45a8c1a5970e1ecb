// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dense `f32` grids and the filters the depth cues are built from.
//!
//! A [`Field`] is a single-channel `f32` image, so blurs, correlations and
//! resampling run through `imageproc` and `image`. Borders are padded by
//! continuity throughout.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter;
use rayon::prelude::*;

/// Spread below which a field is treated as having no variation
pub const FLAT_RANGE: f32 = 1e-6;

/// Single-channel floating point image
pub type FieldImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Row-major scalar grid
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    image: FieldImage,
}

/// Square correlation kernel with odd side length
#[derive(Debug, Clone)]
pub struct Kernel {
    size: u32,
    weights: Vec<f32>,
}

impl Kernel {
    /// Real part of a Gabor filter (`ψ` phase offset, `γ` aspect ratio)
    pub fn gabor(size: usize, sigma: f32, theta: f32, lambda: f32, gamma: f32, psi: f32) -> Self {
        let size = size | 1;
        let half = (size / 2) as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        let mut weights = Vec::with_capacity(size * size);
        for row in 0..size {
            for col in 0..size {
                let x = col as f32 - half;
                let y = row as f32 - half;
                let xr = x * cos_t + y * sin_t;
                let yr = -x * sin_t + y * cos_t;
                let envelope =
                    (-(xr * xr + gamma * gamma * yr * yr) / (2.0 * sigma * sigma)).exp();
                weights.push(envelope * (std::f32::consts::TAU * xr / lambda + psi).cos());
            }
        }
        Self {
            size: size as u32,
            weights,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Gaussian standard deviation for a kernel size when none is given, the
/// same rule common imaging libraries use
fn kernel_sigma(ksize: usize, sigma: f32) -> f32 {
    if sigma > 0.0 {
        return sigma;
    }
    let ksize = (ksize.max(1) | 1) as f32;
    0.3 * ((ksize - 1.0) * 0.5 - 1.0) + 0.8
}

/// Indices `0, stride, 2*stride, ...` always ending on `len - 1`, so a
/// subsampled grid spans the same extent as the full one.
pub fn sample_indices(len: u32, stride: u32) -> Vec<u32> {
    if len == 0 {
        return Vec::new();
    }
    let mut indices: Vec<u32> = (0..len).step_by(stride.max(1) as usize).collect();
    if indices.last() != Some(&(len - 1)) {
        indices.push(len - 1);
    }
    indices
}

#[inline]
fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

impl From<FieldImage> for Field {
    fn from(image: FieldImage) -> Self {
        Self { image }
    }
}

impl Field {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            image: FieldImage::from_pixel(width, height, Luma([value])),
        }
    }

    /// Wrap row-major data. Returns `None` if the length does not match.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        FieldImage::from_raw(width, height, data).map(Self::from)
    }

    /// Evaluate `f(x, y)` for every cell, rows in parallel
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> f32 + Sync,
    {
        let mut image = FieldImage::new(width, height);
        if width > 0 {
            let data: &mut [f32] = &mut image;
            data.par_chunks_mut(width as usize)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, v) in row.iter_mut().enumerate() {
                        *v = f(x as u32, y as u32);
                    }
                });
        }
        Self { image }
    }

    /// Raw 0-255 intensities of a grayscale image
    pub fn from_gray(gray: &GrayImage) -> Self {
        Self {
            image: FieldImage::from_fn(gray.width(), gray.height(), |x, y| {
                Luma([gray.get_pixel(x, y).0[0] as f32])
            }),
        }
    }

    /// Same size, new contents
    fn with_data(&self, data: Vec<f32>) -> Field {
        let (width, height) = self.dimensions();
        Field::from_vec(width, height, data).unwrap_or_else(|| Field::new(width, height))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image.as_raw().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image.as_raw().is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        self.image.as_raw()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.image.get_pixel(x, y).0[0]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        self.image.put_pixel(x, y, Luma([value]));
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[f32] {
        let w = self.width() as usize;
        &self.data()[y as usize * w..(y as usize + 1) * w]
    }

    /// Minimum and maximum over the finite cells, `(0, 0)` if there are none
    pub fn min_max(&self) -> (f32, f32) {
        let (min, max) = self
            .data()
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if min > max {
            (0.0, 0.0)
        } else {
            (min, max)
        }
    }

    pub fn range(&self) -> f32 {
        let (min, max) = self.min_max();
        max - min
    }

    pub fn mean(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        (self.data().iter().map(|&v| v as f64).sum::<f64>() / self.len() as f64) as f32
    }

    pub fn is_finite(&self) -> bool {
        self.data().par_iter().all(|v| v.is_finite())
    }

    pub fn map<F>(&self, f: F) -> Field
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        self.with_data(self.data().par_iter().map(|&v| f(v)).collect())
    }

    /// Combine two same-sized fields cell by cell
    pub fn zip_map<F>(&self, other: &Field, f: F) -> Field
    where
        F: Fn(f32, f32) -> f32 + Sync + Send,
    {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        self.with_data(
            self.data()
                .par_iter()
                .zip(other.data().par_iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        )
    }

    /// Min-max scale into [0,1]. A field without spread is divided by 255 if
    /// it holds 8-bit intensities, otherwise clamped. Non-finite cells map to 0.
    pub fn normalized(&self) -> Field {
        let (min, max) = self.min_max();
        let range = max - min;
        if range > FLAT_RANGE {
            self.map(|v| finite_or_zero((v - min) / range).clamp(0.0, 1.0))
        } else if max > 1.0 {
            self.map(|v| finite_or_zero(v / 255.0).clamp(0.0, 1.0))
        } else {
            self.map(|v| finite_or_zero(v).clamp(0.0, 1.0))
        }
    }

    /// Replace NaN with 0, infinities with the nearest bound, and clip to [0,1]
    pub fn sanitize(&mut self) {
        let data: &mut [f32] = &mut self.image;
        data.par_iter_mut().for_each(|v| {
            *v = if v.is_nan() {
                0.0
            } else {
                v.clamp(0.0, 1.0)
            };
        });
    }

    /// `Σ weight·field` over same-sized fields
    pub fn weighted_sum(width: u32, height: u32, terms: &[(&Field, f32)]) -> Field {
        let mut out = Field::new(width, height);
        let sum: &mut [f32] = &mut out.image;
        for (field, weight) in terms {
            debug_assert_eq!(field.dimensions(), (width, height));
            sum.par_iter_mut()
                .zip(field.data().par_iter())
                .for_each(|(acc, &v)| *acc += weight * v);
        }
        out
    }

    /// Linearly map [0,1] onto [lo, hi]
    pub fn remap(&self, lo: f32, hi: f32) -> Field {
        self.map(|v| lo + v * (hi - lo))
    }

    /// `1 - v`
    pub fn inverted(&self) -> Field {
        self.map(|v| 1.0 - v)
    }

    /// 2D correlation with an arbitrary square kernel
    pub fn correlate(&self, kernel: &Kernel) -> Field {
        if self.is_empty() {
            return self.clone();
        }
        filter::Kernel::new(kernel.weights.as_slice(), kernel.size, kernel.size)
            .filter::<_, _, Luma<f32>>(&self.image, |channel: &mut f32, acc: f32| *channel = acc)
            .into()
    }

    /// 2D correlation with a row-major 3×3 kernel
    pub fn filter3x3(&self, kernel: &[f32; 9]) -> Field {
        if self.is_empty() {
            return self.clone();
        }
        filter::filter3x3::<_, f32, f32>(&self.image, kernel).into()
    }

    /// Gaussian blur. A non-positive `sigma` is derived from `ksize`.
    pub fn gaussian_blur(&self, ksize: usize, sigma: f32) -> Field {
        if self.is_empty() {
            return self.clone();
        }
        filter::gaussian_blur_f32(&self.image, kernel_sigma(ksize, sigma)).into()
    }

    /// Mean over a `ksize`×`ksize` window
    pub fn box_mean(&self, ksize: usize) -> Field {
        if self.is_empty() {
            return self.clone();
        }
        let ksize = ksize.max(1) | 1;
        let kernel = vec![1.0 / ksize as f32; ksize];
        filter::separable_filter_equal::<_, f32>(&self.image, &kernel).into()
    }

    /// Variance over a `ksize`×`ksize` window
    pub fn local_variance(&self, ksize: usize) -> Field {
        let mean = self.box_mean(ksize);
        let mean_sq = self.map(|v| v * v).box_mean(ksize);
        mean_sq.zip_map(&mean, |sq, m| (sq - m * m).max(0.0))
    }

    /// Gradient magnitude from the 3×3 Sobel operator
    pub fn sobel_magnitude(&self) -> Field {
        if self.is_empty() {
            return self.clone();
        }
        const DIFF: [f32; 3] = [-1.0, 0.0, 1.0];
        const SMOOTH: [f32; 3] = [1.0, 2.0, 1.0];
        let gx: Field = filter::separable_filter::<_, f32>(&self.image, &DIFF, &SMOOTH).into();
        let gy: Field = filter::separable_filter::<_, f32>(&self.image, &SMOOTH, &DIFF).into();
        gx.zip_map(&gy, |a, b| (a * a + b * b).sqrt())
    }

    /// Linear resample to a new size.
    ///
    /// The `f32` resampler saturates outside [0,1], so values are shifted
    /// into that range and back; the triangle filter never overshoots.
    pub fn resize(&self, width: u32, height: u32) -> Field {
        if (width, height) == self.dimensions() || self.is_empty() {
            return self.clone();
        }
        let (min, max) = self.min_max();
        let range = (max - min).max(FLAT_RANGE);
        let unit = self.map(|v| finite_or_zero((v - min) / range));
        let resized: Field = imageops::resize(&unit.image, width, height, FilterType::Triangle).into();
        resized.map(|v| min + v * range)
    }

    /// Maximum (`take_max`) or minimum over a disk of `radius`.
    ///
    /// `imageproc` only offers grey-level morphology on 8-bit images.
    fn disk_extreme(&self, radius: u32, take_max: bool) -> Field {
        let r = radius as i32;
        let offsets: Vec<(i64, i64)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .map(|(dx, dy)| (dx as i64, dy as i64))
            .collect();
        let (w, h) = (self.width() as i64, self.height() as i64);

        Field::from_fn(self.width(), self.height(), |x, y| {
            let samples = offsets.iter().map(|&(dx, dy)| {
                let sx = (x as i64 + dx).clamp(0, w - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, h - 1) as u32;
                self.get(sx, sy)
            });
            if take_max {
                samples.fold(f32::MIN, f32::max)
            } else {
                samples.fold(f32::MAX, f32::min)
            }
        })
    }

    /// Dilation followed by erosion; fills dark speckle narrower than the disk
    pub fn grey_close(&self, radius: u32) -> Field {
        self.disk_extreme(radius, true).disk_extreme(radius, false)
    }

    /// Edge-preserving smoothing; `sigma_range` is in field units.
    ///
    /// Runs `imageproc`'s bilateral filter on an 8-bit quantisation of the
    /// field's own range.
    pub fn bilateral(&self, diameter: u32, sigma_space: f32, sigma_range: f32) -> Field {
        let (min, max) = self.min_max();
        let range = max - min;
        if self.is_empty() || range <= FLAT_RANGE {
            return self.clone();
        }

        let quantized = GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let unit = finite_or_zero((self.get(x, y) - min) / range);
            Luma([(unit * 255.0).round().clamp(0.0, 255.0) as u8])
        });
        let sigma_color = (sigma_range / range * 255.0).max(1e-3);
        let filtered =
            filter::bilateral_filter(&quantized, diameter.max(1) | 1, sigma_color, sigma_space);

        Field::from_fn(self.width(), self.height(), |x, y| {
            min + filtered.get_pixel(x, y).0[0] as f32 / 255.0 * range
        })
    }
}
