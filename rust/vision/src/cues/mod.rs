// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monocular depth cues
//!
//! Each cue is an independent estimator turning the preprocessed image into a
//! same-sized field in [0,1] where higher means nearer to the camera. The
//! floor-plan cue is the exception: there, higher means taller (wall versus
//! floor).
//!
//! Cues never see each other's output, so any subset can be evaluated in any
//! order (or in parallel) and handed to the fusion engine.

mod atmospheric;
mod edge;
mod floor_plan;
mod heuristic;
mod perspective;
mod saliency;
mod texture;

pub use heuristic::HeuristicWeights;

use crate::field::Field;
use crate::preprocess::PreprocessedImage;
use crate::types::SceneType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifies one depth estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CueKind {
    Perspective,
    Edge,
    Atmospheric,
    Texture,
    Saliency,
    FloorPlan,
    /// Scene-specific gradient blend selected by the classified [`SceneType`]
    SceneHeuristic,
}

impl CueKind {
    pub fn name(self) -> &'static str {
        match self {
            CueKind::Perspective => "perspective",
            CueKind::Edge => "edge",
            CueKind::Atmospheric => "atmospheric",
            CueKind::Texture => "texture",
            CueKind::Saliency => "saliency",
            CueKind::FloorPlan => "floor_plan",
            CueKind::SceneHeuristic => "scene_heuristic",
        }
    }

    /// Smallest image side the cue accepts
    pub fn min_side(self) -> u32 {
        match self {
            // 3x3 stencils need a full neighbourhood
            CueKind::Texture => 3,
            _ => MIN_SIDE,
        }
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A cue that could not produce a usable field. Fusion skips the cue instead
/// of aborting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CueError {
    #[error("{cue} cue needs at least {min}x{min} pixels, got {width}x{height}")]
    TooSmall {
        cue: CueKind,
        width: u32,
        height: u32,
        min: u32,
    },

    #[error("{cue} cue produced non-finite values")]
    NonFinite { cue: CueKind },
}

/// Calibration constants for every cue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueParams {
    /// Gray-level spread under which the image is treated as featureless and
    /// every cue returns a flat field
    pub featureless_range: u8,

    // Perspective
    /// Horizon position (fraction of height) when no horizontal line is found
    pub default_horizon: f32,
    /// Only lines above this fraction of the height can be the horizon
    pub horizon_search_limit: f32,
    /// Depth value assigned at the horizon row
    pub horizon_depth: f32,
    pub horizon_angle_tolerance: f64,
    /// Minimum horizon segment length as a fraction of image width
    pub horizon_min_length: f64,
    pub horizon_max_gap: f64,
    pub hough_threshold: u32,

    // Edge structure
    /// `(low, high)` Canny threshold pairs merged by weighted union
    pub edge_thresholds: Vec<(f32, f32)>,
    pub edge_weights: Vec<f32>,
    /// Minimum merged weight for a pixel to count as an edge
    pub edge_vote: f32,
    pub edge_close_radius: u32,

    // Atmospheric
    pub contrast_window: usize,
    /// Inverted saturation, inverted local contrast, brightness
    pub atmospheric_weights: [f32; 3],

    // Texture
    /// Sharpening response, Laplacian magnitude, Gabor energy
    pub texture_weights: [f32; 3],
    pub gabor_size: usize,
    pub gabor_sigma: f32,
    pub gabor_lambda: f32,
    pub gabor_gamma: f32,
    pub gabor_orientations: usize,
    pub texture_blur: usize,

    // Saliency
    /// Side of the square the spectral residual is computed on
    pub saliency_size: u32,
    pub saliency_residual_window: usize,
    pub saliency_blur: usize,

    // Floor plan
    /// Gray level below which a pixel is ink
    pub floor_plan_dark_threshold: u8,
    pub floor_plan_open_radius: u8,
    pub floor_plan_close_radius: u8,
    /// Radius of the final dilate/erode pair
    pub floor_plan_grow_radius: u8,
    /// Components smaller than this fraction of the image area are dropped
    pub floor_plan_min_component: f32,
    pub floor_plan_blur: usize,

    pub heuristics: HeuristicWeights,
}

impl Default for CueParams {
    fn default() -> Self {
        Self {
            featureless_range: 2,
            default_horizon: 0.4,
            horizon_search_limit: 0.6,
            horizon_depth: 0.3,
            horizon_angle_tolerance: 0.2,
            horizon_min_length: 0.25,
            horizon_max_gap: 20.0,
            hough_threshold: 50,
            edge_thresholds: vec![(30.0, 90.0), (50.0, 150.0), (100.0, 200.0)],
            edge_weights: vec![0.3, 0.4, 0.3],
            edge_vote: 0.5,
            edge_close_radius: 3,
            contrast_window: 15,
            atmospheric_weights: [0.4, 0.4, 0.2],
            texture_weights: [0.3, 0.3, 0.4],
            gabor_size: 21,
            gabor_sigma: 5.0,
            gabor_lambda: 10.0,
            gabor_gamma: 0.5,
            gabor_orientations: 4,
            texture_blur: 5,
            saliency_size: 128,
            saliency_residual_window: 3,
            saliency_blur: 11,
            floor_plan_dark_threshold: 180,
            floor_plan_open_radius: 1,
            floor_plan_close_radius: 2,
            floor_plan_grow_radius: 1,
            floor_plan_min_component: 0.001,
            floor_plan_blur: 5,
            heuristics: HeuristicWeights::default(),
        }
    }
}

/// Smallest image side any cue accepts
const MIN_SIDE: u32 = 2;

/// Evaluate one cue.
///
/// The result is min-max normalised into [0,1]. A featureless image (gray
/// spread below [`CueParams::featureless_range`]) yields a flat field, which
/// lets fusion detect the degenerate case and substitute its fallback.
pub fn compute_cue(
    kind: CueKind,
    image: &PreprocessedImage,
    scene: SceneType,
    params: &CueParams,
) -> Result<Field, CueError> {
    let (width, height) = image.dimensions();
    let min = kind.min_side();
    if width < min || height < min {
        return Err(CueError::TooSmall {
            cue: kind,
            width,
            height,
            min,
        });
    }

    if is_featureless(image, params.featureless_range) {
        tracing::debug!(cue = %kind, "Featureless image, flat cue");
        return Ok(Field::filled(width, height, 0.5));
    }

    let raw = match kind {
        CueKind::Perspective => perspective::estimate(image, params),
        CueKind::Edge => edge::estimate(image, params),
        CueKind::Atmospheric => atmospheric::estimate(image, params),
        CueKind::Texture => texture::estimate(image, params),
        CueKind::Saliency => saliency::estimate(image, params),
        CueKind::FloorPlan => floor_plan::estimate(image, params),
        CueKind::SceneHeuristic => heuristic::estimate(image, scene, &params.heuristics),
    };

    if !raw.is_finite() {
        return Err(CueError::NonFinite { cue: kind });
    }
    Ok(raw.normalized())
}

fn is_featureless(image: &PreprocessedImage, range: u8) -> bool {
    let (min, max) = image
        .gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    max.saturating_sub(min) < range
}

/// Image rows as a vertical ramp, 0 at the top and 1 at the bottom
pub(crate) fn vertical_ramp(width: u32, height: u32) -> Field {
    let denom = (height.max(2) - 1) as f32;
    Field::from_fn(width, height, |_, y| y as f32 / denom)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::preprocess::{PreprocessConfig, PreprocessedImage};
    use image::{Rgb, RgbImage};

    pub fn prepare(rgb: RgbImage) -> PreprocessedImage {
        PreprocessedImage::from_rgb(rgb, &PreprocessConfig::default())
    }

    /// Dark vertical stripes on a light background over a sky-to-ground ramp
    pub fn textured_scene(width: u32, height: u32) -> PreprocessedImage {
        prepare(RgbImage::from_fn(width, height, |x, y| {
            let base = 60 + (y * 160 / height.max(1)) as u8;
            if (x / 6) % 2 == 0 && y > height / 2 {
                Rgb([base / 3, base / 2, base / 4])
            } else {
                Rgb([base, base, 255 - base / 2])
            }
        }))
    }
}
