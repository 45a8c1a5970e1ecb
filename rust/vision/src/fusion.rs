// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth fusion engine
//!
//! Combines cue fields into one depth field, repairs degenerate results with
//! a deterministic gradient, smooths, and derives a confidence field from cue
//! agreement and depth smoothness.

use crate::cues::{vertical_ramp, CueKind};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::types::SceneType;
use serde::{Deserialize, Serialize};

/// One cue's contribution to the blend
#[derive(Debug, Clone)]
pub struct CueField {
    pub kind: CueKind,
    pub weight: f32,
    pub field: Field,
}

/// Post-fusion smoothing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Smoothing {
    /// Edge-preserving; `sigma_range` is in depth units
    Bilateral {
        diameter: u32,
        sigma_space: f32,
        sigma_range: f32,
    },
    Gaussian {
        kernel_size: usize,
    },
    None,
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::Bilateral {
            diameter: 9,
            sigma_space: 3.0,
            sigma_range: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub smoothing: Smoothing,
    /// Output band for photographic scenes; `None` keeps the full [0,1]
    pub photo_range: Option<(f32, f32)>,
    /// Minimum depth spread before the fallback gradient is substituted
    pub min_range: f32,
    /// Flat confidence reported for floor plans
    pub architectural_confidence: f32,
    /// Share of cue agreement in the confidence blend (smoothness takes the rest)
    pub agreement_weight: f32,
    pub confidence_blur: usize,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::default(),
            photo_range: Some((0.2, 0.8)),
            min_range: 0.01,
            architectural_confidence: 0.95,
            agreement_weight: 0.6,
            confidence_blur: 7,
        }
    }
}

/// Fused depth with its confidence
#[derive(Debug, Clone)]
pub struct Fused {
    pub depth: Field,
    pub confidence: Field,
    /// The blend was degenerate and the fallback gradient was used
    pub fallback: bool,
}

/// Blend cue fields into a validated depth and confidence pair.
///
/// Consumes the cue fields so their memory is released once fusion is done.
pub fn fuse(cues: Vec<CueField>, scene: SceneType, params: &FusionParams) -> Result<Fused> {
    let Some(first) = cues.first() else {
        return Err(Error::depth("fusion", "no cue produced a usable field"));
    };
    let (width, height) = first.field.dimensions();
    if let Some(odd) = cues.iter().find(|c| c.field.dimensions() != (width, height)) {
        return Err(Error::depth(
            "fusion",
            format!(
                "{} cue is {:?}, expected {:?}",
                odd.kind,
                odd.field.dimensions(),
                (width, height)
            ),
        ));
    }

    let terms: Vec<(&Field, f32)> = cues.iter().map(|c| (&c.field, c.weight)).collect();
    let blended = Field::weighted_sum(width, height, &terms);
    let (depth, fallback) = finalize_depth(blended, scene, params);
    let confidence = confidence(&depth, &cues, scene, params);
    drop(cues);

    validate(&depth, &confidence, params.min_range)?;
    Ok(Fused {
        depth,
        confidence,
        fallback,
    })
}

/// Sanitise, normalise, repair and smooth a raw depth field, then apply the
/// scene's output band. Returns the field and whether the fallback fired.
pub fn finalize_depth(mut raw: Field, scene: SceneType, params: &FusionParams) -> (Field, bool) {
    raw.sanitize();
    let normalized = raw.normalized();

    let (depth, fallback) = if normalized.range() < params.min_range {
        tracing::warn!(
            range = normalized.range(),
            "Depth has no usable variation, substituting linear gradient"
        );
        (fallback_gradient(raw.width(), raw.height()), true)
    } else {
        let smoothed = match params.smoothing {
            Smoothing::Bilateral {
                diameter,
                sigma_space,
                sigma_range,
            } => normalized.bilateral(diameter, sigma_space, sigma_range),
            Smoothing::Gaussian { kernel_size } => normalized.gaussian_blur(kernel_size, 0.0),
            Smoothing::None => normalized,
        };
        let renormalized = smoothed.normalized();
        if renormalized.range() < params.min_range {
            (fallback_gradient(raw.width(), raw.height()), true)
        } else {
            (renormalized, false)
        }
    };

    match params.photo_range {
        Some((lo, hi)) if !scene.is_architectural() => (depth.remap(lo, hi), fallback),
        _ => (depth, fallback),
    }
}

/// Top-to-bottom ramp (left-to-right for single-row images)
pub fn fallback_gradient(width: u32, height: u32) -> Field {
    if height > 1 {
        vertical_ramp(width, height)
    } else {
        let denom = (width.max(2) - 1) as f32;
        Field::from_fn(width, height, |x, _| x as f32 / denom)
    }
}

/// Per-pixel trust in the fused depth.
///
/// Floor plans get a flat high value. Otherwise low inter-cue variance and a
/// smooth depth surface both raise confidence.
pub fn confidence(depth: &Field, cues: &[CueField], scene: SceneType, params: &FusionParams) -> Field {
    let (width, height) = depth.dimensions();
    let raw = if scene.is_architectural() {
        Field::filled(width, height, params.architectural_confidence.clamp(0.0, 1.0))
    } else {
        let agreement = cue_variance(width, height, cues).normalized().inverted();
        let smoothness = depth.sobel_magnitude().normalized().inverted();
        let w = params.agreement_weight.clamp(0.0, 1.0);
        Field::weighted_sum(width, height, &[(&agreement, w), (&smoothness, 1.0 - w)])
    };
    raw.gaussian_blur(params.confidence_blur, 0.0).normalized()
}

/// Population variance across the cue fields at each pixel
fn cue_variance(width: u32, height: u32, cues: &[CueField]) -> Field {
    if cues.is_empty() {
        return Field::new(width, height);
    }
    let n = cues.len() as f32;
    Field::from_fn(width, height, |x, y| {
        let mean = cues.iter().map(|c| c.field.get(x, y)).sum::<f32>() / n;
        cues.iter()
            .map(|c| (c.field.get(x, y) - mean).powi(2))
            .sum::<f32>()
            / n
    })
}

/// Final guard on the fused output
pub fn validate(depth: &Field, confidence: &Field, min_range: f32) -> Result<()> {
    if depth.is_empty() {
        return Err(Error::depth("validation", "depth field is empty"));
    }
    if !depth.is_finite() || !confidence.is_finite() {
        return Err(Error::depth("validation", "non-finite values after fusion"));
    }
    let (min, max) = depth.min_max();
    if min < 0.0 || max > 1.0 {
        return Err(Error::depth(
            "validation",
            format!("depth outside [0,1]: {min}..{max}"),
        ));
    }
    if max - min < min_range {
        return Err(Error::depth(
            "validation",
            format!("depth range {} below {min_range}", max - min),
        ));
    }
    let (cmin, cmax) = confidence.min_max();
    if cmin < 0.0 || cmax > 1.0 {
        return Err(Error::depth(
            "validation",
            format!("confidence outside [0,1]: {cmin}..{cmax}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cue(kind: CueKind, weight: f32, field: Field) -> CueField {
        CueField {
            kind,
            weight,
            field,
        }
    }

    fn column(field: &Field, x: u32) -> Vec<f32> {
        (0..field.height()).map(|y| field.get(x, y)).collect()
    }

    #[test]
    fn test_flat_cues_fall_back_to_gradient() {
        let cues = vec![
            cue(CueKind::Edge, 0.5, Field::filled(20, 10, 0.5)),
            cue(CueKind::Texture, 0.5, Field::filled(20, 10, 0.5)),
        ];
        let fused = fuse(cues, SceneType::General, &FusionParams::default()).unwrap();

        assert!(fused.fallback);
        let values = column(&fused.depth, 7);
        assert!(values.windows(2).all(|w| w[1] >= w[0]));
        assert_relative_eq!(values[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(values[9], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_nan_is_sanitized() {
        let mut data: Vec<f32> = (0..100).map(|i| (i % 10) as f32 / 9.0).collect();
        data[42] = f32::NAN;
        data[43] = f32::INFINITY;
        let field = Field::from_vec(10, 10, data).unwrap();
        let fused = fuse(
            vec![cue(CueKind::Perspective, 1.0, field)],
            SceneType::General,
            &FusionParams::default(),
        )
        .unwrap();
        assert!(fused.depth.is_finite());
        assert!(!fused.fallback);
    }

    #[test]
    fn test_floor_plans_keep_full_range_and_flat_confidence() {
        let field = Field::from_fn(16, 16, |x, _| if x < 8 { 0.0 } else { 1.0 });
        let params = FusionParams {
            smoothing: Smoothing::None,
            ..FusionParams::default()
        };
        let fused = fuse(
            vec![cue(CueKind::FloorPlan, 1.0, field)],
            SceneType::FloorPlan,
            &params,
        )
        .unwrap();
        assert_eq!(fused.depth.min_max(), (0.0, 1.0));
        assert!(fused.confidence.data().iter().all(|&c| (c - 0.95).abs() < 1e-5));
    }

    #[test]
    fn test_disagreement_lowers_confidence() {
        let agree = Field::from_fn(30, 30, |_, y| y as f32 / 29.0);
        let disagree = Field::from_fn(30, 30, |x, y| {
            if x < 15 {
                y as f32 / 29.0
            } else {
                1.0 - y as f32 / 29.0
            }
        });
        let params = FusionParams {
            smoothing: Smoothing::None,
            ..FusionParams::default()
        };
        let fused = fuse(
            vec![
                cue(CueKind::Perspective, 0.5, agree),
                cue(CueKind::Edge, 0.5, disagree),
            ],
            SceneType::General,
            &params,
        )
        .unwrap();
        // Left half agrees everywhere; right half disagrees away from the middle row
        assert!(fused.confidence.get(5, 2) > fused.confidence.get(25, 2));
    }

    #[test]
    fn test_empty_and_mismatched_inputs_fail() {
        let err = fuse(Vec::new(), SceneType::General, &FusionParams::default()).unwrap_err();
        assert_eq!(err.stage(), "fusion");

        let cues = vec![
            cue(CueKind::Edge, 0.5, Field::new(4, 4)),
            cue(CueKind::Texture, 0.5, Field::new(5, 4)),
        ];
        assert!(fuse(cues, SceneType::General, &FusionParams::default()).is_err());
    }

    #[test]
    fn test_single_row_fallback_is_horizontal() {
        let ramp = fallback_gradient(5, 1);
        assert_eq!(ramp.data(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
