// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::vertical_ramp;
use crate::field::Field;
use crate::preprocess::PreprocessedImage;
use crate::types::SceneType;
use serde::{Deserialize, Serialize};

/// Blend weights of the photometric term in each scene heuristic. The
/// gradient takes the remainder, so keeping these small keeps relief gentle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    /// Darker surfaces read as nearer in a room
    pub indoor_darkness: f32,
    /// Saturated foreground against a washed-out horizon
    pub outdoor_saturation: f32,
    /// Exponent on the vertical ramp for landscapes (flattens the far field)
    pub outdoor_exponent: f32,
    pub portrait_contrast: f32,
    pub general_brightness: f32,
    pub contrast_window: usize,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            indoor_darkness: 0.15,
            outdoor_saturation: 0.15,
            outdoor_exponent: 1.5,
            portrait_contrast: 0.2,
            general_brightness: 0.1,
            contrast_window: 9,
        }
    }
}

/// Low-amplitude scene prior: a vertical (or, for portraits, radial)
/// gradient plus a small photometric term.
pub(super) fn estimate(
    image: &PreprocessedImage,
    scene: SceneType,
    weights: &HeuristicWeights,
) -> Field {
    let (width, height) = image.dimensions();
    let vertical = vertical_ramp(width, height);
    let brightness = image.gray_field().normalized();

    let (gradient, term, w) = match scene {
        SceneType::IndoorRoom => (vertical, brightness.inverted(), weights.indoor_darkness),
        SceneType::OutdoorLandscape => {
            let exponent = weights.outdoor_exponent;
            (
                vertical.map(|v| v.powf(exponent)),
                image.hsv.saturation.normalized(),
                weights.outdoor_saturation,
            )
        }
        SceneType::Portrait => {
            let contrast = image
                .gray_field()
                .local_variance(weights.contrast_window)
                .normalized();
            (radial(width, height), contrast, weights.portrait_contrast)
        }
        SceneType::FloorPlan | SceneType::General => {
            (vertical, brightness, weights.general_brightness)
        }
    };

    let w = w.clamp(0.0, 1.0);
    Field::weighted_sum(width, height, &[(&gradient, 1.0 - w), (&term, w)])
}

/// 1 at the frame centre falling to 0 at the corners
fn radial(width: u32, height: u32) -> Field {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max = (cx * cx + cy * cy).sqrt().max(f32::EPSILON);
    Field::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        1.0 - (dx * dx + dy * dy).sqrt() / max
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::textured_scene;
    use super::*;

    #[test]
    fn test_radial_profile() {
        let field = radial(5, 5);
        assert_eq!(field.get(2, 2), 1.0);
        assert!(field.get(0, 0).abs() < 1e-6);
        assert!(field.get(2, 0) > field.get(0, 0));
    }

    #[test]
    fn test_gradient_dominates_every_scene() {
        let image = textured_scene(48, 64);
        let weights = HeuristicWeights::default();
        for scene in [
            SceneType::IndoorRoom,
            SceneType::OutdoorLandscape,
            SceneType::General,
        ] {
            let field = estimate(&image, scene, &weights);
            assert!(field.get(24, 63) > field.get(24, 0) + 0.5, "{scene}");
        }
        let portrait = estimate(&image, SceneType::Portrait, &weights);
        assert!(portrait.get(24, 32) > portrait.get(0, 0) + 0.5);
    }
}
