// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth estimation behind a pluggable source
//!
//! [`CueFusionSource`] runs the scene classifier, evaluates the cue plan for
//! the scene and fuses the results. [`DepthMapSource`] accepts a depth image
//! produced elsewhere (for example by a neural network) and puts it through
//! the same repair and validation, so downstream stages cannot tell the two
//! apart.

use crate::cues::{compute_cue, CueKind, CueParams};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::fusion::{self, CueField, FusionParams, Smoothing};
use crate::preprocess::{load_image, PreprocessConfig, PreprocessedImage};
use crate::scene::{classify_scene, SceneStats, SceneThresholds};
use crate::types::SceneType;
use image::{ImageReader, Rgb, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Normalised depth, higher = nearer (or taller, for floor plans)
#[derive(Debug, Clone, PartialEq)]
pub struct DepthField(Field);

/// Per-pixel trust in a [`DepthField`], higher = more reliable
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceField(Field);

fn check_unit(field: &Field, what: &'static str) -> Result<()> {
    if field.is_empty() {
        return Err(Error::depth("validation", format!("{what} field is empty")));
    }
    if !field.is_finite() {
        return Err(Error::depth("validation", format!("{what} field has non-finite values")));
    }
    let (min, max) = field.min_max();
    if min < 0.0 || max > 1.0 {
        return Err(Error::depth(
            "validation",
            format!("{what} field outside [0,1]: {min}..{max}"),
        ));
    }
    Ok(())
}

macro_rules! unit_field {
    ($ty:ident, $what:literal) => {
        impl $ty {
            /// Wrap a field after checking it is finite and inside [0,1]
            pub fn try_from_field(field: Field) -> Result<Self> {
                check_unit(&field, $what)?;
                Ok(Self(field))
            }

            pub fn into_inner(self) -> Field {
                self.0
            }
        }

        impl Deref for $ty {
            type Target = Field;

            fn deref(&self) -> &Field {
                &self.0
            }
        }
    };
}

unit_field!(DepthField, "depth");
unit_field!(ConfidenceField, "confidence");

/// How a source arrived at its estimate
#[derive(Debug, Clone, Serialize)]
pub struct DepthReport {
    pub source: String,
    pub scene: SceneType,
    pub stats: SceneStats,
    pub cues_used: Vec<CueKind>,
    /// Cues skipped because they failed, with the reason
    pub cues_failed: Vec<(CueKind, String)>,
    /// The fused depth was degenerate and replaced by a gradient
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct DepthEstimate {
    pub depth: DepthField,
    pub confidence: ConfidenceField,
    pub report: DepthReport,
}

impl DepthEstimate {
    pub fn scene(&self) -> SceneType {
        self.report.scene
    }
}

/// Anything that can turn a preprocessed image into depth and confidence
pub trait DepthSource: Send + Sync {
    fn name(&self) -> &str;

    fn estimate(&self, image: &PreprocessedImage) -> Result<DepthEstimate>;
}

/// Which cues are blended and with what weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Floor plans use the wall segmentation alone; everything else blends the
    /// scene heuristic with edge structure.
    SceneConditioned { scene_weight: f32, edge_weight: f32 },
    /// Fixed table independent of the scene
    Weighted { weights: Vec<(CueKind, f32)> },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        FusionStrategy::SceneConditioned {
            scene_weight: 0.8,
            edge_weight: 0.2,
        }
    }
}

impl FusionStrategy {
    /// The classic five-cue blend
    pub fn five_cue() -> Self {
        FusionStrategy::Weighted {
            weights: vec![
                (CueKind::Perspective, 0.30),
                (CueKind::Edge, 0.25),
                (CueKind::Atmospheric, 0.20),
                (CueKind::Texture, 0.15),
                (CueKind::Saliency, 0.10),
            ],
        }
    }

    /// Cue plan for a classified scene
    pub fn plan(&self, scene: SceneType) -> Vec<(CueKind, f32)> {
        match self {
            FusionStrategy::SceneConditioned { .. } if scene == SceneType::FloorPlan => {
                vec![(CueKind::FloorPlan, 1.0)]
            }
            FusionStrategy::SceneConditioned {
                scene_weight,
                edge_weight,
            } => vec![
                (CueKind::SceneHeuristic, *scene_weight),
                (CueKind::Edge, *edge_weight),
            ],
            FusionStrategy::Weighted { weights } => weights.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        let weights: Vec<f32> = match self {
            FusionStrategy::SceneConditioned {
                scene_weight,
                edge_weight,
            } => vec![*scene_weight, *edge_weight],
            FusionStrategy::Weighted { weights } => weights.iter().map(|(_, w)| *w).collect(),
        };
        if weights.is_empty() {
            return Err(Error::Config("fusion strategy has no cues".into()));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::Config("cue weights must be non-negative".into()));
        }
        let total: f32 = weights.iter().sum();
        if total > 1.0 + 1e-4 {
            return Err(Error::Config(format!("cue weights sum to {total}, above 1")));
        }
        Ok(())
    }
}

/// Everything the depth stage can be tuned with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    pub preprocess: PreprocessConfig,
    pub thresholds: SceneThresholds,
    pub cues: CueParams,
    pub strategy: FusionStrategy,
    pub fusion: FusionParams,
    /// Evaluate independent cues concurrently
    pub parallel: bool,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self::quality()
    }
}

impl DepthConfig {
    /// 640 px cap, scene-conditioned blend, bilateral smoothing
    pub fn quality() -> Self {
        Self {
            preprocess: PreprocessConfig { max_dimension: 640 },
            thresholds: SceneThresholds::default(),
            cues: CueParams::default(),
            strategy: FusionStrategy::default(),
            fusion: FusionParams::default(),
            parallel: true,
        }
    }

    /// 512 px cap and Gaussian smoothing for constrained hosts
    pub fn low_memory() -> Self {
        Self {
            preprocess: PreprocessConfig { max_dimension: 512 },
            fusion: FusionParams {
                smoothing: Smoothing::Gaussian { kernel_size: 15 },
                ..FusionParams::default()
            },
            parallel: false,
            ..Self::quality()
        }
    }

    /// Fixed five-cue weighting regardless of scene
    pub fn multi_cue() -> Self {
        Self {
            strategy: FusionStrategy::five_cue(),
            ..Self::quality()
        }
    }

    /// Look up a preset by its CLI name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "quality" => Some(Self::quality()),
            "low-memory" | "low_memory" => Some(Self::low_memory()),
            "multi-cue" | "multi_cue" => Some(Self::multi_cue()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        if self.preprocess.max_dimension < 2 {
            return Err(Error::Config("max_dimension must be at least 2".into()));
        }
        if self.cues.edge_thresholds.len() != self.cues.edge_weights.len() {
            return Err(Error::Config(
                "edge_thresholds and edge_weights differ in length".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fusion.architectural_confidence) {
            return Err(Error::Config("architectural_confidence must lie in [0,1]".into()));
        }
        Ok(())
    }
}

/// Multi-cue estimator: classify, evaluate the cue plan, fuse
#[derive(Debug, Clone, Default)]
pub struct CueFusionSource {
    config: DepthConfig,
}

impl CueFusionSource {
    pub fn new(config: DepthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DepthConfig {
        &self.config
    }
}

impl DepthSource for CueFusionSource {
    fn name(&self) -> &str {
        "cue_fusion"
    }

    fn estimate(&self, image: &PreprocessedImage) -> Result<DepthEstimate> {
        let config = &self.config;
        let analysis = classify_scene(image, &config.thresholds);
        let scene = analysis.scene;
        let plan = config.strategy.plan(scene);

        let evaluate = |&(kind, weight): &(CueKind, f32)| {
            let _span = tracing::debug_span!("cue", cue = %kind).entered();
            (kind, weight, compute_cue(kind, image, scene, &config.cues))
        };
        let results: Vec<_> = if config.parallel {
            plan.par_iter().map(evaluate).collect()
        } else {
            plan.iter().map(evaluate).collect()
        };

        let mut cues = Vec::with_capacity(results.len());
        let mut cues_failed = Vec::new();
        for (kind, weight, result) in results {
            match result {
                Ok(field) => cues.push(CueField {
                    kind,
                    weight,
                    field,
                }),
                Err(e) => {
                    tracing::warn!(cue = %kind, error = %e, "Skipping failed cue");
                    cues_failed.push((kind, e.to_string()));
                }
            }
        }
        if cues.is_empty() {
            return Err(Error::depth("cues", "every depth cue failed"));
        }
        let cues_used: Vec<CueKind> = cues.iter().map(|c| c.kind).collect();

        let fused = fusion::fuse(cues, scene, &config.fusion)?;
        tracing::info!(
            scene = %scene,
            cues = cues_used.len(),
            failed = cues_failed.len(),
            fallback = fused.fallback,
            "Depth estimated"
        );

        Ok(DepthEstimate {
            depth: DepthField::try_from_field(fused.depth)?,
            confidence: ConfidenceField::try_from_field(fused.confidence)?,
            report: DepthReport {
                source: self.name().to_string(),
                scene,
                stats: analysis.stats,
                cues_used,
                cues_failed,
                fallback: fused.fallback,
            },
        })
    }
}

/// Depth read from an image file produced by an external estimator
#[derive(Debug, Clone)]
pub struct DepthMapSource {
    path: PathBuf,
    /// Set when the map stores distance (bright = far) rather than nearness
    pub invert: bool,
    pub thresholds: SceneThresholds,
    pub fusion: FusionParams,
}

impl DepthMapSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            invert: false,
            thresholds: SceneThresholds::default(),
            fusion: FusionParams::default(),
        }
    }

    fn load(&self) -> Result<Field> {
        let decoded = ImageReader::open(&self.path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|source| Error::Read {
                path: self.path.clone(),
                source,
            })?
            .decode()
            .map_err(|source| Error::Load {
                path: self.path.clone(),
                source,
            })?;
        let luma = decoded.to_luma32f();
        let (width, height) = luma.dimensions();
        Field::from_vec(width, height, luma.into_raw()).ok_or_else(|| {
            Error::depth("depth_map", "decoded depth map has inconsistent size")
        })
    }
}

impl DepthSource for DepthMapSource {
    fn name(&self) -> &str {
        "depth_map"
    }

    fn estimate(&self, image: &PreprocessedImage) -> Result<DepthEstimate> {
        let (width, height) = image.dimensions();
        let mut raw = self.load()?.resize(width, height);
        if self.invert {
            raw = raw.normalized().inverted();
        }

        let analysis = classify_scene(image, &self.thresholds);
        let scene = analysis.scene;
        let (depth, fallback) = fusion::finalize_depth(raw, scene, &self.fusion);
        let confidence = fusion::confidence(&depth, &[], scene, &self.fusion);
        fusion::validate(&depth, &confidence, self.fusion.min_range)?;
        tracing::info!(path = %self.path.display(), scene = %scene, fallback, "Depth map loaded");

        Ok(DepthEstimate {
            depth: DepthField::try_from_field(depth)?,
            confidence: ConfidenceField::try_from_field(confidence)?,
            report: DepthReport {
                source: self.name().to_string(),
                scene,
                stats: analysis.stats,
                cues_used: Vec::new(),
                cues_failed: Vec::new(),
                fallback,
            },
        })
    }
}

/// Load an image and estimate its depth with the multi-cue source.
///
/// Returns the preprocessed image alongside the estimate since
/// reconstruction needs both at the same resolution.
pub fn estimate_depth(path: &Path, config: &DepthConfig) -> Result<(PreprocessedImage, DepthEstimate)> {
    let source = CueFusionSource::new(config.clone())?;
    let image = load_image(path, &config.preprocess)?;
    let estimate = source.estimate(&image)?;
    Ok((image, estimate))
}

/// Inferno colour ramp control points, far (dark) to near (bright)
const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

/// Render depth as a colour image: dark purple is far, bright yellow is near
pub fn visualize_depth(depth: &DepthField) -> RgbImage {
    let segments = (INFERNO.len() - 1) as f32;
    RgbImage::from_fn(depth.width(), depth.height(), |x, y| {
        let t = depth.get(x, y).clamp(0.0, 1.0) * segments;
        let i = (t.floor() as usize).min(INFERNO.len() - 2);
        let f = t - i as f32;
        let (a, b) = (INFERNO[i], INFERNO[i + 1]);
        Rgb(std::array::from_fn(|c| {
            (a[c] as f32 + (b[c] as f32 - a[c] as f32) * f).round() as u8
        }))
    })
}
