// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end image to 3D environment pipeline

use crate::depth::{
    ConfidenceField, CueFusionSource, DepthConfig, DepthField, DepthMapSource, DepthReport,
    DepthSource,
};
use crate::error::Result;
use crate::preprocess::load_image;
use crate::reconstruct::{reconstruct, MeshConfig, ReconstructionReport};
use crate::types::{GenerationOptions, SceneType};
use scenelift_geometry::{enrich, Mesh, ProceduralConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Progress checkpoints reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    EstimatingDepth,
    GeneratingMesh,
    Hallucinating,
    Complete,
}

impl PipelineStage {
    /// Completion percentage at the start of the stage
    pub fn progress(self) -> u8 {
        match self {
            PipelineStage::EstimatingDepth => 20,
            PipelineStage::GeneratingMesh => 40,
            PipelineStage::Hallucinating => 60,
            PipelineStage::Complete => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStage::EstimatingDepth => "Estimating depth",
            PipelineStage::GeneratingMesh => "Generating base mesh",
            PipelineStage::Hallucinating => "Hallucinating unseen areas",
            PipelineStage::Complete => "Complete",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub depth: DepthConfig,
    pub mesh: MeshConfig,
    /// Use this externally produced depth image instead of cue fusion
    pub depth_map: Option<PathBuf>,
    /// The depth map stores distance (bright = far)
    pub invert_depth_map: bool,
}

/// Wall-clock time spent per stage
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub load_ms: u128,
    pub depth_ms: u128,
    pub mesh_ms: u128,
    pub enrich_ms: u128,
}

/// Everything produced for one input image
#[derive(Debug, Clone)]
pub struct GeneratedEnvironment {
    pub mesh: Mesh,
    pub depth: DepthField,
    pub confidence: ConfidenceField,
    pub scene: SceneType,
    pub depth_report: DepthReport,
    pub reconstruction: ReconstructionReport,
    /// Procedural parts appended to the base mesh
    pub enrichment_parts: usize,
    pub timings: StageTimings,
}

fn depth_source(config: &PipelineConfig) -> Result<Box<dyn DepthSource>> {
    let source: Box<dyn DepthSource> = match &config.depth_map {
        Some(path) => {
            let mut source = DepthMapSource::new(path);
            source.invert = config.invert_depth_map;
            source.thresholds = config.depth.thresholds.clone();
            source.fusion = config.depth.fusion.clone();
            Box::new(source)
        }
        None => Box::new(CueFusionSource::new(config.depth.clone())?),
    };
    Ok(source)
}

/// Run the whole pipeline: load, estimate depth, reconstruct, and optionally
/// complete the scene with procedural geometry.
///
/// `progress` is called once at the start of every stage.
pub fn generate_environment<F>(
    path: &Path,
    options: &GenerationOptions,
    config: &PipelineConfig,
    mut progress: F,
) -> Result<GeneratedEnvironment>
where
    F: FnMut(PipelineStage),
{
    let mut timings = StageTimings::default();
    let source = depth_source(config)?;

    let started = Instant::now();
    let image = load_image(path, &config.depth.preprocess)?;
    timings.load_ms = started.elapsed().as_millis();

    progress(PipelineStage::EstimatingDepth);
    let started = Instant::now();
    let estimate = source.estimate(&image)?;
    timings.depth_ms = started.elapsed().as_millis();
    let scene = estimate.scene();

    progress(PipelineStage::GeneratingMesh);
    let started = Instant::now();
    let reconstruction = reconstruct(
        &image,
        &estimate.depth,
        &estimate.confidence,
        scene,
        &config.mesh,
    )?;
    timings.mesh_ms = started.elapsed().as_millis();
    drop(image);

    let mut mesh = reconstruction.mesh;
    let mut enrichment_parts = 0;
    if options.hallucinate_unseen {
        progress(PipelineStage::Hallucinating);
        let started = Instant::now();
        let procedural = ProceduralConfig {
            complexity: options.room_complexity,
            style: scene.procedural_style(),
            wall_thickness: options.wall_thickness,
            generate_interiors: options.generate_interiors,
            ..ProceduralConfig::default()
        };
        enrichment_parts = enrich(&mut mesh, &procedural);
        mesh.validate()?;
        timings.enrich_ms = started.elapsed().as_millis();
    }

    progress(PipelineStage::Complete);
    tracing::info!(
        path = %path.display(),
        scene = %scene,
        source = source.name(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        parts = enrichment_parts,
        "Environment generated"
    );

    Ok(GeneratedEnvironment {
        mesh,
        depth: estimate.depth,
        confidence: estimate.confidence,
        scene,
        depth_report: estimate.report,
        reconstruction: reconstruction.report,
        enrichment_parts,
        timings,
    })
}
