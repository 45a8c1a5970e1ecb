// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Depth-to-geometry reconstruction
//!
//! Two paths share one post-processing tail:
//!
//! - **Wall extrusion** when the depth is bimodal (a floor plan's wall/floor
//!   split): wall contours are simplified and every edge becomes a vertical
//!   panel standing on a floor quad. Image x maps to 3D x, image y to 3D z,
//!   walls rise along +y.
//! - **Height map** otherwise: the pixel grid is triangulated directly, with
//!   image x/y on 3D x/y (y up) and depth pushed out along +z.
//!
//! Both land in the `[-1, 1]` square regardless of resolution or sampling
//! stride. Empty results are replaced by a fixed slab so callers always
//! receive renderable geometry.

mod heightmap;
mod walls;

use crate::depth::{ConfidenceField, DepthField};
use crate::error::{Error, Result};
use crate::preprocess::PreprocessedImage;
use crate::types::SceneType;
use scenelift_geometry::{box_mesh, clean, CleanupOptions, CleanupStats, Mesh, Point3};
use serde::{Deserialize, Serialize};

/// Depth-to-height multiplier per scene type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthScales {
    pub floor_plan: f32,
    pub indoor_room: f32,
    pub outdoor_landscape: f32,
    pub portrait: f32,
    pub general: f32,
}

impl Default for DepthScales {
    fn default() -> Self {
        Self {
            floor_plan: 1.0,
            indoor_room: 0.5,
            outdoor_landscape: 0.4,
            portrait: 0.3,
            general: 0.15,
        }
    }
}

impl DepthScales {
    pub fn for_scene(&self, scene: SceneType) -> f32 {
        match scene {
            SceneType::FloorPlan => self.floor_plan,
            SceneType::IndoorRoom => self.indoor_room,
            SceneType::OutdoorLandscape => self.outdoor_landscape,
            SceneType::Portrait => self.portrait,
            SceneType::General => self.general,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub depth_scales: DepthScales,
    /// Wall panel height above the floor
    pub ceiling_height: f32,
    /// Depth at or above which a pixel is wall
    pub wall_threshold: f32,
    /// Width of the low and high depth bands checked for bimodality
    pub architectural_band: f32,
    /// Fraction of depth values that must fall in those bands
    pub architectural_ratio: f32,
    /// Contour simplification tolerance as a fraction of the contour perimeter
    pub contour_tolerance: f64,
    /// Contours enclosing fewer square pixels are ignored
    pub min_contour_area: f64,
    /// Drop height-map vertices whose confidence is below this
    pub confidence_filter: Option<f32>,
    /// Vertex budget for the height map; the sampling stride grows to fit
    pub max_vertices: usize,
    /// Longer-side sizes above which the stride becomes 2 and 4
    pub stride_thresholds: (u32, u32),
    /// Coordinates beyond this magnitude are reported as suspicious
    pub max_extent: f32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            depth_scales: DepthScales::default(),
            ceiling_height: 2.5,
            wall_threshold: 0.5,
            architectural_band: 0.2,
            architectural_ratio: 0.6,
            contour_tolerance: 0.01,
            min_contour_area: 16.0,
            confidence_filter: None,
            max_vertices: 100_000,
            stride_thresholds: (512, 1024),
            max_extent: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionKind {
    HeightMap,
    WallExtrusion,
}

/// What reconstruction did, for logs and job reports
#[derive(Debug, Clone)]
pub struct ReconstructionReport {
    pub kind: ReconstructionKind,
    /// Pixel sampling stride of the height map (1 for wall extrusion)
    pub stride: u32,
    pub contours: usize,
    pub wall_panels: usize,
    /// The fixed slab replaced empty geometry
    pub fallback_box: bool,
    pub cleanup: CleanupStats,
}

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub mesh: Mesh,
    pub report: ReconstructionReport,
}

/// Build the base mesh for an image and its depth.
pub fn build_mesh(
    image: &PreprocessedImage,
    depth: &DepthField,
    confidence: &ConfidenceField,
    scene: SceneType,
    config: &MeshConfig,
) -> Result<Mesh> {
    reconstruct(image, depth, confidence, scene, config).map(|r| r.mesh)
}

/// [`build_mesh`] with a report of the path taken
pub fn reconstruct(
    image: &PreprocessedImage,
    depth: &DepthField,
    confidence: &ConfidenceField,
    scene: SceneType,
    config: &MeshConfig,
) -> Result<Reconstruction> {
    let dims = image.dimensions();
    if depth.dimensions() != dims || confidence.dimensions() != dims {
        return Err(Error::mesh(
            "input",
            format!(
                "image {:?}, depth {:?} and confidence {:?} differ in size",
                dims,
                depth.dimensions(),
                confidence.dimensions()
            ),
        ));
    }

    let kind = if is_architectural(depth, config) {
        ReconstructionKind::WallExtrusion
    } else {
        ReconstructionKind::HeightMap
    };

    let (mut mesh, stride, contours, wall_panels) = match kind {
        ReconstructionKind::WallExtrusion => {
            let walls = walls::extrude(image, depth, config);
            (walls.mesh, 1, walls.contours, walls.panels)
        }
        ReconstructionKind::HeightMap => {
            let stride = sampling_stride(dims, config);
            let scale = config.depth_scales.for_scene(scene);
            let mesh = heightmap::triangulate(image, depth, confidence, stride, scale, config);
            (mesh, stride, 0, 0)
        }
    };

    let mut cleanup = clean(&mut mesh, &CleanupOptions::default());
    let mut fallback_box = false;
    if mesh.is_empty() || mesh.triangle_count() == 0 {
        tracing::warn!(?kind, "Reconstruction produced no geometry, using fallback slab");
        mesh = fallback_slab();
        cleanup = clean(&mut mesh, &CleanupOptions::default());
        fallback_box = true;
    }

    mesh.validate()
        .map_err(|e| Error::mesh("validation", e.to_string()))?;

    let extent = mesh.max_abs_coordinate();
    if extent > config.max_extent {
        tracing::warn!(extent, limit = config.max_extent, "Mesh coordinates exceed expected range");
    }

    tracing::info!(
        ?kind,
        stride,
        contours,
        wall_panels,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Mesh reconstructed"
    );

    Ok(Reconstruction {
        mesh,
        report: ReconstructionReport {
            kind,
            stride,
            contours,
            wall_panels,
            fallback_box,
            cleanup,
        },
    })
}

/// True when enough depth values sit in the extreme bands `[0, band)` and
/// `[1 - band, 1]` to look like a wall/floor split rather than a continuous
/// surface
pub fn is_architectural(depth: &DepthField, config: &MeshConfig) -> bool {
    if depth.is_empty() {
        return false;
    }
    let band = config.architectural_band;
    let low = 0.0..band;
    let high = (1.0 - band)..=1.0;
    let extreme = depth
        .data()
        .iter()
        .filter(|&v| low.contains(v) || high.contains(v))
        .count();
    extreme as f32 / depth.len() as f32 >= config.architectural_ratio
}

/// Integer stride that keeps the height map inside its resource budget
pub fn sampling_stride((width, height): (u32, u32), config: &MeshConfig) -> u32 {
    let longer = width.max(height);
    let (medium, large) = config.stride_thresholds;
    let mut stride = if longer > large {
        4
    } else if longer > medium {
        2
    } else {
        1
    };

    let samples = |s: u32| (width.div_ceil(s) as usize + 1) * (height.div_ceil(s) as usize + 1);
    while samples(stride) > config.max_vertices && stride < longer.max(1) {
        stride *= 2;
    }
    stride
}

/// Grey floor slab spanning the unit square
fn fallback_slab() -> Mesh {
    box_mesh(
        Point3::new(-1.0, -0.1, -1.0),
        Point3::new(1.0, 0.0, 1.0),
        [128, 128, 128],
    )
}

/// Map a pixel coordinate onto `[-1, 1]`
#[inline]
pub(crate) fn to_unit(p: f64, len: u32) -> f32 {
    if len <= 1 {
        0.0
    } else {
        (2.0 * p / (len - 1) as f64 - 1.0) as f32
    }
}
