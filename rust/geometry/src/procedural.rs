// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Procedural enrichment of a reconstructed surface with geometry the camera
//! never saw: back wall, floor slab, side walls, ceiling and simple props.
//!
//! Everything here is derived from the base mesh's axis-aligned bounds only;
//! generated parts are appended by concatenation without welding.

use crate::mesh::{Bounds, Mesh};
use crate::primitives::{box_mesh, cylinder};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const WALL_COLOR: [u8; 3] = [178, 178, 178];
const SIDE_WALL_COLOR: [u8; 3] = [166, 166, 166];
const FLOOR_COLOR: [u8; 3] = [77, 77, 77];
const CEILING_COLOR: [u8; 3] = [204, 204, 204];
const FURNITURE_COLOR: [u8; 3] = [153, 102, 77];
const PILLAR_COLOR: [u8; 3] = [128, 128, 128];

/// How much extra geometry to add
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomComplexity {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for RoomComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown room complexity '{other}'")),
        }
    }
}

impl fmt::Display for RoomComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Kind of space being completed. Decides ceiling and prop placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneStyle {
    /// Furnished room: ceiling plus a furniture placeholder
    Interior,
    /// Structural space: ceiling plus corner pillars at high complexity
    Building,
    /// Open scene: no ceiling, no props
    Exterior,
}

/// Parameters for [`enrich`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProceduralConfig {
    pub complexity: RoomComplexity,
    pub style: SceneStyle,
    /// Thickness of back and side walls
    pub wall_thickness: f32,
    /// Thickness of the floor and ceiling slabs
    pub slab_thickness: f32,
    /// Gap between the top of the bounds and the ceiling slab
    pub ceiling_clearance: f32,
    /// Emit walls, ceiling and props; the floor is always generated
    pub generate_interiors: bool,
}

impl Default for ProceduralConfig {
    fn default() -> Self {
        Self {
            complexity: RoomComplexity::Medium,
            style: SceneStyle::Interior,
            wall_thickness: 0.3,
            slab_thickness: 0.1,
            ceiling_clearance: 0.0,
            generate_interiors: true,
        }
    }
}

/// Generate the enrichment parts for `bounds` without touching any mesh
pub fn generate_parts(bounds: &Bounds, config: &ProceduralConfig) -> Vec<Mesh> {
    let mut parts = Vec::new();

    if config.generate_interiors {
        parts.push(back_wall(bounds, config));
    }
    parts.push(floor_slab(bounds, config));
    if config.generate_interiors {
        parts.extend(side_walls(bounds, config));
        if config.complexity != RoomComplexity::Low {
            parts.extend(props(bounds, config));
        }
        if matches!(config.style, SceneStyle::Interior | SceneStyle::Building) {
            parts.push(ceiling(bounds, config));
        }
    }
    parts
}

/// Append generated parts to `mesh`. Returns the number of parts added.
pub fn enrich(mesh: &mut Mesh, config: &ProceduralConfig) -> usize {
    if mesh.is_empty() {
        tracing::warn!("Skipping procedural enrichment of an empty mesh");
        return 0;
    }
    let bounds = mesh.bounds();
    let parts = generate_parts(&bounds, config);
    mesh.merge_all(&parts);

    tracing::debug!(
        parts = parts.len(),
        style = ?config.style,
        complexity = %config.complexity,
        vertices = mesh.vertex_count(),
        "Procedural enrichment"
    );
    parts.len()
}

/// Slab behind the furthest point, 30% of the depth extent further back
fn back_wall(b: &Bounds, config: &ProceduralConfig) -> Mesh {
    let back_z = b.min.z - b.size().z * 0.3;
    box_mesh(
        Point3::new(b.min.x, b.min.y, back_z - config.wall_thickness),
        Point3::new(b.max.x, b.max.y, back_z),
        WALL_COLOR,
    )
}

/// Slab just below the lowest point, widened by 20% of the footprint
fn floor_slab(b: &Bounds, config: &ProceduralConfig) -> Mesh {
    let floor_y = b.min.y - 0.05;
    let margin = b.size().x.max(b.size().z) * 0.2;
    box_mesh(
        Point3::new(b.min.x - margin, floor_y - config.slab_thickness, b.min.z - margin),
        Point3::new(b.max.x + margin, floor_y, b.max.z + margin),
        FLOOR_COLOR,
    )
}

fn side_walls(b: &Bounds, config: &ProceduralConfig) -> [Mesh; 2] {
    let t = config.wall_thickness;
    let size = b.size();
    let (min_y, max_y) = (b.min.y - size.y * 0.1, b.max.y + size.y * 0.1);
    let min_z = b.min.z - size.z * 0.2;

    let left_x = b.min.x - t;
    let right_x = b.max.x + t;
    [
        box_mesh(
            Point3::new(left_x, min_y, min_z),
            Point3::new(left_x + t, max_y, b.max.z),
            SIDE_WALL_COLOR,
        ),
        box_mesh(
            Point3::new(right_x - t, min_y, min_z),
            Point3::new(right_x, max_y, b.max.z),
            SIDE_WALL_COLOR,
        ),
    ]
}

fn ceiling(b: &Bounds, config: &ProceduralConfig) -> Mesh {
    let ceiling_y = b.max.y + config.ceiling_clearance;
    let margin = b.size().x.max(b.size().z) * 0.2;
    box_mesh(
        Point3::new(b.min.x - margin, ceiling_y, b.min.z - margin),
        Point3::new(b.max.x + margin, ceiling_y + config.slab_thickness, b.max.z + margin),
        CEILING_COLOR,
    )
}

fn props(b: &Bounds, config: &ProceduralConfig) -> Vec<Mesh> {
    match config.style {
        SceneStyle::Interior => {
            let side = b.size().x * 0.15;
            if side <= 0.0 {
                return Vec::new();
            }
            let min = Point3::new(
                b.center().x - side / 2.0,
                b.min.y,
                b.min.z + b.size().z * 0.3,
            );
            vec![box_mesh(
                min,
                Point3::new(min.x + side, min.y + side * 0.8, min.z + side),
                FURNITURE_COLOR,
            )]
        }
        SceneStyle::Building if config.complexity == RoomComplexity::High => {
            let height = b.size().y;
            if height <= 0.0 {
                return Vec::new();
            }
            [b.min.x, b.max.x]
                .into_iter()
                .map(|x| cylinder(Point3::new(x, b.min.y, b.min.z), 0.2, height, 16, PILLAR_COLOR))
                .collect()
        }
        _ => Vec::new(),
    }
}
