// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{to_unit, MeshConfig};
use crate::depth::{ConfidenceField, DepthField};
use crate::field::sample_indices;
use crate::preprocess::PreprocessedImage;
use scenelift_geometry::{Mesh, Point3};

/// Triangulate the (subsampled) pixel grid as a displaced surface.
///
/// Every grid cell `tl tr / bl br` becomes `(tl, bl, tr)` and `(tr, bl, br)`,
/// counter-clockwise seen from +z. With a confidence filter, dropped vertices
/// are never emitted and only cells whose three corners survive produce a
/// triangle, through an explicit grid-to-vertex index map.
pub(super) fn triangulate(
    image: &PreprocessedImage,
    depth: &DepthField,
    confidence: &ConfidenceField,
    stride: u32,
    scale: f32,
    config: &MeshConfig,
) -> Mesh {
    let (width, height) = image.dimensions();
    let xs = sample_indices(width, stride);
    let ys = sample_indices(height, stride);
    let (gw, gh) = (xs.len(), ys.len());

    let mut mesh = Mesh::with_capacity(gw * gh, gw.saturating_sub(1) * gh.saturating_sub(1) * 6);
    let mut index_map: Vec<Option<u32>> = Vec::with_capacity(gw * gh);

    for &py in &ys {
        for &px in &xs {
            let keep = config
                .confidence_filter
                .map_or(true, |min| confidence.get(px, py) >= min);
            if !keep {
                index_map.push(None);
                continue;
            }
            let position = Point3::new(
                to_unit(px as f64, width),
                -to_unit(py as f64, height),
                depth.get(px, py) * scale,
            );
            let color = image.rgb.get_pixel(px, py).0;
            index_map.push(Some(mesh.add_vertex(position, color)));
        }
    }

    let mut dropped_cells = 0usize;
    for row in 0..gh.saturating_sub(1) {
        for col in 0..gw.saturating_sub(1) {
            let tl = index_map[row * gw + col];
            let tr = index_map[row * gw + col + 1];
            let bl = index_map[(row + 1) * gw + col];
            let br = index_map[(row + 1) * gw + col + 1];

            let mut emitted = false;
            if let (Some(tl), Some(bl), Some(tr)) = (tl, bl, tr) {
                mesh.add_triangle(tl, bl, tr);
                emitted = true;
            }
            if let (Some(tr), Some(bl), Some(br)) = (tr, bl, br) {
                mesh.add_triangle(tr, bl, br);
                emitted = true;
            }
            if !emitted {
                dropped_cells += 1;
            }
        }
    }

    tracing::debug!(
        grid = %format!("{gw}x{gh}"),
        stride,
        scale,
        dropped_cells,
        "Height map triangulated"
    );
    mesh
}
