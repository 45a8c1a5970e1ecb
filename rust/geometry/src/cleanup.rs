// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh cleanup: vertex welding, degenerate/duplicate face removal,
//! unreferenced vertex compaction and normal recomputation.

use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

/// Tolerances used by [`clean`]
#[derive(Debug, Clone, Copy)]
pub struct CleanupOptions {
    /// Positions closer than this (per axis) with identical colour are welded
    pub weld_epsilon: f32,
    /// Triangles with a cross-product magnitude below this are dropped
    pub min_area: f32,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            min_area: 1e-12,
        }
    }
}

/// What a cleanup pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub welded_vertices: usize,
    pub degenerate_faces: usize,
    pub duplicate_faces: usize,
    pub unreferenced_vertices: usize,
}

/// Run the full cleanup sequence and recompute normals.
pub fn clean(mesh: &mut Mesh, options: &CleanupOptions) -> CleanupStats {
    let stats = CleanupStats {
        welded_vertices: weld_vertices(mesh, options.weld_epsilon),
        degenerate_faces: remove_degenerate_faces(mesh, options.min_area),
        duplicate_faces: remove_duplicate_faces(mesh),
        unreferenced_vertices: remove_unreferenced_vertices(mesh),
    };
    calculate_normals(mesh);

    tracing::debug!(
        welded = stats.welded_vertices,
        degenerate = stats.degenerate_faces,
        duplicates = stats.duplicate_faces,
        unreferenced = stats.unreferenced_vertices,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Mesh cleanup"
    );
    stats
}

/// Merge vertices sharing a quantised position and colour. Returns the number
/// of vertices removed.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f32) -> usize {
    let vertex_count = mesh.vertex_count();
    if vertex_count == 0 {
        return 0;
    }
    let inv = 1.0 / epsilon.max(f32::EPSILON);

    let mut lookup: FxHashMap<([i64; 3], [u8; 3]), u32> = FxHashMap::default();
    let mut remap = Vec::with_capacity(vertex_count);
    let mut welded = Mesh::with_capacity(vertex_count, 0);

    for i in 0..vertex_count {
        let p = mesh.position(i);
        let key = (
            [
                (p.x * inv).round() as i64,
                (p.y * inv).round() as i64,
                (p.z * inv).round() as i64,
            ],
            mesh.color(i),
        );
        let target = *lookup.entry(key).or_insert_with(|| {
            let n = &mesh.normals[i * 3..i * 3 + 3];
            welded.add_vertex_with_normal(p, Vector3::new(n[0], n[1], n[2]), mesh.color(i))
        });
        remap.push(target);
    }

    let removed = vertex_count - welded.vertex_count();
    if removed > 0 {
        mesh.positions = welded.positions;
        mesh.normals = welded.normals;
        mesh.colors = welded.colors;
        for index in mesh.indices.iter_mut() {
            *index = remap[*index as usize];
        }
    }
    removed
}

/// Drop triangles with repeated indices or near-zero area. Returns the number
/// of triangles removed.
pub fn remove_degenerate_faces(mesh: &mut Mesh, min_area: f32) -> usize {
    let before = mesh.triangle_count();
    let positions = &mesh.positions;
    let point = |i: u32| {
        let i = i as usize * 3;
        Point3::new(positions[i], positions[i + 1], positions[i + 2])
    };

    let kept: Vec<u32> = mesh
        .indices
        .chunks_exact(3)
        .filter(|tri| {
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return false;
            }
            let (a, b, c) = (point(tri[0]), point(tri[1]), point(tri[2]));
            (b - a).cross(&(c - a)).norm() > min_area
        })
        .flatten()
        .copied()
        .collect();

    mesh.indices = kept;
    before - mesh.triangle_count()
}

/// Drop repeated triangles. Two faces are duplicates when they reference the
/// same vertices in the same cyclic order; opposite windings are kept.
pub fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    let before = mesh.triangle_count();
    let mut seen: FxHashSet<[u32; 3]> = FxHashSet::default();
    let mut kept = Vec::with_capacity(mesh.indices.len());

    for tri in mesh.indices.chunks_exact(3) {
        let start = (0..3).min_by_key(|&k| tri[k]).unwrap_or(0);
        let key = [tri[start], tri[(start + 1) % 3], tri[(start + 2) % 3]];
        if seen.insert(key) {
            kept.extend_from_slice(tri);
        }
    }

    mesh.indices = kept;
    before - mesh.triangle_count()
}

/// Remove vertices no triangle references and compact the buffers. Returns
/// the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let vertex_count = mesh.vertex_count();
    let mut used = vec![false; vertex_count];
    for &i in &mesh.indices {
        used[i as usize] = true;
    }

    let mut remap = vec![u32::MAX; vertex_count];
    let mut compact = Mesh::with_capacity(vertex_count, 0);
    for i in (0..vertex_count).filter(|&i| used[i]) {
        let n = &mesh.normals[i * 3..i * 3 + 3];
        remap[i] = compact.add_vertex_with_normal(
            mesh.position(i),
            Vector3::new(n[0], n[1], n[2]),
            mesh.color(i),
        );
    }

    let removed = vertex_count - compact.vertex_count();
    if removed > 0 {
        mesh.positions = compact.positions;
        mesh.normals = compact.normals;
        mesh.colors = compact.colors;
        for index in mesh.indices.iter_mut() {
            *index = remap[*index as usize];
        }
    }
    removed
}

/// Recompute smooth vertex normals from triangle winding.
///
/// Face normals are area weighted; a vertex whose faces cancel out gets +Y.
pub fn calculate_normals(mesh: &mut Mesh) {
    let vertex_count = mesh.vertex_count();
    if vertex_count == 0 {
        return;
    }

    let positions = &mesh.positions;
    let face_normals: Vec<Vector3<f64>> = mesh
        .indices
        .par_chunks_exact(3)
        .map(|tri| {
            let p = |i: u32| {
                let i = i as usize * 3;
                Point3::new(
                    positions[i] as f64,
                    positions[i + 1] as f64,
                    positions[i + 2] as f64,
                )
            };
            let (v0, v1, v2) = (p(tri[0]), p(tri[1]), p(tri[2]));
            (v1 - v0).cross(&(v2 - v0))
        })
        .collect();

    let mut normals = vec![Vector3::<f64>::zeros(); vertex_count];
    for (tri, normal) in mesh.indices.chunks_exact(3).zip(&face_normals) {
        for &i in tri {
            normals[i as usize] += normal;
        }
    }

    mesh.normals.clear();
    mesh.normals.reserve(vertex_count * 3);
    for normal in normals {
        let normalized = normal.try_normalize(1e-20).unwrap_or_else(Vector3::y);
        mesh.normals.push(normalized.x as f32);
        mesh.normals.push(normalized.y as f32);
        mesh.normals.push(normalized.z as f32);
    }
}
