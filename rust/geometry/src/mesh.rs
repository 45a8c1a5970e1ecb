// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

/// Axis-aligned bounding box of a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    /// Midpoint of the box
    #[inline]
    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Extent along each axis
    #[inline]
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Largest extent across x/y/z
    #[inline]
    pub fn max_extent(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }
}

/// Triangle mesh with per-vertex colour
///
/// Buffers are flat so they can be handed to exporters and GPU uploads
/// without conversion: three floats per position/normal, three bytes per
/// colour, three indices per triangle.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Vertex colours (r, g, b), 0-255 per channel
    pub colors: Vec<u8>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            colors: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex and return its index. The normal is left zeroed until
    /// [`crate::calculate_normals`] runs.
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f32>, color: [u8; 3]) -> u32 {
        self.add_vertex_with_normal(position, Vector3::zeros(), color)
    }

    /// Add a vertex with a known normal and return its index
    #[inline]
    pub fn add_vertex_with_normal(
        &mut self,
        position: Point3<f32>,
        normal: Vector3<f32>,
        color: [u8; 3],
    ) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions
            .extend_from_slice(&[position.x, position.y, position.z]);
        self.normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
        self.colors.extend_from_slice(&color);
        index
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Position of vertex `index`
    #[inline]
    pub fn position(&self, index: usize) -> Point3<f32> {
        let p = &self.positions[index * 3..index * 3 + 3];
        Point3::new(p[0], p[1], p[2])
    }

    /// Colour of vertex `index`
    #[inline]
    pub fn color(&self, index: usize) -> [u8; 3] {
        let c = &self.colors[index * 3..index * 3 + 3];
        [c[0], c[1], c[2]]
    }

    /// Append another mesh. Vertices are not welded; the incoming indices are
    /// offset past the existing vertices.
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = self.vertex_count() as u32;

        self.positions.reserve(other.positions.len());
        self.normals.reserve(other.normals.len());
        self.colors.reserve(other.colors.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.colors.extend_from_slice(&other.colors);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Batch merge multiple meshes at once
    pub fn merge_all(&mut self, meshes: &[Mesh]) {
        let total_positions: usize = meshes.iter().map(|m| m.positions.len()).sum();
        let total_indices: usize = meshes.iter().map(|m| m.indices.len()).sum();

        self.positions.reserve(total_positions);
        self.normals.reserve(total_positions);
        self.colors.reserve(total_positions);
        self.indices.reserve(total_indices);

        for mesh in meshes {
            self.merge(mesh);
        }
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Axis-aligned bounds. An empty mesh reports a degenerate box at the origin.
    pub fn bounds(&self) -> Bounds {
        if self.is_empty() {
            return Bounds {
                min: Point3::origin(),
                max: Point3::origin(),
            };
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            let (x, y, z) = (chunk[0], chunk[1], chunk[2]);
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            min.z = min.z.min(z);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            max.z = max.z.max(z);
        });

        Bounds { min, max }
    }

    /// Largest absolute coordinate over all vertices
    pub fn max_abs_coordinate(&self) -> f32 {
        self.positions
            .iter()
            .fold(0.0f32, |acc, &v| acc.max(v.abs()))
    }

    /// Check the structural invariants every consumer relies on: non-empty,
    /// buffers in step, indices in range, finite coordinates.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() || self.indices.is_empty() {
            return Err(Error::EmptyMesh(format!(
                "{} vertices, {} triangles",
                self.vertex_count(),
                self.triangle_count()
            )));
        }
        if self.positions.len() % 3 != 0 || self.indices.len() % 3 != 0 {
            return Err(Error::MalformedBuffers(
                "position or index buffer is not a multiple of 3".into(),
            ));
        }
        if self.normals.len() != self.positions.len() || self.colors.len() != self.positions.len()
        {
            return Err(Error::MalformedBuffers(format!(
                "{} positions, {} normals, {} colours",
                self.positions.len(),
                self.normals.len(),
                self.colors.len()
            )));
        }

        let vertex_count = self.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::IndexOutOfBounds {
                index,
                vertex_count,
            });
        }

        if let Some(vertex) = self
            .positions
            .par_chunks_exact(3)
            .position_first(|p| !p.iter().all(|v| v.is_finite()))
        {
            return Err(Error::NonFiniteVertex { vertex });
        }

        Ok(())
    }

    /// Clear the mesh
    #[inline]
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.colors.clear();
        self.indices.clear();
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(offset: f32) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::new(offset, 0.0, 0.0), [255, 0, 0]);
        mesh.add_vertex(Point3::new(offset + 1.0, 0.0, 0.0), [0, 255, 0]);
        mesh.add_vertex(Point3::new(offset, 1.0, 0.0), [0, 0, 255]);
        mesh.add_triangle(0, 1, 2);
        mesh
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = Mesh::new();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_add_vertex_returns_index() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(1.0, 2.0, 3.0), [10, 20, 30]);
        let b = mesh.add_vertex_with_normal(Point3::new(4.0, 5.0, 6.0), Vector3::z(), [1, 2, 3]);
        assert_eq!((a, b), (0, 1));
        assert_eq!(mesh.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(mesh.normals, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.color(0), [10, 20, 30]);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut mesh = triangle(0.0);
        mesh.merge(&triangle(5.0));

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(&mesh.indices[3..], &[3, 4, 5]);
        assert_eq!(mesh.colors.len(), 18);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_bounds() {
        let mut mesh = triangle(-2.0);
        mesh.merge(&triangle(3.0));
        let bounds = mesh.bounds();

        assert_eq!(bounds.min, Point3::new(-2.0, 0.0, 0.0));
        assert_eq!(bounds.max, Point3::new(4.0, 1.0, 0.0));
        assert_eq!(bounds.center(), Point3::new(1.0, 0.5, 0.0));
        assert_eq!(bounds.size(), Vector3::new(6.0, 1.0, 0.0));
        assert_eq!(bounds.max_extent(), 6.0);
    }

    #[test]
    fn test_validate_rejects_bad_meshes() {
        assert!(matches!(Mesh::new().validate(), Err(Error::EmptyMesh(_))));

        let mut out_of_range = triangle(0.0);
        out_of_range.add_triangle(0, 1, 7);
        assert!(matches!(
            out_of_range.validate(),
            Err(Error::IndexOutOfBounds { index: 7, .. })
        ));

        let mut nan = triangle(0.0);
        nan.positions[4] = f32::NAN;
        assert!(matches!(
            nan.validate(),
            Err(Error::NonFiniteVertex { vertex: 1 })
        ));
    }
}
