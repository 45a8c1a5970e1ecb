// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parametric primitives: quads, boxes, cylinders.
//!
//! Every primitive is emitted with flat per-face normals and counter-clockwise
//! winding when seen from the side its normal points to.

use crate::mesh::Mesh;
use nalgebra::{Point3, Vector3};
use std::f32::consts::TAU;

/// Append a planar quad. `corners` must run around the perimeter; the
/// triangle order is chosen so the face normal agrees with `facing`.
pub fn add_quad(mesh: &mut Mesh, corners: [Point3<f32>; 4], facing: Vector3<f32>, color: [u8; 3]) {
    let [a, b, c, d] = corners;
    let geometric = (b - a).cross(&(c - a));
    let normal = facing.try_normalize(1e-12).unwrap_or_else(Vector3::y);

    let base = mesh.add_vertex_with_normal(a, normal, color);
    mesh.add_vertex_with_normal(b, normal, color);
    mesh.add_vertex_with_normal(c, normal, color);
    mesh.add_vertex_with_normal(d, normal, color);

    if geometric.dot(&facing) >= 0.0 {
        mesh.add_triangle(base, base + 1, base + 2);
        mesh.add_triangle(base, base + 2, base + 3);
    } else {
        mesh.add_triangle(base, base + 2, base + 1);
        mesh.add_triangle(base, base + 3, base + 2);
    }
}

/// Axis-aligned box with outward-facing normals (24 vertices, 12 triangles)
pub fn box_mesh(min: Point3<f32>, max: Point3<f32>, color: [u8; 3]) -> Mesh {
    let mut mesh = Mesh::with_capacity(24, 36);
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);
    let p = Point3::new;

    let faces = [
        ([p(x0, y0, z0), p(x0, y0, z1), p(x0, y1, z1), p(x0, y1, z0)], -Vector3::x()),
        ([p(x1, y0, z0), p(x1, y1, z0), p(x1, y1, z1), p(x1, y0, z1)], Vector3::x()),
        ([p(x0, y0, z0), p(x1, y0, z0), p(x1, y0, z1), p(x0, y0, z1)], -Vector3::y()),
        ([p(x0, y1, z0), p(x0, y1, z1), p(x1, y1, z1), p(x1, y1, z0)], Vector3::y()),
        ([p(x0, y0, z0), p(x0, y1, z0), p(x1, y1, z0), p(x1, y0, z0)], -Vector3::z()),
        ([p(x0, y0, z1), p(x1, y0, z1), p(x1, y1, z1), p(x0, y1, z1)], Vector3::z()),
    ];
    for (corners, facing) in faces {
        add_quad(&mut mesh, corners, facing, color);
    }
    mesh
}

/// Closed cylinder standing on `base_center`, axis along +Y
pub fn cylinder(
    base_center: Point3<f32>,
    radius: f32,
    height: f32,
    segments: u32,
    color: [u8; 3],
) -> Mesh {
    let segments = segments.max(3);
    let mut mesh = Mesh::with_capacity(segments as usize * 10, segments as usize * 12);
    let ring = |k: u32, y: f32| {
        let theta = TAU * k as f32 / segments as f32;
        Point3::new(
            base_center.x + radius * theta.cos(),
            y,
            base_center.z + radius * theta.sin(),
        )
    };
    let (y0, y1) = (base_center.y, base_center.y + height);

    for k in 0..segments {
        let (b0, b1) = (ring(k, y0), ring(k + 1, y0));
        let (t0, t1) = (ring(k, y1), ring(k + 1, y1));
        let mid = nalgebra::center(&b0, &b1);
        let outward = Vector3::new(mid.x - base_center.x, 0.0, mid.z - base_center.z);
        add_quad(&mut mesh, [b0, b1, t1, t0], outward, color);
    }

    for (y, facing) in [(y0, -Vector3::y()), (y1, Vector3::y())] {
        let center = mesh.add_vertex_with_normal(
            Point3::new(base_center.x, y, base_center.z),
            facing,
            color,
        );
        let first = mesh.vertex_count() as u32;
        for k in 0..segments {
            mesh.add_vertex_with_normal(ring(k, y), facing, color);
        }
        for k in 0..segments {
            let a = first + k;
            let b = first + (k + 1) % segments;
            // Ring runs counter-clockwise seen from -Y
            if facing.y < 0.0 {
                mesh.add_triangle(center, a, b);
            } else {
                mesh.add_triangle(center, b, a);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Sum of face normal · (face centroid - shape centre) must be positive
    /// for every face of a convex solid.
    fn assert_outward(mesh: &Mesh, centre: Point3<f32>) {
        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (
                mesh.position(tri[0] as usize),
                mesh.position(tri[1] as usize),
                mesh.position(tri[2] as usize),
            );
            let normal = (b - a).cross(&(c - a));
            let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            assert!(normal.dot(&(centroid - centre)) > 0.0, "inward face {tri:?}");
        }
    }

    #[test]
    fn test_box_is_closed_and_outward() {
        let mesh = box_mesh(Point3::new(-1.0, 0.0, -2.0), Point3::new(1.0, 0.5, 2.0), [1, 2, 3]);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert_outward(&mesh, Point3::new(0.0, 0.25, 0.0));

        let bounds = mesh.bounds();
        assert_eq!(bounds.size(), Vector3::new(2.0, 0.5, 4.0));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_quad_follows_facing() {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut front = Mesh::new();
        add_quad(&mut front, corners, Vector3::z(), [0, 0, 0]);
        let mut back = Mesh::new();
        add_quad(&mut back, corners, -Vector3::z(), [0, 0, 0]);

        assert_eq!(front.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(back.indices, vec![0, 2, 1, 0, 3, 2]);
        assert_relative_eq!(back.normals[2], -1.0);
    }

    #[test]
    fn test_cylinder_outward() {
        let mesh = cylinder(Point3::new(2.0, 0.0, 1.0), 0.5, 3.0, 12, [9, 9, 9]);
        assert_eq!(mesh.triangle_count(), 12 * 2 + 12 * 2);
        assert_outward(&mesh, Point3::new(2.0, 1.5, 1.0));
        let bounds = mesh.bounds();
        assert_relative_eq!(bounds.size().y, 3.0);
        assert_relative_eq!(bounds.size().x, 1.0, epsilon = 1e-5);
    }
}
