// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{to_unit, MeshConfig};
use crate::depth::DepthField;
use crate::line_ops::{perimeter, signed_area, simplify_closed};
use crate::preprocess::PreprocessedImage;
use crate::types::Point2D;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use scenelift_geometry::{add_quad, Mesh, Point3, Vector3};

const DEFAULT_WALL_COLOR: [u8; 3] = [200, 200, 200];
const DEFAULT_FLOOR_COLOR: [u8; 3] = [120, 120, 120];

pub(super) struct Walls {
    pub mesh: Mesh,
    pub contours: usize,
    pub panels: usize,
}

/// Extrude the wall mask's simplified contours into vertical panels on top
/// of a floor quad covering the unit square.
pub(super) fn extrude(image: &PreprocessedImage, depth: &DepthField, config: &MeshConfig) -> Walls {
    let (width, height) = depth.dimensions();
    let mask = GrayImage::from_fn(width, height, |x, y| {
        Luma([if depth.get(x, y) >= config.wall_threshold { 255 } else { 0 }])
    });
    let (wall_color, floor_color) = mask_colors(image, &mask);

    let mut mesh = Mesh::new();
    let mut contours = 0;
    let mut panels = 0;

    for contour in find_contours::<i32>(&mask) {
        let ring: Vec<Point2D> = contour
            .points
            .iter()
            .map(|p| Point2D::new(p.x as f64, p.y as f64))
            .collect();
        let area = signed_area(&ring);
        if area.abs() < config.min_contour_area {
            continue;
        }

        let simplified = simplify_closed(&ring, config.contour_tolerance * perimeter(&ring));
        if simplified.len() < 3 {
            continue;
        }
        contours += 1;

        // Outer borders face away from the wall mass they enclose; hole
        // borders face into the room they enclose.
        let mut orientation = area.signum() as f32;
        if contour.border_type == BorderType::Hole {
            orientation = -orientation;
        }

        let n = simplified.len();
        for i in 0..n {
            let a = &simplified[i];
            let b = &simplified[(i + 1) % n];
            let (ax, az) = (to_unit(a.x, width), to_unit(a.y, height));
            let (bx, bz) = (to_unit(b.x, width), to_unit(b.y, height));
            let (dx, dz) = (bx - ax, bz - az);
            if dx.abs() < f32::EPSILON && dz.abs() < f32::EPSILON {
                continue;
            }

            let facing = Vector3::new(dz, 0.0, -dx) * orientation;
            let top = config.ceiling_height;
            add_quad(
                &mut mesh,
                [
                    Point3::new(ax, 0.0, az),
                    Point3::new(bx, 0.0, bz),
                    Point3::new(bx, top, bz),
                    Point3::new(ax, top, az),
                ],
                facing,
                wall_color,
            );
            panels += 1;
        }
    }

    if panels > 0 {
        add_quad(
            &mut mesh,
            [
                Point3::new(-1.0, 0.0, -1.0),
                Point3::new(1.0, 0.0, -1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(-1.0, 0.0, 1.0),
            ],
            Vector3::y(),
            floor_color,
        );
    }

    tracing::debug!(contours, panels, "Walls extruded");
    Walls {
        mesh,
        contours,
        panels,
    }
}

/// Mean image colour over wall pixels and over floor pixels
fn mask_colors(image: &PreprocessedImage, mask: &GrayImage) -> ([u8; 3], [u8; 3]) {
    let mut sums = [[0u64; 3]; 2];
    let mut counts = [0u64; 2];
    for (pixel, m) in image.rgb.pixels().zip(mask.pixels()) {
        let slot = usize::from(m.0[0] == 0);
        for (sum, &c) in sums[slot].iter_mut().zip(&pixel.0) {
            *sum += c as u64;
        }
        counts[slot] += 1;
    }

    let mean = |slot: usize, default: [u8; 3]| {
        if counts[slot] == 0 {
            default
        } else {
            sums[slot].map(|s| (s / counts[slot]) as u8)
        }
    };
    (mean(0, DEFAULT_WALL_COLOR), mean(1, DEFAULT_FLOOR_COLOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::preprocess::PreprocessConfig;
    use image::{Rgb, RgbImage};

    fn ring_depth(size: u32, lo: u32, hi: u32, thickness: u32) -> DepthField {
        let field = Field::from_fn(size, size, |x, y| {
            let inside = (lo..hi).contains(&x) && (lo..hi).contains(&y);
            let core = (lo + thickness..hi - thickness).contains(&x)
                && (lo + thickness..hi - thickness).contains(&y);
            if inside && !core {
                1.0
            } else {
                0.0
            }
        });
        DepthField::try_from_field(field).unwrap()
    }

    fn image(size: u32) -> PreprocessedImage {
        PreprocessedImage::from_rgb(
            RgbImage::from_pixel(size, size, Rgb([250, 250, 250])),
            &PreprocessConfig::default(),
        )
    }

    #[test]
    fn test_square_ring_becomes_eight_panels() {
        let walls = extrude(&image(101), &ring_depth(101, 20, 81, 5), &MeshConfig::default());
        assert_eq!(walls.contours, 2);
        assert_eq!(walls.panels, 8);
        // Four vertices per panel plus the floor
        assert_eq!(walls.mesh.vertex_count(), 8 * 4 + 4);

        let bounds = walls.mesh.bounds();
        assert_eq!(bounds.max.y, 2.5);
        assert_eq!(bounds.min.y, 0.0);
    }

    #[test]
    fn test_panels_face_away_from_wall_mass() {
        let walls = extrude(&image(101), &ring_depth(101, 20, 81, 5), &MeshConfig::default());
        let mesh = &walls.mesh;
        for tri in mesh.indices.chunks_exact(3).take(8 * 2) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.position(i as usize));
            let normal = (b - a).cross(&(c - a));
            let mid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            // Step a little way along the normal in the ground plane
            let outside = mid + normal.normalize() * 0.02;
            let px = ((outside.x + 1.0) * 50.0).round() as i32;
            let pz = ((outside.z + 1.0) * 50.0).round() as i32;
            let on_wall = (20..81).contains(&px)
                && (20..81).contains(&pz)
                && !((25..76).contains(&px) && (25..76).contains(&pz));
            assert!(!on_wall, "panel at {mid:?} faces into the wall");
        }
    }

    #[test]
    fn test_empty_mask_emits_nothing() {
        let depth = DepthField::try_from_field(Field::new(20, 20)).unwrap();
        let walls = extrude(&image(20), &depth, &MeshConfig::default());
        assert_eq!(walls.panels, 0);
        assert!(walls.mesh.is_empty());
    }
}
