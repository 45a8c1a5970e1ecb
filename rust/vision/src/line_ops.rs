// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line detection and polygon simplification

use crate::types::{DetectedLine, LineOrientation, Point2D};
use image::GrayImage;
use std::f64::consts::PI;

/// Upper bound on Hough peaks examined per image
const MAX_PEAKS: usize = 500;

/// Detect lines using probabilistic Hough transform
///
/// Votes every edge pixel into a (θ, ρ) accumulator at one-degree resolution,
/// then walks the strongest peaks, collecting unused edge pixels within two
/// pixels of each line and splitting them into segments at gaps wider than
/// `max_line_gap`.
pub fn detect_lines(
    edges: &GrayImage,
    threshold: u32,
    min_line_length: f64,
    max_line_gap: f64,
) -> Vec<DetectedLine> {
    let width = edges.width() as i32;
    let height = edges.height() as i32;

    let rho_resolution = 1.0;
    let theta_resolution = PI / 180.0;
    let num_thetas = (PI / theta_resolution) as usize;

    let cos_table: Vec<f64> = (0..num_thetas)
        .map(|i| (i as f64 * theta_resolution).cos())
        .collect();
    let sin_table: Vec<f64> = (0..num_thetas)
        .map(|i| (i as f64 * theta_resolution).sin())
        .collect();

    let max_rho = ((width * width + height * height) as f64).sqrt();
    let num_rhos = (2.0 * max_rho / rho_resolution) as usize + 1;
    let rho_offset = max_rho;

    let edge_points: Vec<(i32, i32)> = edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 128)
        .map(|(x, y, _)| (x as i32, y as i32))
        .collect();
    if edge_points.is_empty() {
        return Vec::new();
    }

    let mut accumulator = vec![0u32; num_thetas * num_rhos];
    for &(x, y) in &edge_points {
        for theta_idx in 0..num_thetas {
            let rho = x as f64 * cos_table[theta_idx] + y as f64 * sin_table[theta_idx];
            let rho_idx = ((rho + rho_offset) / rho_resolution) as usize;
            if rho_idx < num_rhos {
                accumulator[theta_idx * num_rhos + rho_idx] += 1;
            }
        }
    }

    let mut peaks: Vec<(usize, usize, u32)> = accumulator
        .iter()
        .enumerate()
        .filter(|(_, &votes)| votes >= threshold)
        .map(|(i, &votes)| (i / num_rhos, i % num_rhos, votes))
        .collect();
    // Strongest first; ties broken by position so results are reproducible
    peaks.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut lines = Vec::new();
    let mut used_points = vec![false; edge_points.len()];

    for &(theta_idx, rho_idx, _votes) in peaks.iter().take(MAX_PEAKS) {
        let rho = rho_idx as f64 * rho_resolution - rho_offset;
        let cos_t = cos_table[theta_idx];
        let sin_t = sin_table[theta_idx];

        let mut line_points: Vec<(i32, i32, usize)> = edge_points
            .iter()
            .enumerate()
            .filter(|(i, &(x, y))| {
                !used_points[*i] && (x as f64 * cos_t + y as f64 * sin_t - rho).abs() < 2.0
            })
            .map(|(i, &(x, y))| (x, y, i))
            .collect();
        if line_points.len() < 2 {
            continue;
        }

        // Order along the line direction
        let along = |p: &(i32, i32, usize)| p.0 as f64 * (-sin_t) + p.1 as f64 * cos_t;
        line_points.sort_by(|a, b| along(a).total_cmp(&along(b)));

        let mut segment_start = 0;
        for i in 1..=line_points.len() {
            let split = i == line_points.len() || {
                let dx = (line_points[i].0 - line_points[i - 1].0) as f64;
                let dy = (line_points[i].1 - line_points[i - 1].1) as f64;
                (dx * dx + dy * dy).sqrt() > max_line_gap
            };
            if !split {
                continue;
            }

            if i - segment_start >= 2 {
                let start_pt = &line_points[segment_start];
                let end_pt = &line_points[i - 1];
                let line = DetectedLine::new(
                    Point2D::new(start_pt.0 as f64, start_pt.1 as f64),
                    Point2D::new(end_pt.0 as f64, end_pt.1 as f64),
                );
                if line.length() >= min_line_length {
                    lines.push(line);
                    for point in &line_points[segment_start..i] {
                        used_points[point.2] = true;
                    }
                }
            }
            segment_start = i;
        }
    }

    lines
}

/// Classify a segment as horizontal or vertical if its angle is within
/// `tolerance` radians of the axis
pub fn classify_orientation(line: &DetectedLine, tolerance: f64) -> LineOrientation {
    // Fold into [0, π)
    let angle = line.angle().rem_euclid(PI);
    if angle < tolerance || angle > PI - tolerance {
        LineOrientation::Horizontal
    } else if (angle - PI / 2.0).abs() < tolerance {
        LineOrientation::Vertical
    } else {
        LineOrientation::Oblique
    }
}

/// Count (horizontal, vertical) segments
pub fn count_orientations(lines: &[DetectedLine], tolerance: f64) -> (usize, usize) {
    lines
        .iter()
        .fold((0, 0), |(h, v), line| match classify_orientation(line, tolerance) {
            LineOrientation::Horizontal => (h + 1, v),
            LineOrientation::Vertical => (h, v + 1),
            LineOrientation::Oblique => (h, v),
        })
}

/// Calculate perpendicular distance from a point to the infinite line
/// through `line_start` and `line_end`
pub fn point_to_line_distance(point: &Point2D, line_start: &Point2D, line_end: &Point2D) -> f64 {
    let dx = line_end.x - line_start.x;
    let dy = line_end.y - line_start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-10 {
        return point.distance_to(line_start);
    }

    ((point.x - line_start.x) * dy - (point.y - line_start.y) * dx).abs() / length_sq.sqrt()
}

/// Douglas-Peucker simplification of an open polyline
pub fn douglas_peucker(points: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = &points[0];
    let last = &points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;
    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = point_to_line_distance(point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        let mut result = douglas_peucker(&points[..=max_idx], epsilon);
        let right = douglas_peucker(&points[max_idx..], epsilon);
        result.extend_from_slice(&right[1..]);
        result
    } else {
        vec![*first, *last]
    }
}

/// Douglas-Peucker simplification of a closed ring (no repeated end point).
///
/// The ring is split at its first point and the point farthest from it, and
/// each half is simplified as an open polyline.
pub fn simplify_closed(ring: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    if ring.len() < 4 {
        return ring.to_vec();
    }

    let anchor = ring[0];
    let far_idx = ring
        .iter()
        .enumerate()
        .max_by(|a, b| anchor.distance_to(a.1).total_cmp(&anchor.distance_to(b.1)))
        .map_or(0, |(i, _)| i);
    if far_idx == 0 {
        return vec![anchor];
    }

    let mut first_half = douglas_peucker(&ring[..=far_idx], epsilon);
    let mut second: Vec<Point2D> = ring[far_idx..].to_vec();
    second.push(anchor);
    let second_half = douglas_peucker(&second, epsilon);

    // Drop the shared far point and the closing anchor
    first_half.extend_from_slice(&second_half[1..second_half.len() - 1]);
    first_half
}

/// Shoelace area; positive when the ring turns from +x towards +y
pub fn signed_area(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Length of the closed ring
pub fn perimeter(ring: &[Point2D]) -> f64 {
    let n = ring.len();
    (0..n).map(|i| ring[i].distance_to(&ring[(i + 1) % n])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_detect_axis_lines() {
        let mut edges = GrayImage::new(100, 100);
        for x in 10..90 {
            edges.put_pixel(x, 30, Luma([255]));
        }
        for y in 20..80 {
            edges.put_pixel(60, y, Luma([255]));
        }

        let lines = detect_lines(&edges, 30, 20.0, 5.0);
        let (h, v) = count_orientations(&lines, 0.3);
        assert!(h >= 1, "no horizontal line in {lines:?}");
        assert!(v >= 1, "no vertical line in {lines:?}");
        assert!(lines.iter().all(|l| l.length() >= 20.0));
    }

    #[test]
    fn test_detect_lines_on_blank_image() {
        assert!(detect_lines(&GrayImage::new(30, 30), 10, 5.0, 5.0).is_empty());
    }

    #[test]
    fn test_classify_orientation() {
        let flat = DetectedLine::new(Point2D::new(10.0, 5.0), Point2D::new(0.0, 6.0));
        let steep = DetectedLine::new(Point2D::new(0.0, 0.0), Point2D::new(1.0, -10.0));
        let diagonal = DetectedLine::new(Point2D::new(0.0, 0.0), Point2D::new(5.0, 5.0));
        assert_eq!(classify_orientation(&flat, 0.3), LineOrientation::Horizontal);
        assert_eq!(classify_orientation(&steep, 0.3), LineOrientation::Vertical);
        assert_eq!(classify_orientation(&diagonal, 0.3), LineOrientation::Oblique);
    }

    #[test]
    fn test_simplify_closed_square() {
        let mut ring = Vec::new();
        for i in 0..10 {
            ring.push(Point2D::new(i as f64, 0.0));
        }
        for i in 0..10 {
            ring.push(Point2D::new(10.0, i as f64));
        }
        for i in 0..10 {
            ring.push(Point2D::new(10.0 - i as f64, 10.0));
        }
        for i in 0..10 {
            ring.push(Point2D::new(0.0, 10.0 - i as f64));
        }

        let simplified = simplify_closed(&ring, 0.01 * perimeter(&ring));
        assert_eq!(simplified.len(), 4);
        assert!((signed_area(&simplified).abs() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = [
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(2.0, 2.0),
            Point2D::new(0.0, 2.0),
        ];
        assert_eq!(signed_area(&ccw), 4.0);
        let cw: Vec<Point2D> = ccw.iter().rev().copied().collect();
        assert_eq!(signed_area(&cw), -4.0);
        assert_eq!(perimeter(&ccw), 8.0);
    }
}
