// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::Field;
use crate::image_ops::canny_edges;
use crate::line_ops::{classify_orientation, detect_lines};
use crate::preprocess::PreprocessedImage;
use crate::types::{DetectedLine, LineOrientation};

/// Vertical gradient anchored at the horizon.
///
/// Rows above the horizon rise slowly from 0 at the top to
/// [`CueParams::horizon_depth`]; rows below climb steeply to 1 at the bottom
/// edge, the ground plane being nearest at the foot of the frame.
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let (width, height) = image.dimensions();
    let edges = canny_edges(&image.gray, 50.0, 150.0);
    let lines = detect_lines(
        &edges,
        params.hough_threshold,
        (width as f64 * params.horizon_min_length).max(2.0),
        params.horizon_max_gap,
    );
    let horizon = find_horizon(&lines, height, params);
    tracing::trace!(horizon, candidates = lines.len(), "Perspective horizon");

    let bottom = (height - 1) as f32;
    let horizon_depth = params.horizon_depth;
    Field::from_fn(width, height, |_, y| {
        let y = y as f32;
        if y < horizon {
            horizon_depth * y / horizon.max(1.0)
        } else {
            horizon_depth + (1.0 - horizon_depth) * (y - horizon) / (bottom - horizon).max(1.0)
        }
    })
}

/// Median row of the near-horizontal segments in the upper part of the frame
fn find_horizon(lines: &[DetectedLine], height: u32, params: &CueParams) -> f32 {
    let limit = height as f64 * params.horizon_search_limit as f64;
    let mut rows: Vec<f64> = lines
        .iter()
        .filter(|line| {
            classify_orientation(line, params.horizon_angle_tolerance)
                == LineOrientation::Horizontal
        })
        .map(|line| line.midpoint().y)
        .filter(|&y| y < limit)
        .collect();

    if rows.is_empty() {
        return height as f32 * params.default_horizon;
    }
    rows.sort_by(f64::total_cmp);
    let mid = rows.len() / 2;
    let median = if rows.len() % 2 == 0 {
        (rows[mid - 1] + rows[mid]) / 2.0
    } else {
        rows[mid]
    };
    median as f32
}

#[cfg(test)]
mod tests {
    use super::super::test_support::prepare;
    use super::*;
    use crate::types::Point2D;
    use image::{Rgb, RgbImage};

    fn horizontal(y: f64) -> DetectedLine {
        DetectedLine::new(Point2D::new(0.0, y), Point2D::new(100.0, y + 1.0))
    }

    #[test]
    fn test_horizon_is_median_of_upper_lines() {
        let params = CueParams::default();
        let lines = [horizontal(20.0), horizontal(30.0), horizontal(40.0), horizontal(90.0)];
        // 90 lies below the 60% search limit of a 100-row image
        assert_eq!(find_horizon(&lines, 100, &params), 30.5);
        assert_eq!(find_horizon(&[], 100, &params), 40.0);
    }

    #[test]
    fn test_gradient_is_monotonic_with_steeper_foreground() {
        let image = prepare(RgbImage::from_fn(50, 100, |x, _| Rgb([(x * 5) as u8, 90, 40])));
        let field = estimate(&image, &CueParams::default());

        let column: Vec<f32> = (0..100).map(|y| field.get(10, y)).collect();
        assert!(column.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(column[0], 0.0);
        assert!((column[99] - 1.0).abs() < 1e-6);

        let upper_slope = column[20] - column[10];
        let lower_slope = column[90] - column[80];
        assert!(lower_slope > upper_slope);
    }

    #[test]
    fn test_detected_horizon_moves_the_knee() {
        let mut rgb = RgbImage::from_pixel(200, 100, Rgb([200, 200, 200]));
        for y in 20..100 {
            for x in 0..200 {
                rgb.put_pixel(x, y, Rgb([40, 40, 40]));
            }
        }
        let field = estimate(&prepare(rgb), &CueParams::default());
        // Knee sits near row 20 instead of the default row 40
        assert!(field.get(100, 20) > 0.25 && field.get(100, 20) < 0.4);
        assert!(field.get(100, 40) > 0.4);
    }
}
