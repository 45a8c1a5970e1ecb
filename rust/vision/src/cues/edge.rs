// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::Field;
use crate::image_ops::canny_edges;
use crate::preprocess::PreprocessedImage;
use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;

/// Proximity to structural edges.
///
/// Edge maps at several Canny threshold pairs are merged by weighted vote,
/// the Euclidean distance to the nearest merged edge is inverted so that
/// boundary-adjacent pixels score high, and a grey closing removes speckle.
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let (width, height) = image.dimensions();
    let edges = merged_edges(&image.gray, params);

    if edges.pixels().all(|p| p.0[0] == 0) {
        // No structure at any scale: every pixel is equally far from an edge
        return Field::filled(width, height, 0.0);
    }

    let squared = euclidean_squared_distance_transform(&edges);
    let distance = Field::from_fn(width, height, |x, y| {
        squared.get_pixel(x, y).0[0].sqrt() as f32
    });

    distance
        .normalized()
        .inverted()
        .grey_close(params.edge_close_radius)
}

/// Weighted union of the multi-threshold edge maps, binarised at
/// [`CueParams::edge_vote`]
fn merged_edges(gray: &GrayImage, params: &CueParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut votes = vec![0.0f32; width as usize * height as usize];

    for (&(low, high), &weight) in params.edge_thresholds.iter().zip(&params.edge_weights) {
        let edges = canny_edges(gray, low, high);
        for (vote, pixel) in votes.iter_mut().zip(edges.pixels()) {
            if pixel.0[0] > 0 {
                *vote += weight;
            }
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let vote = votes[y as usize * width as usize + x as usize];
        Luma([if vote >= params.edge_vote { 255 } else { 0 }])
    })
}
