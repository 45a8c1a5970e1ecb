// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::CueParams;
use crate::field::Field;
use crate::image_ops::{dark_mask, dilate, erode, morphological_close, morphological_open};
use crate::preprocess::PreprocessedImage;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Wall/floor segmentation of a drawn plan: walls map to 1 (ceiling height),
/// everything else to 0 (floor level). The blur only softens the floor side
/// of each wall, so strokes of any width keep their full height.
pub(super) fn estimate(image: &PreprocessedImage, params: &CueParams) -> Field {
    let walls = Field::from_gray(&wall_mask(&image.gray, params)).map(|v| v / 255.0);
    walls
        .gaussian_blur(params.floor_plan_blur, 0.0)
        .zip_map(&walls, f32::max)
}

/// Binary mask (255 = wall) of the ink strokes large enough to be walls
pub(crate) fn wall_mask(gray: &GrayImage, params: &CueParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    let min_area = params.floor_plan_min_component as f64 * width as f64 * height as f64;

    // Step 1: Ink is anything darker than the paper threshold
    let ink = dark_mask(gray, params.floor_plan_dark_threshold);

    // Step 2: Drop text-sized specks. Strokes thinner than the opening are
    // restored when they belong to a long connected line.
    let opened = morphological_open(&ink, params.floor_plan_open_radius);
    let (long_strokes, _) = large_components(&ink, min_area);
    let strokes = union(&opened, &long_strokes);

    // Step 3: Bridge small breaks in strokes
    let closed = morphological_close(&strokes, params.floor_plan_close_radius);
    let grown = dilate(&closed, params.floor_plan_grow_radius);
    let cleaned = erode(&grown, params.floor_plan_grow_radius);

    // Step 4: Keep connected strokes above the minimum area
    let (walls, kept) = large_components(&cleaned, min_area);
    tracing::debug!(kept, "Floor plan wall components");
    walls
}

/// Mask of the 8-connected components whose pixel count exceeds `min_area`,
/// with the number of components kept
fn large_components(mask: &GrayImage, min_area: f64) -> (GrayImage, usize) {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut areas: Vec<u64> = Vec::new();
    for label in labels.pixels() {
        let id = label.0[0] as usize;
        if id == 0 {
            continue;
        }
        if id >= areas.len() {
            areas.resize(id + 1, 0);
        }
        areas[id] += 1;
    }

    let kept = areas.iter().skip(1).filter(|&&a| a as f64 > min_area).count();
    let filtered = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let id = labels.get_pixel(x, y).0[0] as usize;
        let large = id != 0 && areas[id] as f64 > min_area;
        Luma([if large { 255 } else { 0 }])
    });
    (filtered, kept)
}

fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y).0[0].max(b.get_pixel(x, y).0[0])])
    })
}
