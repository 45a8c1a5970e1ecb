// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rule-based scene classification from line and photometric statistics

use crate::image_ops::canny_edges;
use crate::line_ops::{count_orientations, detect_lines};
use crate::preprocess::PreprocessedImage;
use crate::types::{DetectedLine, SceneType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Every tunable constant of the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneThresholds {
    /// Pixels below this level count as dark
    pub dark_level: u8,
    /// Pixels above this level count as light
    pub light_level: u8,
    /// Floor plan vote: mean brightness of a mostly white sheet
    pub white_mean_min: f32,
    /// Floor plan vote: fraction of light pixels on a mostly white sheet
    pub light_ratio_min: f32,
    /// Floor plan vote: global brightness standard deviation
    pub contrast_std_min: f32,
    /// Floor plan vote: dark pixel fraction must lie in `[dark_ratio_min, dark_ratio_max]`.
    /// The floor is low enough for a single hairline outline on a full sheet.
    pub dark_ratio_min: f32,
    pub dark_ratio_max: f32,
    /// Floor plan vote: horizontal plus vertical line count
    pub min_lines: usize,
    /// Votes out of four needed to call a floor plan
    pub votes_required: usize,
    /// Outdoor: mean HSV saturation above this...
    pub saturation_min: f32,
    /// ...with fewer horizontal lines than this
    pub max_horizontal_outdoor: usize,
    /// Indoor: combined axis-aligned line count
    pub indoor_min_lines: usize,
    /// Indoor: minimum count in each orientation
    pub indoor_min_each: usize,
    /// Portrait: absolute centre-minus-border brightness difference
    pub portrait_contrast: f32,
    /// Angular tolerance in radians for horizontal/vertical segments
    pub orientation_tolerance: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_threshold: u32,
    /// Minimum segment length as a fraction of the shorter image side
    pub min_line_fraction: f64,
    /// Lower bound on the minimum segment length in pixels
    pub min_line_pixels: f64,
    pub max_line_gap: f64,
}

impl Default for SceneThresholds {
    fn default() -> Self {
        Self {
            dark_level: 100,
            light_level: 200,
            white_mean_min: 180.0,
            light_ratio_min: 0.5,
            contrast_std_min: 40.0,
            dark_ratio_min: 0.001,
            dark_ratio_max: 0.4,
            min_lines: 4,
            votes_required: 3,
            saturation_min: 80.0,
            max_horizontal_outdoor: 5,
            indoor_min_lines: 8,
            indoor_min_each: 2,
            portrait_contrast: 30.0,
            orientation_tolerance: 0.3,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 50,
            min_line_fraction: 0.125,
            min_line_pixels: 20.0,
            max_line_gap: 10.0,
        }
    }
}

/// Image statistics the decision was based on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneStats {
    pub brightness_mean: f32,
    pub brightness_std: f32,
    pub dark_ratio: f32,
    pub light_ratio: f32,
    pub saturation_mean: f32,
    pub horizontal_lines: usize,
    pub vertical_lines: usize,
    /// Mean brightness of the central region minus that of the border band
    pub center_contrast: f32,
    pub floor_plan_votes: usize,
}

/// Classification result with its supporting evidence
#[derive(Debug, Clone)]
pub struct SceneAnalysis {
    pub scene: SceneType,
    pub stats: SceneStats,
    pub lines: Vec<DetectedLine>,
}

/// Tag an image with a scene category.
///
/// Pure function of the pixel content and thresholds: the same image always
/// yields the same result.
pub fn classify_scene(image: &PreprocessedImage, thresholds: &SceneThresholds) -> SceneAnalysis {
    let gray = &image.gray;

    // Step 1: Global brightness statistics
    let (brightness_mean, brightness_std, dark_ratio, light_ratio) =
        brightness_stats(gray, thresholds.dark_level, thresholds.light_level);

    // Step 2: Straight lines from the edge map
    let edges = canny_edges(gray, thresholds.canny_low, thresholds.canny_high);
    let shorter = gray.width().min(gray.height()) as f64;
    let min_length = (shorter * thresholds.min_line_fraction).max(thresholds.min_line_pixels);
    let lines = detect_lines(
        &edges,
        thresholds.hough_threshold,
        min_length,
        thresholds.max_line_gap,
    );
    let (horizontal_lines, vertical_lines) =
        count_orientations(&lines, thresholds.orientation_tolerance);

    // Step 3: Colour and composition
    let saturation_mean = image.hsv.saturation.mean();
    let center_contrast = center_border_contrast(gray);

    let mut stats = SceneStats {
        brightness_mean,
        brightness_std,
        dark_ratio,
        light_ratio,
        saturation_mean,
        horizontal_lines,
        vertical_lines,
        center_contrast,
        floor_plan_votes: 0,
    };
    stats.floor_plan_votes = floor_plan_votes(&stats, thresholds);

    // Step 4: Decide, most specific category first
    let scene = decide(&stats, thresholds);
    tracing::debug!(
        scene = %scene,
        votes = stats.floor_plan_votes,
        horizontal = horizontal_lines,
        vertical = vertical_lines,
        mean = brightness_mean,
        saturation = saturation_mean,
        "Classified scene"
    );

    SceneAnalysis {
        scene,
        stats,
        lines,
    }
}

fn floor_plan_votes(stats: &SceneStats, t: &SceneThresholds) -> usize {
    let mostly_white =
        stats.brightness_mean > t.white_mean_min && stats.light_ratio > t.light_ratio_min;
    let high_contrast = stats.brightness_std > t.contrast_std_min;
    let bounded_ink = (t.dark_ratio_min..=t.dark_ratio_max).contains(&stats.dark_ratio);
    let enough_lines = stats.horizontal_lines + stats.vertical_lines >= t.min_lines;

    [mostly_white, high_contrast, bounded_ink, enough_lines]
        .into_iter()
        .filter(|&vote| vote)
        .count()
}

fn decide(stats: &SceneStats, t: &SceneThresholds) -> SceneType {
    let (h, v) = (stats.horizontal_lines, stats.vertical_lines);

    if stats.floor_plan_votes >= t.votes_required {
        SceneType::FloorPlan
    } else if stats.saturation_mean > t.saturation_min && h < t.max_horizontal_outdoor {
        SceneType::OutdoorLandscape
    } else if h + v >= t.indoor_min_lines && h >= t.indoor_min_each && v >= t.indoor_min_each {
        SceneType::IndoorRoom
    } else if stats.center_contrast.abs() > t.portrait_contrast {
        SceneType::Portrait
    } else {
        SceneType::General
    }
}

/// Mean, standard deviation, dark fraction and light fraction of a gray image
fn brightness_stats(gray: &GrayImage, dark_level: u8, light_level: u8) -> (f32, f32, f32, f32) {
    let count = (gray.width() as u64 * gray.height() as u64).max(1) as f64;
    let (mut sum, mut sum_sq) = (0.0f64, 0.0f64);
    let (mut dark, mut light) = (0u64, 0u64);

    for pixel in gray.pixels() {
        let v = pixel.0[0];
        sum += v as f64;
        sum_sq += (v as f64) * (v as f64);
        if v < dark_level {
            dark += 1;
        }
        if v > light_level {
            light += 1;
        }
    }

    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);
    (
        mean as f32,
        variance.sqrt() as f32,
        (dark as f64 / count) as f32,
        (light as f64 / count) as f32,
    )
}

/// Brightness of the central half of the frame minus that of the outer 10% band
fn center_border_contrast(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    let (cx0, cx1) = (w / 4, w - w / 4);
    let (cy0, cy1) = (h / 4, h - h / 4);
    let (bx, by) = ((w / 10).max(1), (h / 10).max(1));

    let (mut center_sum, mut center_n) = (0.0f64, 0u64);
    let (mut border_sum, mut border_n) = (0.0f64, 0u64);
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = pixel.0[0] as f64;
        if (cx0..cx1).contains(&x) && (cy0..cy1).contains(&y) {
            center_sum += v;
            center_n += 1;
        }
        if x < bx || x >= w - bx || y < by || y >= h - by {
            border_sum += v;
            border_n += 1;
        }
    }

    if center_n == 0 || border_n == 0 {
        return 0.0;
    }
    (center_sum / center_n as f64 - border_sum / border_n as f64) as f32
}
