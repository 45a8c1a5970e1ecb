// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types shared across the depth and reconstruction pipeline

use scenelift_geometry::{RoomComplexity, SceneStyle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D point in pixel space (simplified for serialization)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Detected line segment from the Hough transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedLine {
    pub start: Point2D,
    pub end: Point2D,
}

impl DetectedLine {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn angle(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    pub fn midpoint(&self) -> Point2D {
        Point2D::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }
}

/// Line orientation relative to the image axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineOrientation {
    Horizontal,
    Vertical,
    Oblique,
}

/// Coarse scene category. Selects cue weighting and the depth scale used
/// during reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    FloorPlan,
    IndoorRoom,
    OutdoorLandscape,
    Portrait,
    General,
}

impl SceneType {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneType::FloorPlan => "floor_plan",
            SceneType::IndoorRoom => "indoor_room",
            SceneType::OutdoorLandscape => "outdoor_landscape",
            SceneType::Portrait => "portrait",
            SceneType::General => "general",
        }
    }

    /// Architectural scenes keep the full [0,1] depth range
    pub fn is_architectural(self) -> bool {
        self == SceneType::FloorPlan
    }

    /// Style used when completing the unseen parts of the scene
    pub fn procedural_style(self) -> SceneStyle {
        match self {
            SceneType::FloorPlan => SceneStyle::Building,
            SceneType::IndoorRoom => SceneStyle::Interior,
            SceneType::OutdoorLandscape | SceneType::Portrait | SceneType::General => {
                SceneStyle::Exterior
            }
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing generation options, threaded read-only through the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Complete the scene with geometry the camera never saw
    pub hallucinate_unseen: bool,
    pub room_complexity: RoomComplexity,
    pub wall_thickness: f32,
    /// Emit walls, ceiling and props during completion
    pub generate_interiors: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            hallucinate_unseen: true,
            room_complexity: RoomComplexity::Medium,
            wall_thickness: 0.3,
            generate_interiors: true,
        }
    }
}
