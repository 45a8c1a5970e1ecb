// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-image depth estimation and 3D environment reconstruction
//!
//! This crate provides a complete pipeline for:
//! 1. Loading an image at a bounded working resolution
//! 2. Classifying the scene (floor plan, room, landscape, portrait, other)
//! 3. Estimating per-pixel depth by fusing classical monocular cues
//! 4. Turning image + depth into a coloured mesh (height map or extruded walls)
//! 5. Completing the unseen parts of the scene with procedural geometry
//!
//! # Usage
//!
//! ```rust,ignore
//! use scenelift_vision::{generate_environment, GenerationOptions, PipelineConfig};
//! use scenelift_geometry::{export_to_file, ExportFormat};
//!
//! let env = generate_environment(
//!     Path::new("living_room.jpg"),
//!     &GenerationOptions::default(),
//!     &PipelineConfig::default(),
//!     |stage| println!("{}%: {}", stage.progress(), stage.label()),
//! )?;
//! export_to_file(&env.mesh, ExportFormat::Glb, Path::new("living_room.glb"))?;
//! ```

pub mod cues;
pub mod depth;
pub mod error;
pub mod field;
pub mod fusion;
pub mod image_ops;
pub mod line_ops;
pub mod pipeline;
pub mod preprocess;
pub mod reconstruct;
pub mod scene;
pub mod types;

// Re-export commonly used types and functions
pub use cues::{compute_cue, CueError, CueKind, CueParams};
pub use depth::{
    estimate_depth, visualize_depth, ConfidenceField, CueFusionSource, DepthConfig, DepthEstimate,
    DepthField, DepthMapSource, DepthReport, DepthSource, FusionStrategy,
};
pub use error::{Error, Result};
pub use field::Field;
pub use fusion::{FusionParams, Smoothing};
pub use pipeline::{generate_environment, GeneratedEnvironment, PipelineConfig, PipelineStage};
pub use preprocess::{load_image, PreprocessConfig, PreprocessedImage};
pub use reconstruct::{build_mesh, reconstruct, MeshConfig, ReconstructionKind};
pub use scene::{classify_scene, SceneAnalysis, SceneThresholds};
pub use types::{GenerationOptions, SceneType};
