// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SceneLift Geometry
//!
//! Colour-per-vertex triangle meshes for reconstructed environments:
//! cleanup and validation, parametric primitives, procedural completion of
//! unseen room geometry, and GLB/OBJ/PLY serialisation.

pub mod cleanup;
pub mod error;
pub mod export;
pub mod mesh;
pub mod primitives;
pub mod procedural;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use cleanup::{calculate_normals, clean, CleanupOptions, CleanupStats};
pub use error::{Error, Result};
pub use export::{export, export_to_file, ExportFormat};
pub use mesh::{Bounds, Mesh};
pub use primitives::{add_quad, box_mesh, cylinder};
pub use procedural::{enrich, ProceduralConfig, RoomComplexity, SceneStyle};
