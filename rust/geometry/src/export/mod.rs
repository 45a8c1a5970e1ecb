// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serialisation of [`Mesh`] buffers to interchange formats.

mod glb;
mod obj;
mod ply;

pub use glb::write_glb;
pub use obj::write_obj;
pub use ply::write_ply;

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Binary glTF 2.0
    Glb,
    /// Wavefront OBJ with vertex colours
    Obj,
    /// Binary little-endian PLY
    Ply,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Glb, Self::Obj, Self::Ply];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Glb => "glb",
            Self::Obj => "obj",
            Self::Ply => "ply",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Glb => "model/gltf-binary",
            Self::Obj | Self::Ply => "application/octet-stream",
        }
    }

    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "glb" | "gltf" => Ok(Self::Glb),
            "obj" => Ok(Self::Obj),
            "ply" => Ok(Self::Ply),
            other => Err(Error::Export(format!("unsupported format '{other}'"))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Serialise `mesh` into an in-memory buffer
pub fn export(mesh: &Mesh, format: ExportFormat) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write(mesh, format, &mut out)?;
    Ok(out)
}

/// Serialise `mesh` into any writer
pub fn write<W: Write>(mesh: &Mesh, format: ExportFormat, out: &mut W) -> Result<()> {
    mesh.validate()?;
    match format {
        ExportFormat::Glb => write_glb(mesh, out),
        ExportFormat::Obj => write_obj(mesh, out),
        ExportFormat::Ply => write_ply(mesh, out),
    }
}

/// Write `mesh` to `path` in `format`
pub fn export_to_file(mesh: &Mesh, format: ExportFormat, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    write(mesh, format, &mut out)?;
    out.flush()?;
    tracing::info!(
        path = %path.display(),
        format = %format,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Exported mesh"
    );
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_mesh() -> Mesh {
    use nalgebra::Point3;
    crate::primitives::box_mesh(
        Point3::new(-1.0, 0.0, -1.0),
        Point3::new(1.0, 0.5, 1.0),
        [200, 100, 50],
    )
}
