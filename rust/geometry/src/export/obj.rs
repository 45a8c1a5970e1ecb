// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ writer with the common `v x y z r g b` colour extension

use crate::error::Result;
use crate::mesh::Mesh;
use std::io::Write;

pub fn write_obj<W: Write>(mesh: &Mesh, out: &mut W) -> Result<()> {
    writeln!(out, "# scenelift {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        out,
        "# {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    )?;
    writeln!(out, "o environment")?;

    for (p, c) in mesh.positions.chunks_exact(3).zip(mesh.colors.chunks_exact(3)) {
        writeln!(
            out,
            "v {:.6} {:.6} {:.6} {:.4} {:.4} {:.4}",
            p[0],
            p[1],
            p[2],
            c[0] as f32 / 255.0,
            c[1] as f32 / 255.0,
            c[2] as f32 / 255.0
        )?;
    }
    for n in mesh.normals.chunks_exact(3) {
        writeln!(out, "vn {:.6} {:.6} {:.6}", n[0], n[1], n[2])?;
    }
    // OBJ indices are 1-based
    for tri in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
        writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    Ok(())
}
