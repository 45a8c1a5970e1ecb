// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary little-endian PLY writer

use crate::error::Result;
use crate::mesh::Mesh;
use std::io::Write;

pub fn write_ply<W: Write>(mesh: &Mesh, out: &mut W) -> Result<()> {
    write!(
        out,
        "ply\n\
         format binary_little_endian 1.0\n\
         comment scenelift {}\n\
         element vertex {}\n\
         property float x\nproperty float y\nproperty float z\n\
         property float nx\nproperty float ny\nproperty float nz\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\n\
         element face {}\n\
         property list uchar int vertex_indices\n\
         end_header\n",
        env!("CARGO_PKG_VERSION"),
        mesh.vertex_count(),
        mesh.triangle_count()
    )?;

    let mut record = Vec::with_capacity(27);
    for i in 0..mesh.vertex_count() {
        record.clear();
        for v in &mesh.positions[i * 3..i * 3 + 3] {
            record.extend_from_slice(&v.to_le_bytes());
        }
        for v in &mesh.normals[i * 3..i * 3 + 3] {
            record.extend_from_slice(&v.to_le_bytes());
        }
        record.extend_from_slice(&mesh.colors[i * 3..i * 3 + 3]);
        out.write_all(&record)?;
    }

    for tri in mesh.indices.chunks_exact(3) {
        out.write_all(&[3u8])?;
        for &i in tri {
            out.write_all(&(i as i32).to_le_bytes())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_mesh;

    #[test]
    fn test_ply_header_and_payload_size() {
        let mesh = test_mesh();
        let mut bytes = Vec::new();
        write_ply(&mesh, &mut bytes).unwrap();

        let marker = b"end_header\n";
        let header_end = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap()
            + marker.len();
        let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
        assert!(header.contains("element vertex 24\n"));
        assert!(header.contains("element face 12\n"));

        assert_eq!(bytes.len() - header_end, 24 * 27 + 12 * 13);
    }
}
