// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary glTF 2.0 writer

use crate::error::Result;
use crate::mesh::Mesh;
use serde_json::json;
use std::io::Write;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const FLOAT: u32 = 5126;
const UNSIGNED_BYTE: u32 = 5121;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const TRIANGLES: u32 = 4;

/// Write a single-primitive GLB. Colours are stored as normalised RGBA bytes
/// so every vertex attribute stays 4-byte aligned.
pub fn write_glb<W: Write>(mesh: &Mesh, out: &mut W) -> Result<()> {
    let vertex_count = mesh.vertex_count();
    let bounds = mesh.bounds();

    let mut bin = Vec::with_capacity(vertex_count * 28 + mesh.indices.len() * 4);
    let positions_offset = bin.len();
    bin.extend(mesh.positions.iter().flat_map(|v| v.to_le_bytes()));
    let normals_offset = bin.len();
    bin.extend(mesh.normals.iter().flat_map(|v| v.to_le_bytes()));
    let colors_offset = bin.len();
    for rgb in mesh.colors.chunks_exact(3) {
        bin.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    let indices_offset = bin.len();
    bin.extend(mesh.indices.iter().flat_map(|i| i.to_le_bytes()));
    let bin_length = bin.len();

    let view = |offset: usize, length: usize, target: u32| {
        json!({ "buffer": 0, "byteOffset": offset, "byteLength": length, "target": target })
    };

    let document = json!({
        "asset": { "version": "2.0", "generator": concat!("scenelift ", env!("CARGO_PKG_VERSION")) },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": "environment" }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "NORMAL": 1, "COLOR_0": 2 },
                "indices": 3,
                "mode": TRIANGLES
            }]
        }],
        "accessors": [
            {
                "bufferView": 0, "componentType": FLOAT, "count": vertex_count, "type": "VEC3",
                "min": [bounds.min.x, bounds.min.y, bounds.min.z],
                "max": [bounds.max.x, bounds.max.y, bounds.max.z]
            },
            { "bufferView": 1, "componentType": FLOAT, "count": vertex_count, "type": "VEC3" },
            {
                "bufferView": 2, "componentType": UNSIGNED_BYTE, "normalized": true,
                "count": vertex_count, "type": "VEC4"
            },
            { "bufferView": 3, "componentType": UNSIGNED_INT, "count": mesh.indices.len(), "type": "SCALAR" }
        ],
        "bufferViews": [
            view(positions_offset, normals_offset - positions_offset, ARRAY_BUFFER),
            view(normals_offset, colors_offset - normals_offset, ARRAY_BUFFER),
            view(colors_offset, indices_offset - colors_offset, ARRAY_BUFFER),
            view(indices_offset, bin_length - indices_offset, ELEMENT_ARRAY_BUFFER)
        ],
        "buffers": [{ "byteLength": bin_length }]
    });

    let mut json_chunk = serde_json::to_vec(&document)?;
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    out.write_all(&GLB_MAGIC.to_le_bytes())?;
    out.write_all(&GLB_VERSION.to_le_bytes())?;
    out.write_all(&(total as u32).to_le_bytes())?;

    out.write_all(&(json_chunk.len() as u32).to_le_bytes())?;
    out.write_all(&CHUNK_JSON.to_le_bytes())?;
    out.write_all(&json_chunk)?;

    out.write_all(&(bin.len() as u32).to_le_bytes())?;
    out.write_all(&CHUNK_BIN.to_le_bytes())?;
    out.write_all(&bin)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_mesh;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_glb_layout() {
        let mesh = test_mesh();
        let mut bytes = Vec::new();
        write_glb(&mesh, &mut bytes).unwrap();

        assert_eq!(&bytes[0..4], b"glTF");
        assert_eq!(read_u32(&bytes, 4), 2);
        assert_eq!(read_u32(&bytes, 8) as usize, bytes.len());

        let json_len = read_u32(&bytes, 12) as usize;
        assert_eq!(json_len % 4, 0);
        assert_eq!(&bytes[16..20], b"JSON");
        let document: serde_json::Value = serde_json::from_slice(&bytes[20..20 + json_len]).unwrap();

        let bin_header = 20 + json_len;
        assert_eq!(&bytes[bin_header + 4..bin_header + 8], b"BIN\0");
        let bin_len = read_u32(&bytes, bin_header) as usize;
        assert_eq!(bin_len, 24 * 12 + 24 * 12 + 24 * 4 + 36 * 4);
        assert_eq!(document["buffers"][0]["byteLength"], bin_len);

        let position = &document["accessors"][0];
        assert_eq!(position["count"], 24);
        assert_eq!(position["min"][0], -1.0);
        assert_eq!(position["max"][1], 0.5);
        assert_eq!(document["accessors"][3]["count"], 36);
    }
}
