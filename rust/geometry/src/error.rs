// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, validating or exporting meshes
#[derive(Error, Debug)]
pub enum Error {
    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("Triangle index {index} out of bounds for {vertex_count} vertices")]
    IndexOutOfBounds { index: u32, vertex_count: usize },

    #[error("Vertex {vertex} has a non-finite coordinate")]
    NonFiniteVertex { vertex: usize },

    #[error("Malformed mesh buffers: {0}")]
    MalformedBuffers(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
