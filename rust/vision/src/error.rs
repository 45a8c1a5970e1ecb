// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for depth estimation and reconstruction
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors. The first three variants are load failures: the source
/// image is unusable and retrying will not help.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot read image '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode image '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image '{path}' is too small ({width}x{height}); at least 2x2 pixels are required")]
    ImageTooSmall {
        path: PathBuf,
        width: u32,
        height: u32,
    },

    #[error("Depth estimation failed during {stage}: {reason}")]
    DepthEstimation { stage: &'static str, reason: String },

    #[error("Mesh construction failed during {stage}: {reason}")]
    MeshConstruction { stage: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] scenelift_geometry::Error),
}

impl Error {
    /// True when the source image itself is unusable
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::Read { .. } | Error::Load { .. } | Error::ImageTooSmall { .. }
        )
    }

    /// Pipeline stage the error was raised in, for job reports
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Read { .. } | Error::Load { .. } | Error::ImageTooSmall { .. } => "load",
            Error::DepthEstimation { stage, .. } | Error::MeshConstruction { stage, .. } => *stage,
            Error::Config(_) => "configuration",
            Error::Geometry(_) => "geometry",
        }
    }

    pub(crate) fn depth(stage: &'static str, reason: impl Into<String>) -> Self {
        Error::DepthEstimation {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn mesh(stage: &'static str, reason: impl Into<String>) -> Self {
        Error::MeshConstruction {
            stage,
            reason: reason.into(),
        }
    }
}
