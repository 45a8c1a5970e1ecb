// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service information and health check endpoints.

use super::jobs::ALLOWED_EXTENSIONS;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    /// Jobs currently tracked, in any state.
    pub jobs: usize,
    pub max_file_size_mb: usize,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub accepted_extensions: &'static [&'static str],
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: [(&str, &str, &str); 5] = [
    ("GET", "/api/v1/health", "Health check"),
    ("POST", "/api/v1/upload", "Upload an image (multipart field `image`)"),
    ("POST", "/api/v1/generate", "Start generation for an uploaded job"),
    ("GET", "/api/v1/status/:job_id", "Poll job progress"),
    ("GET", "/api/v1/download/:job_id/:format", "Download a generated model (glb, obj, fbx)"),
];

/// GET /api/v1/health - Health check endpoint.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "scenelift-server",
        jobs: state.jobs.len(),
        max_file_size_mb: state.config.max_file_size_mb,
    })
}

/// GET / - Service information.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        status: "online",
        service: "scenelift-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "Single-image to 3D environment generation",
        accepted_extensions: &ALLOWED_EXTENSIONS,
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
