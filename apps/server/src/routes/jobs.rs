// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Upload, generate, status and download endpoints.

use crate::error::ApiError;
use crate::types::{
    GenerateRequest, GenerateResponse, Job, JobStatus, StatusResponse, UploadResponse,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use scenelift_geometry::ExportFormat;
use uuid::Uuid;

/// Image types accepted by the upload endpoint.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

struct UploadedImage {
    filename: String,
    extension: String,
    data: Vec<u8>,
}

/// Extract the `image` field from a multipart request.
async fn extract_image(multipart: &mut Multipart, max_mb: usize) -> Result<UploadedImage, ApiError> {
    let too_large = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::FileTooLarge { max_mb }
        } else {
            ApiError::Multipart(e)
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(too_large)? {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(|name| std::path::Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        if filename.is_empty() {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| ApiError::InvalidFileType {
                allowed: ALLOWED_EXTENSIONS.join(", "),
            })?;

        let data = field.bytes().await.map_err(too_large)?;
        tracing::debug!(filename = %filename, size = data.len(), "Extracted image from multipart");
        return Ok(UploadedImage {
            filename,
            extension,
            data: data.to_vec(),
        });
    }

    Err(ApiError::MissingFile)
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::JobNotFound(raw.to_string()))
}

fn find_job(state: &AppState, raw: &str) -> Result<Job, ApiError> {
    let id = parse_job_id(raw)?;
    state
        .jobs
        .get(&id)
        .ok_or_else(|| ApiError::JobNotFound(raw.to_string()))
}

/// FBX is not produced; those requests are served the OBJ export.
fn resolve_format(requested: &str) -> Option<ExportFormat> {
    match requested.to_ascii_lowercase().as_str() {
        "fbx" => Some(ExportFormat::Obj),
        other => other.parse().ok(),
    }
}

/// POST /api/v1/upload - Store an image and create a job for it.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_mb = state.config.max_file_size_mb;
    let image = extract_image(&mut multipart, max_mb).await?;
    if image.data.len() > state.config.max_file_size_bytes() {
        return Err(ApiError::FileTooLarge { max_mb });
    }

    let id = Uuid::new_v4();
    state.storage.put_upload(&id, &image.data).await?;
    tracing::info!(job_id = %id, filename = %image.filename, size = image.data.len(), "Image uploaded");
    state
        .jobs
        .insert(Job::uploaded(id, image.filename, image.extension));

    Ok(Json(UploadResponse {
        success: true,
        job_id: id,
        message: "Image uploaded successfully".to_string(),
    }))
}

/// POST /api/v1/generate - Start generation for an uploaded job.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload?;
    let raw_id = request
        .job_id
        .ok_or_else(|| ApiError::BadRequest("job_id is required".to_string()))?;
    let id = parse_job_id(&raw_id)?;

    let thickness = request.options.wall_thickness;
    if !(thickness.is_finite() && thickness > 0.0) {
        return Err(ApiError::BadRequest(format!(
            "wall_thickness must be positive, got {thickness}"
        )));
    }

    let job = state.jobs.start(&id)?;
    tracing::info!(
        job_id = %id,
        hallucinate = request.options.hallucinate_unseen,
        complexity = %request.options.room_complexity,
        "Generation started"
    );
    state.generator.spawn(job, request.options);

    Ok(Json(GenerateResponse {
        success: true,
        job_id: id,
        message: "Generation started".to_string(),
        status: JobStatus::Processing,
    }))
}

/// GET /api/v1/status/:job_id - Poll a job.
pub async fn status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = find_job(&state, &job_id)?;
    Ok(Json(StatusResponse::from(&job)))
}

/// GET /api/v1/download/:job_id/:format - Fetch a generated model.
pub async fn download(
    State(state): State<AppState>,
    Path((job_id, format)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &job_id)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::InvalidState(format!(
            "Job is {}, not completed",
            job.status
        )));
    }

    let resolved = resolve_format(&format)
        .filter(|resolved| job.outputs.contains(resolved))
        .ok_or_else(|| ApiError::NotFound(format!("Format {format} not available")))?;
    let data = state
        .storage
        .read_output(&job.id, resolved)
        .await?
        .ok_or_else(|| ApiError::NotFound("File not found".to_string()))?;

    tracing::info!(job_id = %job.id, format = %resolved, size = data.len(), "Download");
    let disposition = format!(
        "attachment; filename=\"generated_3d_environment.{}\"",
        resolved.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, resolved.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format("GLB"), Some(ExportFormat::Glb));
        assert_eq!(resolve_format("fbx"), Some(ExportFormat::Obj));
        assert_eq!(resolve_format("obj"), Some(ExportFormat::Obj));
        assert_eq!(resolve_format("stl"), None);
    }

    #[test]
    fn test_parse_job_id() {
        assert!(parse_job_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_job_id(&id.to_string()).unwrap(), id);
    }
}
