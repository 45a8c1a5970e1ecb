// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use super::{unix_seconds, Job, JobFailure, JobStatus};
use scenelift_vision::SceneType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Response to a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub message: String,
}

/// Response to a generate request that started a background job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub job_id: Uuid,
    pub message: String,
    pub status: JobStatus,
}

/// Snapshot of a job for status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: Uuid,
    /// Name of the uploaded file.
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneType>,
    /// Format -> download path, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_files: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        let completed = job.status == JobStatus::Completed;
        let output_files = completed.then(|| {
            job.outputs
                .iter()
                .map(|format| {
                    (
                        format.extension().to_string(),
                        format!("/api/v1/download/{}/{}", job.id, format.extension()),
                    )
                })
                .collect()
        });

        Self {
            job_id: job.id,
            filename: job.original_filename.clone(),
            status: job.status,
            progress: job.progress,
            current_step: job.current_step.clone(),
            created_at: unix_seconds(job.created_at),
            scene: job.scene,
            output_files,
            completed_at: job.completed_at.filter(|_| completed).map(unix_seconds),
            error: job.error.clone().filter(|_| job.status == JobStatus::Failed),
        }
    }
}
