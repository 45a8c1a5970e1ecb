// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generation job record.

use scenelift_geometry::ExportFormat;
use scenelift_vision::SceneType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Lifecycle of a job: `uploaded -> processing -> completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed, reported to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Pipeline stage that raised the error.
    pub stage: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

impl From<scenelift_vision::Error> for JobFailure {
    fn from(err: scenelift_vision::Error) -> Self {
        JobFailure::new(err.stage(), err.to_string())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

/// One uploaded image and everything generated from it.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    /// Client-side file name, path components stripped.
    pub original_filename: String,
    /// Lowercase extension of the upload, used to name the scratch file.
    pub extension: String,
    pub status: JobStatus,
    /// Completion percentage, 0-100.
    pub progress: u8,
    pub current_step: String,
    pub created_at: SystemTime,
    pub completed_at: Option<SystemTime>,
    /// Formats available for download once completed.
    pub outputs: Vec<ExportFormat>,
    pub scene: Option<SceneType>,
    pub error: Option<JobFailure>,
}

impl Job {
    /// A freshly uploaded image waiting for a generate request.
    pub fn uploaded(id: Uuid, original_filename: String, extension: String) -> Self {
        Self {
            id,
            original_filename,
            extension,
            status: JobStatus::Uploaded,
            progress: 0,
            current_step: String::new(),
            created_at: SystemTime::now(),
            completed_at: None,
            outputs: Vec::new(),
            scene: None,
            error: None,
        }
    }
}

/// Seconds since the Unix epoch, 0 for times before it.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
