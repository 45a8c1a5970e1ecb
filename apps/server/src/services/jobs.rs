// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory job registry with explicit create/poll/update/expire operations.

use crate::error::ApiError;
use crate::types::{Job, JobFailure, JobStatus};
use rustc_hash::FxHashMap;
use scenelift_geometry::ExportFormat;
use scenelift_vision::{PipelineStage, SceneType};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Registry of generation jobs, shared through application state.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<FxHashMap<Uuid, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn lock(&self) -> MutexGuard<'_, FxHashMap<Uuid, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, job: Job) {
        self.lock().insert(job.id, job);
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Move an uploaded job to `processing`. Only one caller can win.
    pub fn start(&self, id: &Uuid) -> Result<Job, ApiError> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| ApiError::JobNotFound(id.to_string()))?;
        if job.status != JobStatus::Uploaded {
            return Err(ApiError::InvalidState(format!("Job already {}", job.status)));
        }
        job.status = JobStatus::Processing;
        job.progress = 10;
        job.current_step = "Queued".to_string();
        Ok(job.clone())
    }

    /// Record the pipeline stage a processing job has reached.
    pub fn advance(&self, id: &Uuid, stage: PipelineStage) {
        self.set_step(id, stage.progress(), stage.label());
    }

    pub fn set_step(&self, id: &Uuid, progress: u8, step: &str) {
        if let Some(job) = self.lock().get_mut(id) {
            if job.status == JobStatus::Processing {
                job.progress = progress;
                job.current_step = step.to_string();
            }
        }
    }

    pub fn complete(&self, id: &Uuid, outputs: Vec<ExportFormat>, scene: SceneType) {
        if let Some(job) = self.lock().get_mut(id) {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.current_step = "Complete".to_string();
            job.outputs = outputs;
            job.scene = Some(scene);
            job.completed_at = Some(SystemTime::now());
        }
    }

    pub fn fail(&self, id: &Uuid, failure: JobFailure) {
        if let Some(job) = self.lock().get_mut(id) {
            job.status = JobStatus::Failed;
            job.progress = 0;
            job.current_step = "Failed".to_string();
            job.error = Some(failure);
        }
    }

    /// Remove and return jobs created more than `retention` before `now`.
    ///
    /// Jobs still processing are kept until their worker finishes.
    pub fn expire(&self, now: SystemTime, retention: Duration) -> Vec<Job> {
        let mut jobs = self.lock();
        let expired: Vec<Uuid> = jobs
            .values()
            .filter(|job| job.status != JobStatus::Processing)
            .filter(|job| {
                now.duration_since(job.created_at)
                    .map(|age| age > retention)
                    .unwrap_or(false)
            })
            .map(|job| job.id)
            .collect();
        expired
            .iter()
            .filter_map(|id| jobs.remove(id))
            .collect()
    }
}
