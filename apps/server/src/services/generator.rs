// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background generation: upload -> pipeline -> exported models.

use super::jobs::JobStore;
use super::storage::ArtifactStore;
use crate::types::{Job, JobFailure};
use scenelift_geometry::{export, ExportFormat};
use scenelift_vision::{
    generate_environment, GenerationOptions, PipelineConfig, PipelineStage, SceneType,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Formats produced for every completed job.
pub const OUTPUT_FORMATS: [ExportFormat; 2] = [ExportFormat::Glb, ExportFormat::Obj];

/// Runs generation jobs on the blocking pool, a bounded number at a time.
#[derive(Clone)]
pub struct Generator {
    jobs: Arc<JobStore>,
    storage: Arc<ArtifactStore>,
    pipeline: Arc<PipelineConfig>,
    permits: Arc<Semaphore>,
}

struct Rendered {
    outputs: Vec<(ExportFormat, Vec<u8>)>,
    scene: SceneType,
}

impl Generator {
    pub fn new(
        jobs: Arc<JobStore>,
        storage: Arc<ArtifactStore>,
        pipeline: PipelineConfig,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            jobs,
            storage,
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        }
    }

    /// Start a job already moved to `processing`. Errors end up on the job.
    pub fn spawn(&self, job: Job, options: GenerationOptions) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let id = job.id;
            let started = Instant::now();
            match this.run(job, options).await {
                Ok(scene) => tracing::info!(
                    job_id = %id,
                    scene = %scene,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generation completed"
                ),
                Err(failure) => {
                    tracing::warn!(job_id = %id, stage = %failure.stage, error = %failure.message, "Generation failed");
                    this.jobs.fail(&id, failure);
                }
            }
        })
    }

    async fn run(&self, job: Job, options: GenerationOptions) -> Result<SceneType, JobFailure> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| JobFailure::new("queue", e.to_string()))?;

        let id = job.id;
        let bytes = self
            .storage
            .read_upload(&id)
            .await
            .map_err(|e| JobFailure::new("storage", e.to_string()))?
            .ok_or_else(|| JobFailure::new("storage", "uploaded image is missing"))?;
        let scratch = self.storage.scratch_path(&id, &job.extension);
        tokio::fs::write(&scratch, &bytes)
            .await
            .map_err(|e| JobFailure::new("storage", e.to_string()))?;
        drop(bytes);

        let jobs = self.jobs.clone();
        let pipeline = self.pipeline.clone();
        let path = scratch.clone();
        let result =
            tokio::task::spawn_blocking(move || render(&path, &options, &pipeline, &jobs, &id))
                .await;
        if let Err(e) = tokio::fs::remove_file(&scratch).await {
            tracing::debug!(job_id = %id, error = %e, "Failed to remove scratch file");
        }
        let rendered = result.map_err(|e| JobFailure::new("internal", e.to_string()))??;

        for (format, data) in &rendered.outputs {
            self.storage
                .put_output(&id, *format, data)
                .await
                .map_err(|e| JobFailure::new("storage", e.to_string()))?;
        }
        let formats = rendered.outputs.iter().map(|(format, _)| *format).collect();
        self.jobs.complete(&id, formats, rendered.scene);
        Ok(rendered.scene)
    }
}

fn render(
    path: &Path,
    options: &GenerationOptions,
    pipeline: &PipelineConfig,
    jobs: &JobStore,
    id: &Uuid,
) -> Result<Rendered, JobFailure> {
    // The job only reads complete once its files are stored
    let env = generate_environment(path, options, pipeline, |stage| {
        if stage != PipelineStage::Complete {
            jobs.advance(id, stage);
        }
    })?;

    jobs.set_step(id, 80, "Exporting models");
    let outputs = OUTPUT_FORMATS
        .iter()
        .map(|&format| export(&env.mesh, format).map(|data| (format, data)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| JobFailure::new("export", e.to_string()))?;

    tracing::debug!(
        job_id = %id,
        vertices = env.mesh.vertex_count(),
        triangles = env.mesh.triangle_count(),
        depth_ms = env.timings.depth_ms as u64,
        mesh_ms = env.timings.mesh_ms as u64,
        "Environment generated"
    );
    Ok(Rendered {
        outputs,
        scene: env.scene,
    })
}
