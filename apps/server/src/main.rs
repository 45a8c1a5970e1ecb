// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SceneLift Server - image to 3D environment generation over HTTP.
//!
//! Clients upload an image, start a generation job, poll its progress and
//! download the resulting model. Generation runs in the background on the
//! blocking thread pool; jobs and their files expire after a retention
//! period.
//!
//! # Endpoints
//!
//! - `GET /` - Service information
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/upload` - Upload an image (multipart field `image`)
//! - `POST /api/v1/generate` - Start generation for an uploaded job
//! - `GET /api/v1/status/:job_id` - Job progress
//! - `GET /api/v1/download/:job_id/:format` - Download `glb`, `obj` or `fbx`

use anyhow::Context;
use axum::http::HeaderValue;
use scenelift_vision::{DepthConfig, PipelineConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use error::ApiError;
use services::{ArtifactStore, Generator, JobStore};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub storage: Arc<ArtifactStore>,
    pub generator: Generator,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config, pipeline: PipelineConfig) -> Result<Self, ApiError> {
        let jobs = Arc::new(JobStore::new());
        let storage = Arc::new(ArtifactStore::new(&config.storage_dir).await?);
        let generator = Generator::new(
            jobs.clone(),
            storage.clone(),
            pipeline,
            config.max_concurrent_jobs,
        );
        Ok(Self {
            jobs,
            storage,
            generator,
            config: Arc::new(config),
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "info,tower_http=debug,scenelift_server=debug,scenelift_vision=info".into()
        }))
        .pretty()
        .init();

    let config = Config::from_env();

    tracing::info!(
        port = config.port,
        storage_dir = %config.storage_dir,
        max_file_size_mb = config.max_file_size_mb,
        worker_threads = config.worker_threads,
        max_concurrent_jobs = config.max_concurrent_jobs,
        depth_preset = %config.depth_preset,
        "Starting SceneLift Server"
    );

    // Cue evaluation and filters share this pool across jobs
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
        .context("failed to initialize rayon thread pool")?;

    let depth = DepthConfig::preset(&config.depth_preset)
        .with_context(|| format!("unknown DEPTH_PRESET '{}'", config.depth_preset))?;
    let pipeline = PipelineConfig {
        depth,
        ..PipelineConfig::default()
    };

    let state = AppState::new(config.clone(), pipeline)
        .await
        .context("failed to open storage")?;

    services::cleanup::spawn(
        state.jobs.clone(),
        state.storage.clone(),
        config.job_retention(),
        config.cleanup_interval(),
    );

    let app = routes::router(state)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
