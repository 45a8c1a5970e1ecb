// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for uploaded images and generated models.
    pub storage_dir: String,
    /// Maximum upload size in MB.
    pub max_file_size_mb: usize,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Number of worker threads for cue evaluation.
    pub worker_threads: usize,
    /// Generations allowed to run at the same time.
    pub max_concurrent_jobs: usize,
    /// Jobs and their files are dropped after this many hours.
    pub job_retention_hours: u64,
    /// Seconds between expiry sweeps.
    pub cleanup_interval_secs: u64,
    /// Depth preset used for every job (`quality`, `low-memory`, `multi-cue`).
    pub depth_preset: String,
    /// Allowed CORS origins (comma-separated, or "*" for all).
    pub cors_origins: Vec<String>,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let workers = num_cpus::get();
        Self {
            port: env_or("PORT", 5000),
            storage_dir: std::env::var("STORAGE_DIR").unwrap_or_else(|_| {
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/storage".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".storage").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.storage".into())
                }
            }),
            max_file_size_mb: env_or("MAX_FILE_SIZE_MB", 16),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 120),
            worker_threads: env_or("WORKER_THREADS", workers),
            max_concurrent_jobs: env_or("MAX_CONCURRENT_JOBS", (workers / 2).max(1)),
            job_retention_hours: env_or("JOB_RETENTION_HOURS", 24),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", 3600),
            depth_preset: std::env::var("DEPTH_PRESET").unwrap_or_else(|_| "quality".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_hours * 3600)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}
