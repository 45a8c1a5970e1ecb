// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic expiry of old jobs and their stored files.

use super::jobs::JobStore;
use super::storage::ArtifactStore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Expire jobs older than `retention` and delete their artefacts.
///
/// Returns the number of jobs expired.
pub async fn sweep(jobs: &JobStore, storage: &ArtifactStore, retention: Duration) -> usize {
    let expired = jobs.expire(SystemTime::now(), retention);
    for job in &expired {
        if let Err(e) = storage.remove_job(&job.id).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to remove job artefacts");
        }
    }
    if !expired.is_empty() {
        tracing::info!(expired = expired.len(), remaining = jobs.len(), "Expired old jobs");
    }
    expired.len()
}

/// Run [`sweep`] every `interval` for the life of the process.
pub fn spawn(
    jobs: Arc<JobStore>,
    storage: Arc<ArtifactStore>,
    retention: Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep(&jobs, &storage, retention).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Job;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_sweep_removes_jobs_and_files() {
        let root = std::env::temp_dir().join(format!("scenelift-cleanup-{}", Uuid::new_v4()));
        let storage = ArtifactStore::new(&root).await.unwrap();
        let jobs = JobStore::new();

        let id = Uuid::new_v4();
        let mut job = Job::uploaded(id, "old.png".into(), "png".into());
        job.created_at = SystemTime::now() - Duration::from_secs(48 * 3600);
        jobs.insert(job);
        storage.put_upload(&id, b"old image").await.unwrap();

        let fresh = Uuid::new_v4();
        jobs.insert(Job::uploaded(fresh, "new.png".into(), "png".into()));

        let expired = sweep(&jobs, &storage, Duration::from_secs(24 * 3600)).await;
        assert_eq!(expired, 1);
        assert!(jobs.get(&id).is_none());
        assert!(jobs.get(&fresh).is_some());
        assert!(storage.read_upload(&id).await.unwrap().is_none());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
