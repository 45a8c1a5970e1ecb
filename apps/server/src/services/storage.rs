// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk storage for uploads and generated models using cacache.

use crate::error::ApiError;
use cacache::Integrity;
use scenelift_geometry::ExportFormat;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Content-addressable artefact store keyed by job.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cache_dir: PathBuf,
    scratch_dir: PathBuf,
}

fn upload_key(id: &Uuid) -> String {
    format!("upload:{id}")
}

fn output_key(id: &Uuid, format: ExportFormat) -> String {
    format!("output:{id}:{}", format.extension())
}

impl ArtifactStore {
    /// Open (and create if needed) the store under `root`.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, ApiError> {
        let root = root.as_ref();
        let store = Self {
            cache_dir: root.join("artifacts"),
            scratch_dir: root.join("scratch"),
        };
        tokio::fs::create_dir_all(&store.cache_dir).await?;
        tokio::fs::create_dir_all(&store.scratch_dir).await?;
        Ok(store)
    }

    pub async fn put_upload(&self, id: &Uuid, data: &[u8]) -> Result<(), ApiError> {
        cacache::write(&self.cache_dir, upload_key(id), data).await?;
        tracing::debug!(job_id = %id, size = data.len(), "Stored upload");
        Ok(())
    }

    pub async fn read_upload(&self, id: &Uuid) -> Result<Option<Vec<u8>>, ApiError> {
        self.read(&upload_key(id)).await
    }

    pub async fn put_output(
        &self,
        id: &Uuid,
        format: ExportFormat,
        data: &[u8],
    ) -> Result<(), ApiError> {
        cacache::write(&self.cache_dir, output_key(id, format), data).await?;
        tracing::debug!(job_id = %id, format = %format, size = data.len(), "Stored output");
        Ok(())
    }

    pub async fn read_output(
        &self,
        id: &Uuid,
        format: ExportFormat,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        self.read(&output_key(id, format)).await
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ApiError::Storage(e.to_string())),
        }
    }

    /// Plain file the pipeline reads the upload from.
    pub fn scratch_path(&self, id: &Uuid, extension: &str) -> PathBuf {
        self.scratch_dir.join(format!("{id}.{extension}"))
    }

    /// Drop every entry of a job. Content shared with a live entry is kept.
    ///
    /// Returns the number of entries removed.
    pub async fn remove_job(&self, id: &Uuid) -> Result<usize, ApiError> {
        let cache = self.cache_dir.clone();
        let mut keys = vec![upload_key(id)];
        keys.extend(ExportFormat::ALL.iter().map(|&format| output_key(id, format)));
        let removed = tokio::task::spawn_blocking(move || remove_entries(&cache, &keys)).await??;
        tracing::debug!(job_id = %id, removed, "Removed job artefacts");
        Ok(removed)
    }
}

fn remove_entries(cache: &Path, keys: &[String]) -> Result<usize, cacache::Error> {
    let mut orphaned: Vec<Integrity> = Vec::new();
    for key in keys {
        if let Some(entry) = cacache::metadata_sync(cache, key)? {
            cacache::remove_sync(cache, key)?;
            orphaned.push(entry.integrity);
        }
    }
    if orphaned.is_empty() {
        return Ok(0);
    }

    let live: Vec<Integrity> = cacache::list_sync(cache)
        .filter_map(Result::ok)
        .map(|entry| entry.integrity)
        .collect();
    let removed = orphaned.len();
    for sri in orphaned {
        if !live.contains(&sri) {
            cacache::remove_hash_sync(cache, &sri)?;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scenelift-storage-{name}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_upload_and_output_roundtrip() {
        let root = scratch_root("roundtrip");
        let store = ArtifactStore::new(&root).await.unwrap();
        let id = Uuid::new_v4();

        assert!(store.read_upload(&id).await.unwrap().is_none());
        store.put_upload(&id, b"image bytes").await.unwrap();
        store.put_output(&id, ExportFormat::Glb, b"glTF....").await.unwrap();

        assert_eq!(store.read_upload(&id).await.unwrap().unwrap(), b"image bytes");
        assert_eq!(
            store.read_output(&id, ExportFormat::Glb).await.unwrap().unwrap(),
            b"glTF...."
        );
        assert!(store.read_output(&id, ExportFormat::Obj).await.unwrap().is_none());

        assert_eq!(store.remove_job(&id).await.unwrap(), 2);
        assert!(store.read_upload(&id).await.unwrap().is_none());
        assert!(store.read_output(&id, ExportFormat::Glb).await.unwrap().is_none());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_shared_content_survives_removal() {
        let root = scratch_root("shared");
        let store = ArtifactStore::new(&root).await.unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        // Same image uploaded twice dedupes to one blob
        store.put_upload(&a, b"same picture").await.unwrap();
        store.put_upload(&b, b"same picture").await.unwrap();

        store.remove_job(&a).await.unwrap();
        assert!(store.read_upload(&a).await.unwrap().is_none());
        assert_eq!(store.read_upload(&b).await.unwrap().unwrap(), b"same picture");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_scratch_path_uses_extension() {
        let root = scratch_root("scratch");
        let store = ArtifactStore::new(&root).await.unwrap();
        let id = Uuid::new_v4();
        let path = store.scratch_path(&id, "png");
        assert!(path.ends_with(format!("{id}.png")));
        assert!(path.starts_with(&root));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
