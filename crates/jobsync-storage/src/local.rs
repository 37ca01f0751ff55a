use crate::keys::validate_key;
use crate::traits::{BlobStore, ProgressSink, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem blob store
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for blobs (e.g., "./data/blobs")
    /// * `base_url` - Base URL the returned blob URLs start with (e.g., "file://data/blobs")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a key to a filesystem path inside the base directory
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        let path = self.base_path.join(key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }
        Ok(path)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        key: &str,
        _content_type: &str,
        data: Bytes,
        progress: ProgressSink<'_>,
    ) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        let total_bytes = data.len() as u64;

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        progress(UploadProgress {
            bytes_transferred: 0,
            total_bytes,
        });
        let mut written = 0u64;
        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
            progress(UploadProgress {
                bytes_transferred: written,
                total_bytes,
            });
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        let url = self.generate_url(key);

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = total_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local blob upload successful"
        );

        Ok(url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn no_progress(_: UploadProgress) {}

    #[tokio::test]
    async fn test_local_upload_writes_file() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "file://blobs".to_string())
            .await
            .unwrap();

        let data = Bytes::from_static(b"jpeg bytes");
        let url = store
            .upload("job-photos/s1/before/1_a.jpg", "image/jpeg", data.clone(), &no_progress)
            .await
            .unwrap();

        assert_eq!(url, "file://blobs/job-photos/s1/before/1_a.jpg");
        let written = tokio::fs::read(dir.path().join("job-photos/s1/before/1_a.jpg"))
            .await
            .unwrap();
        assert_eq!(written, data.as_ref());
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "file://blobs".to_string())
            .await
            .unwrap();

        let seen = Mutex::new(Vec::new());
        let record = |p: UploadProgress| seen.lock().unwrap().push(p.bytes_transferred);
        let data = Bytes::from(vec![7u8; WRITE_CHUNK_SIZE * 2 + 10]);
        store
            .upload("k/big.jpg", "image/jpeg", data, &record)
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&((WRITE_CHUNK_SIZE * 2 + 10) as u64)));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("root"), "file://blobs".to_string())
            .await
            .unwrap();

        for key in ["../../../etc/passwd", "/etc/passwd", "a/../../b.jpg"] {
            let result = store
                .upload(key, "image/jpeg", Bytes::from_static(b"x"), &no_progress)
                .await;
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{}", key);
        }
        assert!(!dir.path().join("etc").exists());
    }
}
