//! In-memory blob store with failure injection.

use crate::keys::validate_key;
use crate::traits::{BlobStore, ProgressSink, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const PROGRESS_STEPS: u64 = 4;

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    data: Bytes,
}

#[derive(Default)]
struct Inner {
    blobs: BTreeMap<String, StoredBlob>,
    failing_names: HashSet<String>,
    step_delay: Option<Duration>,
    upload_attempts: u64,
}

/// Blob store backed by a map, addressed as `memory://{key}`.
///
/// Uploads report progress in fixed steps and can be slowed down or made to
/// fail for chosen file names.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail uploads whose key ends with `_{name}`, i.e. the sanitized file name.
    pub fn fail_uploads_named(&self, name: impl Into<String>) {
        self.lock().failing_names.insert(name.into());
    }

    /// Sleep between progress steps so an upload spans observable time.
    pub fn set_step_delay(&self, delay: Option<Duration>) {
        self.lock().step_delay = delay;
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().blobs.get(key).map(|b| b.content_type.clone())
    }

    pub fn data(&self, key: &str) -> Option<Bytes> {
        self.lock().blobs.get(key).map(|b| b.data.clone())
    }

    pub fn upload_attempts(&self) -> u64 {
        self.lock().upload_attempts
    }

    fn should_fail(&self, key: &str) -> bool {
        let inner = self.lock();
        let file_part = key.rsplit('/').next().unwrap_or(key);
        let name = file_part.split_once('_').map_or(file_part, |(_, n)| n);
        inner.failing_names.contains(name)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
        progress: ProgressSink<'_>,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let delay = {
            let mut inner = self.lock();
            inner.upload_attempts += 1;
            inner.step_delay
        };

        let total_bytes = data.len() as u64;
        for step in 0..PROGRESS_STEPS {
            progress(UploadProgress {
                bytes_transferred: total_bytes * step / PROGRESS_STEPS,
                total_bytes,
            });
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if step == PROGRESS_STEPS / 2 && self.should_fail(key) {
                tracing::debug!(key = %key, "Injected upload failure");
                return Err(StorageError::UploadFailed(format!(
                    "Transfer interrupted for {}",
                    key
                )));
            }
        }

        self.lock().blobs.insert(
            key.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                data,
            },
        );
        progress(UploadProgress {
            bytes_transferred: total_bytes,
            total_bytes,
        });

        Ok(format!("memory://{}", key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_progress(_: UploadProgress) {}

    #[tokio::test]
    async fn stores_and_returns_url() {
        let store = MemoryBlobStore::new();
        let url = store
            .upload("p/s/before/1_a.jpg", "image/jpeg", Bytes::from_static(b"abc"), &no_progress)
            .await
            .unwrap();
        assert_eq!(url, "memory://p/s/before/1_a.jpg");
        assert_eq!(
            store.content_type("p/s/before/1_a.jpg").as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            store.data("p/s/before/1_a.jpg"),
            Some(Bytes::from_static(b"abc"))
        );
    }

    #[tokio::test]
    async fn injected_failure_matches_file_name() {
        let store = MemoryBlobStore::new();
        store.fail_uploads_named("bad.jpg");

        let err = store
            .upload("p/s/after/5_bad.jpg", "image/jpeg", Bytes::from_static(b"x"), &no_progress)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert!(store.keys().is_empty());

        assert!(store
            .upload("p/s/after/6_good.jpg", "image/jpeg", Bytes::from_static(b"x"), &no_progress)
            .await
            .is_ok());
        assert_eq!(store.upload_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn step_delay_stretches_uploads() {
        let store = MemoryBlobStore::new();
        store.set_step_delay(Some(Duration::from_millis(100)));
        let started = tokio::time::Instant::now();
        store
            .upload("p/s/after/1_a.jpg", "image/jpeg", Bytes::from_static(b"x"), &no_progress)
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(400));
    }
}
