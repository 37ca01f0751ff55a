#[cfg(feature = "storage-local")]
use crate::LocalBlobStore;
use crate::{BlobStore, MemoryBlobStore, StorageBackend, StorageResult};
use jobsync_core::SyncConfig;
use std::sync::Arc;

/// Create a blob store based on configuration
pub async fn create_blob_store(config: &SyncConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let store = LocalBlobStore::new(
                config.local_storage_path.clone(),
                config.local_storage_base_url.clone(),
            )
            .await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(crate::StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
    }
}
