//! Blob storage abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use jobsync_core::SyncError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for SyncError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(message) => SyncError::Internal(message),
            other => SyncError::UploadFailed(other.to_string()),
        }
    }
}

/// Transfer progress for a single upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Completed fraction in `[0, 1]`. An empty payload counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Receives progress events while an upload runs.
pub type ProgressSink<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// Blob storage abstraction trait
///
/// Keys follow the layout produced by [`crate::keys::photo_object_path`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return a durable URL for it.
    ///
    /// `progress` is called zero or more times with non-decreasing byte
    /// counts while the transfer runs.
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
        progress: ProgressSink<'_>,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction() {
        let p = UploadProgress {
            bytes_transferred: 25,
            total_bytes: 100,
        };
        assert_eq!(p.fraction(), 0.25);

        let empty = UploadProgress {
            bytes_transferred: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.fraction(), 1.0);
    }

    #[test]
    fn storage_errors_surface_as_upload_failures() {
        let err: SyncError = StorageError::InvalidKey("../k".into()).into();
        assert!(matches!(err, SyncError::UploadFailed(_)));

        let err: SyncError = StorageError::ConfigError("no root".into()).into();
        assert!(matches!(err, SyncError::Internal(_)));
    }
}
