use jobsync_core::SyncError;
use thiserror::Error;

/// Document store operation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    /// The query cannot be served, e.g. a required composite index is missing.
    #[error("Query unavailable: {0}")]
    QueryUnavailable(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Subscription closed")]
    Closed,

    #[error("Store backend error: {0}")]
    BackendError(String),
}

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WriteRejected(_)
            | StoreError::NotFound(_)
            | StoreError::InvalidDocument(_) => SyncError::WriteRejected(err.to_string()),
            StoreError::QueryUnavailable(_) | StoreError::Closed => {
                SyncError::QueryFailed(err.to_string())
            }
            StoreError::BackendError(message) => SyncError::Internal(message),
        }
    }
}
