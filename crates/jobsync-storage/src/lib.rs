//! Jobsync blob storage
//!
//! Photo binaries are written to a blob store that returns a durable URL and
//! reports transfer progress while it writes. This crate holds the
//! [`BlobStore`] trait, the object path convention, a local filesystem backend
//! and an in-memory backend.
//!
//! # Object path format
//!
//! `{prefix}/{session_id}/{kind}/{epoch_millis}_{filename}`, e.g.
//! `job-photos/abc123/before/1700000000000_meter.jpg`.
//!
//! Paths must not contain `..` or a leading `/`. Path generation is centralized
//! in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

pub use factory::create_blob_store;
pub use jobsync_core::StorageBackend;
pub use keys::{photo_object_path, sanitize_filename};
#[cfg(feature = "storage-local")]
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use traits::{BlobStore, ProgressSink, StorageError, StorageResult, UploadProgress};
