//! Jobsync Core Library
//!
//! This crate provides the domain models, error types, configuration, and validation
//! shared by every Jobsync component: the document store, the blob store and the
//! synchronization services.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod time_format;
pub mod validation;

// Re-export commonly used types
pub use config::SyncConfig;
pub use error::{log_error, ErrorMetadata, LogLevel, SyncError, SyncResult};
pub use storage_types::StorageBackend;
pub use time_format::format_hms;
