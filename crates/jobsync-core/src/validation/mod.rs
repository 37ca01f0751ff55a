//! Validation modules
//!
//! `session` is the boundary decoder for remote documents, `photo_file` checks
//! files before they enter an upload queue.

pub mod photo_file;
pub mod session;
pub mod timestamp;

pub use photo_file::{PhotoFileInfo, PhotoValidationError, PhotoValidator};
pub use session::{
    decode_job_session, decode_photo_entry, decode_photos, extract_job_session, join_issues,
    ValidationIssue,
};
pub use timestamp::{parse_timestamp, timestamp_value};
