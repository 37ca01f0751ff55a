//! Error types module
//!
//! All failures of the synchronization engine are unified under [`SyncError`].
//! None of them is fatal: each maps to a user-visible notification through
//! [`ErrorMetadata`] and leaves the engine in an actionable state.

use std::time::Duration;

use crate::validation::PhotoValidationError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected refusals like a double-tapped button
    Debug,
    /// Warning level - for degraded but recoverable situations
    Warn,
    /// Error level - for rejected writes and unexpected failures
    Error,
}

/// Describes how an error should be surfaced to the technician.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "WRITE_REJECTED")
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same action can succeed
    fn is_recoverable(&self) -> bool;

    /// Message suitable for a notification
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid file: {0}")]
    Validation(#[from] PhotoValidationError),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not confirmed within {0:?}")]
    Timeout(Duration),

    #[error("Clock-{direction} failed: {reason}")]
    ClockActionFailed {
        direction: &'static str,
        reason: String,
    },

    #[error("Upload of {name} failed: {reason}")]
    PhotoNotUploaded { name: String, reason: String },

    #[error("Recording {name} failed: {reason}")]
    PhotoNotRecorded { name: String, reason: String },

    #[error("Saving job details failed: {0}")]
    DetailsNotSaved(String),

    #[error("Invalid document {id}: {issues}")]
    Decode { id: String, issues: String },

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Session {0} is already open")]
    SessionAlreadyOpen(String),

    #[error("A clock action is already in flight")]
    ActionInFlight,

    #[error("A save is already in flight")]
    SaveInFlight,

    #[error("An upload is already in flight")]
    UploadInFlight,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Internal(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn sync_error_static_metadata(err: &SyncError) -> (&'static str, bool, LogLevel) {
    match err {
        SyncError::Validation(_) => ("INVALID_FILE", false, LogLevel::Debug),
        SyncError::WriteRejected(_) => ("WRITE_REJECTED", true, LogLevel::Error),
        SyncError::QueryFailed(_) => ("QUERY_FAILED", true, LogLevel::Warn),
        SyncError::UploadFailed(_) => ("UPLOAD_FAILED", true, LogLevel::Warn),
        SyncError::Timeout(_) => ("TIMEOUT", true, LogLevel::Warn),
        SyncError::ClockActionFailed { .. } => ("CLOCK_ACTION_FAILED", true, LogLevel::Error),
        SyncError::PhotoNotUploaded { .. } => ("PHOTO_NOT_UPLOADED", true, LogLevel::Warn),
        SyncError::PhotoNotRecorded { .. } => ("PHOTO_NOT_RECORDED", true, LogLevel::Error),
        SyncError::DetailsNotSaved(_) => ("DETAILS_NOT_SAVED", true, LogLevel::Error),
        SyncError::Decode { .. } => ("DECODE_ERROR", false, LogLevel::Warn),
        SyncError::NotSignedIn => ("NOT_SIGNED_IN", true, LogLevel::Debug),
        SyncError::AuthFailed(_) => ("AUTH_FAILED", true, LogLevel::Warn),
        SyncError::NoActiveSession => ("NO_ACTIVE_SESSION", false, LogLevel::Debug),
        SyncError::SessionAlreadyOpen(_) => ("SESSION_ALREADY_OPEN", false, LogLevel::Debug),
        SyncError::ActionInFlight => ("ACTION_IN_FLIGHT", true, LogLevel::Debug),
        SyncError::SaveInFlight => ("SAVE_IN_FLIGHT", true, LogLevel::Debug),
        SyncError::UploadInFlight => ("UPLOAD_IN_FLIGHT", true, LogLevel::Debug),
        SyncError::Internal(_) => ("INTERNAL_ERROR", false, LogLevel::Error),
    }
}

impl ErrorMetadata for SyncError {
    fn error_code(&self) -> &'static str {
        sync_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        sync_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            SyncError::Validation(e) => e.to_string(),
            SyncError::WriteRejected(_) => "Could not save to the server. Please try again.".into(),
            SyncError::QueryFailed(_) => "Could not load data. Showing what is available.".into(),
            SyncError::UploadFailed(_) => "Upload failed. Please try again.".into(),
            SyncError::Timeout(_) => {
                "Sync is taking too long. Check your connection and try again.".into()
            }
            SyncError::ClockActionFailed { direction, .. } => {
                format!("Failed to clock {}. Please try again.", direction)
            }
            SyncError::PhotoNotUploaded { name, .. } => format!("Upload failed for {}.", name),
            SyncError::PhotoNotRecorded { name, .. } => format!("Failed to save link for {}.", name),
            SyncError::DetailsNotSaved(_) => "Failed to save details".into(),
            SyncError::Decode { .. } => "Some job data could not be read.".into(),
            SyncError::NotSignedIn => "Please sign in first.".into(),
            SyncError::AuthFailed(_) => "Invalid email or password".into(),
            SyncError::NoActiveSession => "You are not clocked in.".into(),
            SyncError::SessionAlreadyOpen(_) => "You are already clocked in.".into(),
            SyncError::ActionInFlight => "Still syncing the previous action.".into(),
            SyncError::SaveInFlight => "Still saving.".into(),
            SyncError::UploadInFlight => "An upload is already running.".into(),
            SyncError::Internal(_) => "Something went wrong.".into(),
        }
    }

    fn log_level(&self) -> LogLevel {
        sync_error_static_metadata(self).2
    }
}

/// Log `error` at the level its metadata asks for.
pub fn log_error(error: &SyncError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code, "Sync error"),
        LogLevel::Warn => tracing::warn!(error = %error, code, "Sync error"),
        LogLevel::Error => tracing::error!(error = %error, code, "Sync error"),
    }
}
