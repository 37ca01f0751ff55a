//! Shared object path generation for blob backends.
//!
//! Path format: `{prefix}/{session_id}/{kind}/{epoch_millis}_{filename}`.

use jobsync_core::models::UploadKind;

use crate::traits::{StorageError, StorageResult};

const MAX_FILENAME_LENGTH: usize = 255;

/// Reduce a client supplied filename to a safe final path segment.
///
/// Directory components are stripped and characters outside
/// `[A-Za-z0-9._-]` become `_`. A name containing `..` becomes
/// `invalid_filename`; names shorter than three characters become `file`.
pub fn sanitize_filename(filename: &str) -> String {
    let path = std::path::Path::new(filename);
    let filename_only = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return "invalid_filename".to_string();
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim().is_empty() || sanitized.len() < 3 {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Object path for a session photo.
///
/// The millisecond stamp makes repeated uploads of the same filename land on
/// distinct paths; callers keep stamps strictly increasing.
pub fn photo_object_path(
    prefix: &str,
    session_id: &str,
    kind: UploadKind,
    epoch_millis: i64,
    original_filename: &str,
) -> StorageResult<String> {
    if session_id.is_empty() || session_id.contains('/') {
        return Err(StorageError::InvalidKey(format!(
            "Invalid session id for object path: {:?}",
            session_id
        )));
    }

    let prefix = prefix.trim_matches('/');
    let name = sanitize_filename(original_filename);
    let key = if prefix.is_empty() {
        format!("{}/{}/{}_{}", session_id, kind.as_str(), epoch_millis, name)
    } else {
        format!(
            "{}/{}/{}/{}_{}",
            prefix,
            session_id,
            kind.as_str(),
            epoch_millis,
            name
        )
    };
    validate_key(&key)?;
    Ok(key)
}
