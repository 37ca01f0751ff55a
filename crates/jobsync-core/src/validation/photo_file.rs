/// Reasons a selected file is refused before it reaches an upload queue.
///
/// The messages are shown to the technician as-is, one per rejected file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhotoValidationError {
    #[error("{name} is too large. Max {max_mb}MB.")]
    FileTooLarge { name: String, size: u64, max_mb: u64 },

    #[error("{name} is an invalid file type. Images only.")]
    NotAnImage { name: String, content_type: String },

    #[error("{name} is empty.")]
    EmptyFile { name: String },
}

/// What the validator needs to know about a selected file.
#[derive(Debug, Clone, Copy)]
pub struct PhotoFileInfo<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub size: u64,
}

/// Photo file validator
///
/// Checks size and MIME type only; the bytes are never decoded.
#[derive(Debug, Clone)]
pub struct PhotoValidator {
    max_file_size: u64,
}

impl PhotoValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, name: &str, size: u64) -> Result<(), PhotoValidationError> {
        if size == 0 {
            return Err(PhotoValidationError::EmptyFile {
                name: name.to_string(),
            });
        }

        if size > self.max_file_size {
            return Err(PhotoValidationError::FileTooLarge {
                name: name.to_string(),
                size,
                max_mb: self.max_file_size / (1024 * 1024),
            });
        }

        Ok(())
    }

    /// Any `image/*` MIME type is accepted.
    pub fn validate_content_type(
        &self,
        name: &str,
        content_type: &str,
    ) -> Result<(), PhotoValidationError> {
        let normalized = content_type.trim().to_ascii_lowercase();
        if !normalized.starts_with("image/") {
            return Err(PhotoValidationError::NotAnImage {
                name: name.to_string(),
                content_type: content_type.to_string(),
            });
        }
        Ok(())
    }

    pub fn validate(&self, file: PhotoFileInfo<'_>) -> Result<(), PhotoValidationError> {
        self.validate_file_size(file.name, file.size)?;
        self.validate_content_type(file.name, file.content_type)?;
        Ok(())
    }
}
