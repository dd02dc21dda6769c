use std::path::{Component, Path};
use thiserror::Error;

/// Longest file name most filesystems accept, in bytes
pub const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Checks that an uploaded file name can be used verbatim as a single entry
/// inside the upload directory. The name is never rewritten.
pub fn validate_file_name(name: &str) -> Result<&str, ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "file name cannot be empty",
        ));
    }

    if name.len() > MAX_FILE_NAME_LEN {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            format!("file name longer than {} bytes", MAX_FILE_NAME_LEN),
        ));
    }

    if name.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        tracing::warn!("Rejected file name with separator or control character: {:?}", name);
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            format!("invalid file name: {:?}", name),
        ));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => {
            tracing::warn!("Path traversal attempt detected: {:?}", name);
            Err(ValidationError::new(
                "INVALID_FILENAME",
                format!("invalid file name: {:?}", name),
            ))
        }
    }
}

/// Printer names end up as a process argument, so only plain queue names pass.
pub fn validate_printer_name(name: &str) -> Result<&str, ValidationError> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));

    if valid {
        Ok(name)
    } else {
        Err(ValidationError::new(
            "INVALID_PRINTER",
            format!("invalid printer name: {:?}", name),
        ))
    }
}
