//! Validation functions for configuration values.
//!
//! Provides custom validation functions for file names and directories used
//! by the configuration model.

use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

pub fn validate_valid_file_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.is_empty() {
        return Err(ValidationError::new("InvalidFileName")
            .with_message("File name must not be empty".into()));
    }

    if !is_sanitized(name) {
        return Err(ValidationError::new("InvalidFileName").with_message(
            format!(
                "Invalid file name {:?}, try sanitizing like {:?}",
                name,
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access directory {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}
