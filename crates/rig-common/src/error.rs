//! Error types for rig
//!
//! `RigError` covers configuration and validation failures shared by the
//! workspace. Lock operations have their own error type in rig-locker.

use crate::validation::FieldErrors;

/// Workspace-wide error types
#[derive(thiserror::Error, Debug)]
pub enum RigError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<FieldErrors> for RigError {
    fn from(value: FieldErrors) -> Self {
        RigError::Validation(value)
    }
}
