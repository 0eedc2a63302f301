//! Input validation utilities for rig
//!
//! Reusable field validators for the `validator` derive and a flattened,
//! human readable list of field errors.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Maximum length for a lock key
pub const MAX_LOCK_KEY_LENGTH: usize = 512;

/// Validate lock key format
///
/// Lock key must:
/// - Not be empty
/// - Not exceed MAX_LOCK_KEY_LENGTH bytes
/// - Not contain whitespace or control characters
pub fn validate_lock_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::new("lock_key_empty").with_message("must not be empty".into()));
    }
    if key.len() > MAX_LOCK_KEY_LENGTH {
        return Err(ValidationError::new("lock_key_too_long")
            .with_message(format!("must not exceed {} bytes", MAX_LOCK_KEY_LENGTH).into()));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::new("lock_key_invalid_chars")
            .with_message("must not contain whitespace or control characters".into()));
    }
    Ok(())
}

/// Validate that a duration is strictly positive
pub fn validate_positive_duration(duration: &Duration) -> Result<(), ValidationError> {
    if duration.is_zero() {
        return Err(ValidationError::new("duration_not_positive")
            .with_message("must be greater than zero".into()));
    }
    Ok(())
}

/// Validate port number
pub fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::new("port_invalid").with_message("must not be zero".into()));
    }
    Ok(())
}

/// Validate an HTTP endpoint path such as `/health`
pub fn validate_endpoint_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') {
        return Err(ValidationError::new("path_not_absolute")
            .with_message("must start with '/'".into()));
    }
    if path.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("path_invalid_chars")
            .with_message("must not contain whitespace".into()));
    }
    Ok(())
}

/// Field name to message map, rendered as `field: message` lines sorted by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn collect(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let name = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{}.{}", prefix, field)
            };
            match kind {
                ValidationErrorsKind::Field(list) => {
                    if let Some(first) = list.first() {
                        self.insert(name, message_of(first));
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect(&name, inner),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.collect(&format!("{}[{}]", name, index), inner);
                    }
                }
            }
        }
    }
}

impl From<&ValidationErrors> for FieldErrors {
    fn from(errors: &ValidationErrors) -> Self {
        let mut fields = FieldErrors::default();
        fields.collect("", errors);
        fields
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        FieldErrors::from(&errors)
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Validate a struct, returning its failures as `FieldErrors`.
pub fn validate<T: Validate>(value: &T) -> Result<(), FieldErrors> {
    value.validate().map_err(FieldErrors::from)
}

fn message_of(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => error.code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Endpoint {
        #[validate(custom(function = "validate_endpoint_path"))]
        path: String,
        #[validate(range(min = 1, message = "must not be zero"))]
        port: u16,
    }

    #[derive(Validate)]
    struct Server {
        #[validate(nested)]
        health: Endpoint,
        #[validate(custom(function = "validate_positive_duration"))]
        timeout: Duration,
    }

    #[test]
    fn test_validate_lock_key() {
        assert!(validate_lock_key("orders:42").is_ok());
        assert!(validate_lock_key("").is_err());
        assert!(validate_lock_key("with space").is_err());
        assert!(validate_lock_key(&"k".repeat(MAX_LOCK_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_positive_duration() {
        assert!(validate_positive_duration(&Duration::from_millis(1)).is_ok());
        assert!(validate_positive_duration(&Duration::ZERO).is_err());
    }

    #[test]
    fn test_validate_port_and_path() {
        assert!(validate_port(8080).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_endpoint_path("/health").is_ok());
        assert!(validate_endpoint_path("health").is_err());
    }

    #[test]
    fn test_field_errors_flatten_nested() {
        let server = Server {
            health: Endpoint {
                path: "health".to_string(),
                port: 0,
            },
            timeout: Duration::ZERO,
        };

        let errors = validate(&server).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("health.path"), Some("must start with '/'"));
        assert_eq!(errors.get("health.port"), Some("must not be zero"));
        assert_eq!(errors.get("timeout"), Some("must be greater than zero"));
    }

    #[test]
    fn test_field_errors_display_is_sorted() {
        let mut errors = FieldErrors::default();
        errors.insert("b", "second");
        errors.insert("a", "first");
        assert_eq!(errors.to_string(), "a: first; b: second");
    }

    #[test]
    fn test_valid_struct_passes() {
        let server = Server {
            health: Endpoint {
                path: "/health".to_string(),
                port: 8081,
            },
            timeout: Duration::from_secs(1),
        };
        assert!(validate(&server).is_ok());
    }
}
