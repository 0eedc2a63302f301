//! Rig Common - Shared error and validation types
//!
//! This crate provides the foundational types used across all rig components:
//! - `RigError` for configuration and validation failures
//! - Reusable field validators and a readable field error list

pub mod error;
pub mod validation;

// Re-exports for convenience
pub use error::RigError;
pub use validation::{FieldErrors, validate};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "RIG";

/// Default configuration file location
pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
