//! Lock error types

use rig_common::FieldErrors;

/// Failure reported by a backing store adapter.
///
/// Always an infrastructure problem, never contention: a held key is reported
/// through `AcquireOutcome::AlreadyHeld` / `ReleaseOutcome::NotOwned`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[cfg(feature = "redis-store")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("unexpected store reply: {0}")]
    UnexpectedReply(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Retry budget exhausted while another owner held the key.
    #[error("failed to obtain lock '{key}' after {attempts} attempts")]
    LockNotObtained { key: String, attempts: u32 },

    /// Release of a key that is absent or owned by another token.
    #[error("failed to unlock '{key}': not held by this owner")]
    NotLocked { key: String },

    #[error("lock store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("lock operation cancelled")]
    Cancelled,

    #[error("lock operation deadline exceeded")]
    DeadlineExceeded,
}

impl LockError {
    /// True for the expected outcome of a contended key.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::LockNotObtained { .. })
    }

    /// True when the backing store itself failed.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, LockError::Store(_))
    }

    /// True when the caller's cancellation token or deadline stopped the operation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, LockError::Cancelled | LockError::DeadlineExceeded)
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LockError::LockNotObtained { .. } => "not_obtained",
            LockError::NotLocked { .. } => "not_locked",
            LockError::Store(_) => "store_error",
            LockError::InvalidArgument(_) => "invalid_argument",
            LockError::Cancelled => "cancelled",
            LockError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl From<FieldErrors> for LockError {
    fn from(value: FieldErrors) -> Self {
        LockError::InvalidArgument(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
