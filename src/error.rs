//! Error types for bitempo.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the failure class. A `get` that finds nothing is not an error; it is
//! reported as `Ok(None)`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised before anything reaches the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// An entity id was empty or whitespace.
    #[error("Entity id cannot be empty")]
    EmptyEntityId,

    /// A range whose start is not before its end.
    #[error("Invalid time range: from ({from}) must be before to ({to})")]
    InvalidTimeRange {
        /// Requested start.
        from: DateTime<Utc>,
        /// Requested end.
        to: DateTime<Utc>,
    },

    /// An attribute used one of the reserved control field names.
    #[error("Attribute name '{name}' is reserved")]
    ReservedAttribute {
        /// Offending name.
        name: String,
    },

    /// An attribute name was empty.
    #[error("Attribute name cannot be empty")]
    EmptyAttributeName,

    /// A float attribute was NaN or infinite.
    #[error("Attribute '{name}' holds a non-finite float")]
    NonFiniteValue {
        /// Attribute holding the value.
        name: String,
    },

    /// `history_limit` was zero.
    #[error("History limit must be at least 1 (got {limit})")]
    InvalidHistoryLimit {
        /// Rejected limit.
        limit: usize,
    },
}

/// Top-level error type for bitempo.
#[derive(Debug, Error)]
pub enum BitempoError {
    /// Input rejected before reaching the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure reported by the backing store, passed through unmodified.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl BitempoError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call might succeed.
    ///
    /// The engine itself never retries; this is a hint for callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Storage(e) => matches!(e, StorageError::Io(_) | StorageError::Locked(_)),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for bitempo operations.
pub type BitempoResult<T> = Result<T, BitempoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_time_range() {
        let now = Utc::now();
        let later = now + chrono::Duration::hours(1);
        let err = ValidationError::InvalidTimeRange { from: later, to: now };
        assert!(err.to_string().contains("Invalid time range"));
    }

    #[test]
    fn test_validation_error_reserved_attribute() {
        let err = ValidationError::ReservedAttribute {
            name: "known-at".to_string(),
        };
        assert!(err.to_string().contains("known-at"));
    }

    #[test]
    fn test_error_from_validation() {
        let err: BitempoError = ValidationError::EmptyEntityId.into();
        assert!(err.is_validation());
        assert!(!err.is_storage());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_from_storage_is_passed_through() {
        let err: BitempoError = StorageError::Backend("connection refused".to_string()).into();
        assert!(err.is_storage());
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_retryable() {
        let io: BitempoError = StorageError::Io("disk full".to_string()).into();
        assert!(io.is_retryable());

        let locked: BitempoError = StorageError::Locked("held elsewhere".to_string()).into();
        assert!(locked.is_retryable());

        let ser: BitempoError = StorageError::Serialization("bad record".to_string()).into();
        assert!(!ser.is_retryable());
    }

    #[test]
    fn test_error_internal() {
        let err = BitempoError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(err.to_string().contains("unexpected state"));
    }
}
