//! Application-level errors

use domain::DomainError;
use thiserror::Error;

use crate::ports::{CalendarSourceError, StorageError};

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An event the cache expected to hold is missing
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// The storage rolled back the transaction; the whole cycle may be retried
    #[error("Transient storage conflict: {0}")]
    TransientStorageConflict(String),

    /// Any other persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Failure reported by the external calendar source
    #[error("External source error: {0}")]
    ExternalSource(#[from] CalendarSourceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStorageConflict(_))
    }
}

impl From<StorageError> for ApplicationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(msg) => Self::TransientStorageConflict(msg),
            StorageError::NotFound { entity_type, id } => Self::NotFound {
                entity_type: entity_type.to_string(),
                id,
            },
            StorageError::Domain(e) => Self::Domain(e),
            other => Self::Storage(other.to_string()),
        }
    }
}
