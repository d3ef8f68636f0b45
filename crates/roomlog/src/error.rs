use std::io;
use thiserror::Error;

/// Result type for room log operations
pub type RoomResult<T> = Result<T, RoomError>;

/// Errors that can occur in room log operations
#[derive(Error, Debug)]
pub enum RoomError {
    /// Unknown slug or document key
    #[error("not found: {key}")]
    NotFound { key: String },

    /// Slug already registered
    #[error("slug already registered: {slug}")]
    Conflict { slug: String },

    /// Rejected before any durable mutation
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    /// Durability-layer I/O or (de)serialization failure
    #[error("store error: {0}")]
    Store(#[from] io::Error),
}

impl RoomError {
    pub fn not_found(key: impl Into<String>) -> Self {
        RoomError::NotFound { key: key.into() }
    }

    pub fn conflict(slug: impl Into<String>) -> Self {
        RoomError::Conflict { slug: slug.into() }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        RoomError::Validation {
            reason: reason.into(),
        }
    }

    /// Fold a serialization failure into the store error class.
    pub(crate) fn store_serde(err: serde_json::Error) -> Self {
        RoomError::Store(io::Error::new(io::ErrorKind::InvalidData, err))
    }
}
