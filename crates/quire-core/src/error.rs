//! Error types for quire.

use thiserror::Error;

/// Result type alias using quire's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quire operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Input rejected before any mutation began
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness or merge collision; surfaced for the caller to resolve
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found (missing, owned by someone else, or soft-deleted)
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Tag not found (missing or owned by someone else)
    #[error("Tag not found: {0}")]
    TagNotFound(uuid::Uuid),

    /// Stored state broke an invariant (negative usage count, orphan association)
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Operation cancelled by the caller or by its deadline
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors the caller may fix and retry (validation, conflict, not found).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Conflict(_)
                | Error::NotFound(_)
                | Error::NoteNotFound(_)
                | Error::TagNotFound(_)
        )
    }

    /// True for any of the not-found variants.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::NoteNotFound(_) | Error::TagNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
