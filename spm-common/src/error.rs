//! Common error types for SPM

use thiserror::Error;
use uuid::Uuid;

/// Common result type for SPM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across SPM services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of persisted session payloads
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write would collide with an existing record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload session has already left `pending_review`
    #[error("Upload session {0} is not pending review")]
    NotPendingReview(Uuid),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
