//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Unique constraint violated (e.g. email already registered)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Backing store failed or is unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for repository operations
pub type DbResult<T> = Result<T, DbError>;
