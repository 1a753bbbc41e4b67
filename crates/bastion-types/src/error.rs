//! Common error types

use thiserror::Error;

/// Errors raised while parsing shared domain types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    /// Role tag outside the closed set
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Principal ID that is not a UUID
    #[error("invalid principal id: {0}")]
    InvalidPrincipalId(String),
}
