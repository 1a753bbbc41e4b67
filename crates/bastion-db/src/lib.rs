//! Bastion DB - Principal store abstractions
//!
//! Repository interface the authentication core reads principals through,
//! plus an in-memory implementation for embedding and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use bastion_db::{MemoryPrincipalRepository, PrincipalRepository};
//!
//! let repo = MemoryPrincipalRepository::new();
//! let principal = repo.find_by_email("user@example.com").await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod repo;

pub use error::{DbError, DbResult};
pub use memory::MemoryPrincipalRepository;
pub use models::*;
pub use repo::*;
