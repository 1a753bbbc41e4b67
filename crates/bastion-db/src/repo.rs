//! Repository traits
//!
//! Async repository interface for principal lookups and creation.

use async_trait::async_trait;
use bastion_types::Role;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::PrincipalRow;

/// Principal repository trait
///
/// Email lookups are case-insensitive; implementations must reject a second
/// principal whose email differs only in case with [`DbError::Conflict`].
///
/// [`DbError::Conflict`]: crate::DbError::Conflict
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Find a principal by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PrincipalRow>>;

    /// Find a principal by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> DbResult<Option<PrincipalRow>>;

    /// Check whether an email is already registered (case-insensitive)
    async fn exists_by_email(&self, email: &str) -> DbResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Create a new principal
    async fn create(&self, principal: CreatePrincipal) -> DbResult<PrincipalRow>;
}

/// Create principal input
#[derive(Debug, Clone)]
pub struct CreatePrincipal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}
