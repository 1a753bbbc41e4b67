//! Principal row models

use bastion_types::{Principal, PrincipalId, Role};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Principal row as held by the store.
///
/// `password_hash` is a PHC-format hash; plaintext never reaches the store.
#[derive(Debug, Clone)]
pub struct PrincipalRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrincipalRow {
    /// Get the principal ID
    pub fn principal_id(&self) -> PrincipalId {
        PrincipalId(self.id)
    }

    /// Project the row onto the public principal (drops the hash)
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.principal_id(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}
