//! In-memory principal repository

use async_trait::async_trait;
use bastion_types::normalize_identity;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::PrincipalRow;
use crate::repo::{CreatePrincipal, PrincipalRepository};

/// In-memory principal repository
///
/// Rows are keyed by ID with a secondary index on the normalized email.
/// Cloning shares the underlying maps.
#[derive(Default, Clone)]
pub struct MemoryPrincipalRepository {
    principals: Arc<DashMap<Uuid, PrincipalRow>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryPrincipalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored principals
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl PrincipalRepository for MemoryPrincipalRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PrincipalRow>> {
        Ok(self.principals.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<PrincipalRow>> {
        Ok(self
            .by_email
            .get(&normalize_identity(email))
            .and_then(|id| self.principals.get(id.value()).map(|r| r.value().clone())))
    }

    async fn create(&self, principal: CreatePrincipal) -> DbResult<PrincipalRow> {
        let key = normalize_identity(&principal.email);

        // The email index entry is the uniqueness guard; holding it makes
        // check-and-insert atomic per email.
        match self.by_email.entry(key) {
            Entry::Occupied(entry) => {
                tracing::debug!("Principal already exists: {}", entry.key());
                Err(DbError::Conflict(format!(
                    "email already registered: {}",
                    entry.key()
                )))
            }
            Entry::Vacant(entry) => {
                let now = Utc::now();
                let row = PrincipalRow {
                    id: principal.id,
                    email: principal.email.trim().to_string(),
                    name: principal.name,
                    role: principal.role,
                    password_hash: principal.password_hash,
                    created_at: now,
                    updated_at: now,
                };
                self.principals.insert(row.id, row.clone());
                entry.insert(row.id);
                Ok(row)
            }
        }
    }
}
