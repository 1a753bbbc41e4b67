//! Instrumented collaborators for side-effect assertions

#![allow(dead_code)]

use async_trait::async_trait;
use bastion_auth_core::{Argon2Hasher, AuthError, SecretHasher};
use bastion_db::{
    CreatePrincipal, DbResult, MemoryPrincipalRepository, PrincipalRepository, PrincipalRow,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Wraps the in-memory store and counts every write attempt
#[derive(Default)]
pub struct CountingRepository {
    inner: MemoryPrincipalRepository,
    creates: AtomicUsize,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create` calls that reached the store
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl PrincipalRepository for CountingRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<PrincipalRow>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<PrincipalRow>> {
        self.inner.find_by_email(email).await
    }

    async fn create(&self, principal: CreatePrincipal) -> DbResult<PrincipalRow> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(principal).await
    }
}

/// Hasher that refuses one specific secret
pub struct FailingHasher {
    inner: Argon2Hasher,
    poison: &'static str,
}

impl FailingHasher {
    pub fn new(poison: &'static str) -> Self {
        Self {
            inner: super::fast_hasher(),
            poison,
        }
    }
}

impl SecretHasher for FailingHasher {
    fn hash(&self, secret: &str) -> Result<String, AuthError> {
        if secret == self.poison {
            return Err(AuthError::Internal("hasher unavailable".to_string()));
        }
        self.inner.hash(secret)
    }

    fn verify(&self, hash: &str, secret: &str) -> Result<bool, AuthError> {
        self.inner.verify(hash, secret)
    }
}
