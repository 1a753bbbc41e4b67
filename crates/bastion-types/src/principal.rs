//! Principal types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Role, TypesError};

/// Unique principal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    /// Create a new random principal ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a principal ID from a string
    pub fn parse(s: &str) -> Result<Self, TypesError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypesError::InvalidPrincipalId(s.to_string()))
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// An authenticated identity with a role tag.
///
/// `email` keeps the casing it was registered with; lookups and comparisons
/// go through [`normalize_identity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl Principal {
    /// Normalized identity used as lookup and rate-limit key
    pub fn identity_key(&self) -> String {
        normalize_identity(&self.email)
    }

    /// Case-insensitive identity comparison
    pub fn matches_identity(&self, identity: &str) -> bool {
        identities_match(&self.email, identity)
    }
}

/// Normalize an identity (email) for lookups: trimmed and lower-cased.
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Compare two identities the way they are stored (case-insensitive).
pub fn identities_match(a: &str, b: &str) -> bool {
    normalize_identity(a) == normalize_identity(b)
}
