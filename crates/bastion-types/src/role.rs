//! Role tags

use serde::{Deserialize, Deserializer, Serialize};

use crate::TypesError;

/// Closed set of roles a principal can hold
///
/// Serialized upper-case; deserialized through [`FromStr`](std::str::FromStr),
/// so any casing is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Regular account
    #[default]
    User,
}

impl Role {
    /// All roles, in privilege order (highest first)
    pub const ALL: [Role; 2] = [Role::Admin, Role::User];

    /// Canonical upper-case tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            _ => Err(TypesError::InvalidRole(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}
