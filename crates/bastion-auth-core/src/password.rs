//! Password hashing
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$...`); the parameters
//! travel inside the hash, so verification works across parameter changes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::AuthError;

/// One-way hashing of login secrets
pub trait SecretHasher: Send + Sync {
    /// Hash a plaintext secret with a fresh salt
    fn hash(&self, secret: &str) -> Result<String, AuthError>;

    /// Check a plaintext secret against a stored hash.
    ///
    /// A mismatch is `Ok(false)`; a stored hash that cannot be parsed is an
    /// internal error.
    fn verify(&self, hash: &str, secret: &str) -> Result<bool, AuthError>;
}

/// Argon2id hasher
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }
}

impl Argon2Hasher {
    /// Hasher with explicit cost parameters
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if argon2 rejects the parameters.
    pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, AuthError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| AuthError::Configuration(format!("invalid argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl SecretHasher for Argon2Hasher {
    fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {}", e);
                AuthError::Internal(format!("failed to hash password: {e}"))
            })?;

        Ok(hash.to_string())
    }

    fn verify(&self, hash: &str, secret: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::error!("Stored password hash is invalid: {}", e);
            AuthError::Internal(format!("invalid password hash: {e}"))
        })?;

        Ok(self
            .argon2
            .verify_password(secret.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::with_params(Params::MIN_M_COST, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("hunter22").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(&hash, "hunter22").unwrap());
        assert!(!hasher.verify(&hash, "hunter23").unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let hasher = fast_hasher();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_across_params() {
        let hash = fast_hasher().hash("secret").unwrap();
        assert!(Argon2Hasher::with_params(Params::MIN_M_COST, 2, 1)
            .unwrap()
            .verify(&hash, "secret")
            .unwrap());
    }

    #[test]
    fn test_malformed_hash_is_internal_error() {
        let result = fast_hasher().verify("not-a-phc-string", "secret");
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            Argon2Hasher::with_params(0, 0, 0),
            Err(AuthError::Configuration(_))
        ));
    }
}
