//! Identity token signing and verification
//!
//! Tokens are `base64url(claims_json).base64url(hmac_sha256(payload_segment))`.
//! They are never stored; every use re-checks the signature and expiry.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bastion_types::{identities_match, Principal, Role};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::crypto::{constant_time_eq, HmacKey};
use crate::{AuthConfig, AuthError};

/// Claims carried inside a signed token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (principal email, as stored)
    pub sub: String,
    /// Principal role
    pub role: Role,
    /// Issue timestamp (nanoseconds since the Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (nanoseconds since the Unix epoch)
    pub exp: i64,
}

impl TokenClaims {
    /// A token is valid only while `now < exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expires_at| now >= expires_at)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        from_timestamp_nanos(self.iat)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        from_timestamp_nanos(self.exp)
    }
}

fn from_timestamp_nanos(nanos: i64) -> Option<DateTime<Utc>> {
    const NANOS_PER_SEC: i64 = 1_000_000_000;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    DateTime::from_timestamp(nanos.div_euclid(NANOS_PER_SEC), subsec)
}

/// A freshly minted token together with its claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies identity tokens.
///
/// Holds only immutable key material and configuration, so a single instance
/// can be shared across any number of concurrent callers.
#[derive(Clone)]
pub struct TokenService {
    hmac_key: HmacKey,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the secret is shorter than 32
    /// bytes, the TTL is zero, or an expiry `ttl` from now cannot be encoded.
    pub fn new(
        secret: impl AsRef<[u8]>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let hmac_key =
            HmacKey::new(secret).map_err(|e| AuthError::Configuration(e.to_string()))?;

        let ttl = ChronoDuration::from_std(ttl)
            .ok()
            .filter(|ttl| *ttl > ChronoDuration::zero())
            .ok_or_else(|| AuthError::Configuration("token TTL out of range".to_string()))?;

        // Claims carry nanosecond timestamps, which end in 2262
        clock
            .now()
            .checked_add_signed(ttl)
            .and_then(|expires_at| expires_at.timestamp_nanos_opt())
            .ok_or_else(|| AuthError::Configuration("token TTL out of range".to_string()))?;

        Ok(Self {
            hmac_key,
            ttl,
            clock,
        })
    }

    /// Create a token service from config, using the system clock
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(
            config.token_secret.as_bytes(),
            config.token_ttl,
            Arc::new(SystemClock),
        )
    }

    /// Token lifetime
    pub fn ttl(&self) -> ChronoDuration {
        self.ttl
    }

    /// Mint a token for a principal.
    ///
    /// Only fails on an internal fault: claims that cannot be serialized, or
    /// a clock so far ahead that the expiry cannot be encoded.
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, AuthError> {
        let now = self.clock.now();
        let (iat, exp, expires_at) = now
            .checked_add_signed(self.ttl)
            .and_then(|expires_at| {
                Some((
                    now.timestamp_nanos_opt()?,
                    expires_at.timestamp_nanos_opt()?,
                    expires_at,
                ))
            })
            .ok_or_else(|| {
                tracing::error!("Token expiry out of range at {}", now);
                AuthError::Internal("Failed to issue token".to_string())
            })?;

        let claims = TokenClaims {
            sub: principal.email.clone(),
            role: principal.role,
            iat,
            exp,
        };

        let token = self.sign_claims(&claims)?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Verify a token and return its claims.
    ///
    /// The signature is checked before the payload is decoded. Errors are
    /// distinct per failure:
    /// - [`AuthError::MalformedToken`]: not exactly two non-empty segments,
    ///   or a signed payload that is not valid claims
    /// - [`AuthError::InvalidSignature`]: signature does not match the payload
    /// - [`AuthError::TokenExpired`]: `now >= exp`
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let (payload_b64, signature) = token.split_once('.').ok_or_else(|| {
            tracing::debug!("Token has no signature separator");
            AuthError::MalformedToken
        })?;

        if payload_b64.is_empty() || signature.is_empty() || signature.contains('.') {
            tracing::debug!("Token has empty or extra segments");
            return Err(AuthError::MalformedToken);
        }

        // Compare the encoded signature so any change to the segment is caught,
        // including non-canonical base64 that would decode to the same bytes
        let expected_sig = self.compute_signature(payload_b64);
        if !constant_time_eq(signature.as_bytes(), expected_sig.as_bytes()) {
            tracing::debug!("Token signature mismatch");
            return Err(AuthError::InvalidSignature);
        }

        let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|e| {
            tracing::debug!("Token payload is not base64url: {}", e);
            AuthError::MalformedToken
        })?;

        let claims: TokenClaims = serde_json::from_slice(&payload_json).map_err(|e| {
            tracing::debug!("Token payload is not valid claims: {}", e);
            AuthError::MalformedToken
        })?;

        if claims.is_expired_at(self.clock.now()) {
            tracing::debug!("Token expired");
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    /// Extract the subject of a valid token
    pub fn subject_of(&self, token: &str) -> Result<String, AuthError> {
        self.verify(token).map(|claims| claims.sub)
    }

    /// Whether the token is valid and belongs to `expected_identity`
    /// (case-insensitive). Every failure collapses to `false`; use
    /// [`TokenService::verify`] for the specific kind.
    pub fn is_valid(&self, token: &str, expected_identity: &str) -> bool {
        self.verify(token)
            .map(|claims| identities_match(&claims.sub, expected_identity))
            .unwrap_or(false)
    }

    fn sign_claims(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let payload_json = serde_json::to_vec(claims).map_err(|e| {
            tracing::error!("Failed to serialize token claims: {}", e);
            AuthError::Internal("Failed to issue token".to_string())
        })?;

        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);
        let signature = self.compute_signature(&payload_b64);

        Ok(format!("{payload_b64}.{signature}"))
    }

    /// Compute HMAC-SHA256 signature
    fn compute_signature(&self, data: &str) -> String {
        let signature = self.hmac_key.sign(data.as_bytes());
        URL_SAFE_NO_PAD.encode(signature)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
