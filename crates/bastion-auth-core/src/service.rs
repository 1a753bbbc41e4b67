//! Auth service - ties together credential checks, login throttling and token issuance

use bastion_db::{CreatePrincipal, PrincipalRepository};
use bastion_types::{Principal, PrincipalId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    config::AuthConfig,
    password::{Argon2Hasher, SecretHasher},
    rate_limit::RateLimiter,
    token::{IssuedToken, TokenService},
    AuthError,
};

/// Plaintext hashed once at startup so unknown identities pay for a real verify
const DUMMY_SECRET: &str = "bastion-timing-equalisation";

/// Registration payload
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Login payload
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Token handed back after a successful registration or login
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Always `"Bearer"`
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl From<IssuedToken> for AuthResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_at: issued.expires_at,
        }
    }
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("access_token", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity recovered from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPrincipal {
    /// Email as stored at registration
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service
///
/// Provides unified interface for:
/// - Registration (hash, persist, issue)
/// - Login (throttle, verify credentials, issue)
/// - Bearer token verification
///
/// Login is throttled per normalized email before any credential check.
/// Registration is not throttled.
pub struct AuthService<R: PrincipalRepository, H: SecretHasher = Argon2Hasher> {
    config: AuthConfig,
    token_service: TokenService,
    rate_limiter: RateLimiter,
    hasher: H,
    repo: Arc<R>,
    dummy_hash: String,
}

impl<R: PrincipalRepository> AuthService<R> {
    /// Create a new auth service with Argon2id hashing and the system clock
    pub fn new(config: AuthConfig, repo: Arc<R>) -> Result<Self, AuthError> {
        Self::with_parts(config, repo, Argon2Hasher::default(), Arc::new(SystemClock))
    }
}

impl<R: PrincipalRepository, H: SecretHasher> AuthService<R, H> {
    /// Create an auth service from explicit collaborators
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] for an unusable secret or TTL.
    pub fn with_parts(
        config: AuthConfig,
        repo: Arc<R>,
        hasher: H,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let token_service = TokenService::new(
            config.token_secret.as_bytes(),
            config.token_ttl,
            Arc::clone(&clock),
        )?;
        let rate_limiter = RateLimiter::new(config.rate_limit, clock);
        let dummy_hash = hasher.hash(DUMMY_SECRET)?;

        Ok(Self {
            config,
            token_service,
            rate_limiter,
            hasher,
            repo,
            dummy_hash,
        })
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Register a new principal and issue its first token
    ///
    /// The store is written only after hashing and signing have succeeded,
    /// so a failed registration leaves it untouched.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_string();

        if self.repo.exists_by_email(&email).await? {
            tracing::debug!("Registration rejected, account exists");
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash(&request.password)?;

        let principal = Principal {
            id: PrincipalId::new(),
            email,
            name: request.name,
            role: request.role,
        };
        let issued = self.token_service.issue(&principal)?;

        // A concurrent registration can still win here; the store's
        // conflict maps to DuplicateAccount.
        self.repo
            .create(CreatePrincipal {
                id: principal.id.0,
                email: principal.email,
                name: principal.name,
                role: principal.role,
                password_hash,
            })
            .await?;

        tracing::info!("Registered principal {} ({})", principal.id, principal.role);
        Ok(issued.into())
    }

    /// Authenticate with email and password
    ///
    /// Unknown email, wrong password and an exhausted login bucket all
    /// surface as the same [`AuthError::AuthenticationFailed`].
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        self.rate_limiter.check(&request.email)?;

        let Some(row) = self.repo.find_by_email(&request.email).await? else {
            // Result ignored: only the cost of the verify matters
            let _ = self.hasher.verify(&self.dummy_hash, &request.password);
            tracing::debug!("Login failed: unknown identity");
            return Err(AuthError::invalid_credentials());
        };

        if !self.hasher.verify(&row.password_hash, &request.password)? {
            tracing::debug!("Login failed for principal {}: wrong password", row.id);
            return Err(AuthError::invalid_credentials());
        }

        let issued = self.token_service.issue(&row.principal())?;

        tracing::info!("Principal {} logged in", row.id);
        Ok(issued.into())
    }

    // =========================================================================
    // Token Verification
    // =========================================================================

    /// Verify a bearer token and return the identity it carries
    pub fn verify_bearer_token(&self, token: &str) -> Result<VerifiedPrincipal, AuthError> {
        let claims = self.token_service.verify(token)?;
        let expires_at = claims.expires_at().ok_or(AuthError::MalformedToken)?;

        Ok(VerifiedPrincipal {
            email: claims.sub,
            role: claims.role,
            expires_at,
        })
    }

    /// Verify an `Authorization` header value of the form `Bearer <token>`
    pub fn verify_authorization_header(
        &self,
        header: &str,
    ) -> Result<VerifiedPrincipal, AuthError> {
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedToken)?;

        self.verify_bearer_token(token)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get token service
    pub fn token_service(&self) -> &TokenService {
        &self.token_service
    }

    /// Get login rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Get principal repository
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }
}
