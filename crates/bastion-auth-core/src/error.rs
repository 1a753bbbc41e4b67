//! Auth errors

use thiserror::Error;

/// Why a login attempt was refused.
///
/// Kept for logging and tests only: both reasons surface to callers as the
/// same [`AuthError::AuthenticationFailed`] message, code and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    /// Unknown identity or wrong secret
    InvalidCredentials,
    /// The identity's login bucket is empty
    RateLimited,
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::RateLimited => write!(f, "rate limited"),
        }
    }
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token structure or payload cannot be parsed
    #[error("malformed token")]
    MalformedToken,

    /// Token signature does not match its payload
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// Login refused (wrong credentials or rate limited; deliberately indistinguishable)
    #[error("authentication failed")]
    AuthenticationFailed(LoginFailure),

    /// Identity already registered
    #[error("account already exists")]
    DuplicateAccount,

    /// Principal store error
    #[error("database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub const fn invalid_credentials() -> Self {
        Self::AuthenticationFailed(LoginFailure::InvalidCredentials)
    }

    pub const fn rate_limited() -> Self {
        Self::AuthenticationFailed(LoginFailure::RateLimited)
    }

    /// The internal reason behind a login failure, if this is one
    pub fn login_failure(&self) -> Option<LoginFailure> {
        match self {
            Self::AuthenticationFailed(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Whether this error came from token verification
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken | Self::InvalidSignature | Self::TokenExpired
        )
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedToken
            | Self::InvalidSignature
            | Self::TokenExpired
            | Self::AuthenticationFailed(_) => 401,
            Self::DuplicateAccount => 409,
            Self::Database(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::DuplicateAccount => "DUPLICATE_ACCOUNT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<bastion_db::DbError> for AuthError {
    fn from(err: bastion_db::DbError) -> Self {
        match err {
            bastion_db::DbError::Conflict(_) => Self::DuplicateAccount,
            other => {
                tracing::error!("Database error: {}", other);
                Self::Database(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failures_are_indistinguishable_to_callers() {
        let wrong_password = AuthError::invalid_credentials();
        let throttled = AuthError::rate_limited();

        assert_eq!(wrong_password.to_string(), throttled.to_string());
        assert_eq!(wrong_password.to_string(), "authentication failed");
        assert_eq!(wrong_password.error_code(), throttled.error_code());
        assert_eq!(wrong_password.status_code(), throttled.status_code());

        assert_eq!(
            wrong_password.login_failure(),
            Some(LoginFailure::InvalidCredentials)
        );
        assert_eq!(throttled.login_failure(), Some(LoginFailure::RateLimited));
    }

    #[test]
    fn test_token_errors_are_distinct() {
        let kinds = [
            AuthError::MalformedToken,
            AuthError::InvalidSignature,
            AuthError::TokenExpired,
        ];
        for kind in &kinds {
            assert!(kind.is_token_error());
            assert_eq!(kind.status_code(), 401);
        }
        assert_ne!(kinds[0].error_code(), kinds[1].error_code());
        assert_ne!(kinds[1].error_code(), kinds[2].error_code());
        assert!(!AuthError::DuplicateAccount.is_token_error());
    }

    #[test]
    fn test_db_conflict_maps_to_duplicate_account() {
        let err: AuthError = bastion_db::DbError::Conflict("taken".to_string()).into();
        assert!(matches!(err, AuthError::DuplicateAccount));
        assert_eq!(err.status_code(), 409);

        let err: AuthError = bastion_db::DbError::Unavailable("down".to_string()).into();
        assert!(matches!(err, AuthError::Database(_)));
        assert_eq!(err.status_code(), 500);
    }
}
