//! Configuration types for the auth core

use std::time::Duration;

use crate::crypto::HmacKey;

/// Default token lifetime (24 hours)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default login bucket capacity
pub const DEFAULT_RATE_LIMIT_CAPACITY: u32 = 5;

/// Default window in which an empty bucket refills completely
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Login throttling configuration: `capacity` attempts, refilled
/// continuously over `refill_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    capacity: u32,
    refill_window: Duration,
}

impl RateLimitConfig {
    /// Create a rate limit config
    ///
    /// # Errors
    /// Returns error if capacity or refill window is zero.
    pub fn new(capacity: u32, refill_window: Duration) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Invalid("rate limit capacity must be positive"));
        }
        if refill_window.is_zero() {
            return Err(ConfigError::Invalid("rate limit window must be positive"));
        }
        Ok(Self {
            capacity,
            refill_window,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_window(&self) -> Duration {
        self.refill_window
    }

    /// Tokens restored per second
    pub fn refill_rate_per_sec(&self) -> f64 {
        f64::from(self.capacity) / self.refill_window.as_secs_f64()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RATE_LIMIT_CAPACITY,
            refill_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

/// Auth core configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for token signing (at least 32 bytes)
    pub token_secret: String,
    /// Token lifetime
    pub token_ttl: Duration,
    /// Login throttling
    pub rate_limit: RateLimitConfig,
}

impl AuthConfig {
    /// Create a new auth config with default TTL and rate limits
    ///
    /// # Errors
    /// Returns error if the secret is shorter than 32 bytes.
    pub fn try_new(token_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let token_secret = token_secret.into();
        if token_secret.len() < HmacKey::MIN_KEY_LENGTH {
            return Err(ConfigError::Invalid(
                "TOKEN_SECRET must be at least 32 bytes",
            ));
        }
        Ok(Self {
            token_secret,
            token_ttl: DEFAULT_TOKEN_TTL,
            rate_limit: RateLimitConfig::default(),
        })
    }

    /// Set token lifetime
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set login throttling
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Load configuration from the environment (and `.env`, if present)
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `TOKEN_SECRET` | required |
    /// | `TOKEN_TTL_HOURS` | 24 |
    /// | `LOGIN_RATE_LIMIT_CAPACITY` | 5 |
    /// | `LOGIN_RATE_LIMIT_WINDOW_SECS` | 60 |
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token_secret = lookup("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?;

        let ttl_hours: u64 = lookup("TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "24".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("TOKEN_TTL_HOURS"))?;
        let ttl_secs = ttl_hours
            .checked_mul(3600)
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::Invalid("TOKEN_TTL_HOURS"))?;

        let capacity: u32 = lookup("LOGIN_RATE_LIMIT_CAPACITY")
            .unwrap_or_else(|| DEFAULT_RATE_LIMIT_CAPACITY.to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("LOGIN_RATE_LIMIT_CAPACITY"))?;

        let window_secs: u64 = lookup("LOGIN_RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|| DEFAULT_RATE_LIMIT_WINDOW.as_secs().to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("LOGIN_RATE_LIMIT_WINDOW_SECS"))?;

        let rate_limit = RateLimitConfig::new(capacity, Duration::from_secs(window_secs))?;

        Ok(Self::try_new(token_secret)?
            .with_token_ttl(Duration::from_secs(ttl_secs))
            .with_rate_limit(rate_limit))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_ttl", &self.token_ttl)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

/// Load `.env` into the process environment, ignoring a missing file
pub fn load_env() {
    dotenvy::dotenv().ok();
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value: {0}")]
    Invalid(&'static str),
}
