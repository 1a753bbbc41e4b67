//! Bastion Auth Core - Authentication business logic
//!
//! Core authentication functionality including signed identity tokens,
//! per-identity login throttling, and register/login flows over a
//! pluggable principal store.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, ConfigError, RateLimitConfig};
pub use error::*;
pub use password::{Argon2Hasher, SecretHasher};
pub use rate_limit::{Bucket, RateLimiter};
pub use service::*;
pub use token::{IssuedToken, TokenClaims, TokenService};
