//! Common test utilities for bastion-auth-core integration tests

pub mod counting_repo;

use bastion_auth_core::{Argon2Hasher, AuthConfig, AuthService, ManualClock};
use bastion_db::MemoryPrincipalRepository;
use std::sync::Arc;

#[allow(unused_imports)]
pub use counting_repo::{CountingRepository, FailingHasher};

/// Signing secret used across integration tests
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Route `tracing` output through `RUST_LOG` when a test wants it
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Argon2id with the smallest legal cost so tests stay fast
#[allow(dead_code)]
pub fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(argon2::Params::MIN_M_COST, 1, 1).unwrap()
}

/// Test config with default TTL and rate limits
#[allow(dead_code)]
pub fn test_config() -> AuthConfig {
    AuthConfig::try_new(TEST_SECRET).unwrap()
}

/// Service over a fresh in-memory store and a frozen clock
#[allow(dead_code)]
pub fn test_service() -> (
    AuthService<MemoryPrincipalRepository>,
    Arc<MemoryPrincipalRepository>,
    Arc<ManualClock>,
) {
    init_tracing();
    let repo = Arc::new(MemoryPrincipalRepository::new());
    let clock = Arc::new(ManualClock::starting_now());
    let service =
        AuthService::with_parts(test_config(), Arc::clone(&repo), fast_hasher(), clock.clone())
            .unwrap();
    (service, repo, clock)
}
