//! Per-key login throttling with token buckets.
//!
//! Each normalized key owns exactly one [`Bucket`] for the lifetime of the
//! [`RateLimiter`]. A bucket starts full, refills continuously at
//! `capacity / refill_window`, and every refill-then-consume step runs under
//! the bucket's own mutex.

use bastion_types::normalize_identity;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use crate::AuthError;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Token bucket for a single key
#[derive(Debug)]
pub struct Bucket {
    key: String,
    capacity: f64,
    refill_window_secs: f64,
    state: Mutex<BucketState>,
}

impl Bucket {
    fn new(key: String, config: &RateLimitConfig, now: DateTime<Utc>) -> Self {
        let capacity = f64::from(config.capacity());
        Self {
            key,
            capacity,
            refill_window_secs: config.refill_window().as_secs_f64(),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Normalized key this bucket throttles
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens restored per second
    pub fn refill_rate(&self) -> f64 {
        self.capacity / self.refill_window_secs
    }

    /// Current token count without applying a refill
    pub fn available_tokens(&self) -> f64 {
        self.lock().tokens
    }

    /// Timestamp of the last refill
    pub fn last_refill(&self) -> DateTime<Utc> {
        self.lock().last_refill
    }

    /// Refill up to `now`, then take `n` tokens if at least `n` are available.
    ///
    /// Returns `false` and leaves the count untouched otherwise. Never waits.
    pub fn try_consume_at(&self, n: u32, now: DateTime<Utc>) -> bool {
        let mut state = self.lock();
        self.refill(&mut state, now);

        let requested = f64::from(n);
        if state.tokens >= requested {
            state.tokens -= requested;
            true
        } else {
            false
        }
    }

    fn refill(&self, state: &mut BucketState, now: DateTime<Utc>) {
        // Clock skew can move `now` behind the last refill; treat that as no time passed
        let elapsed_secs = (now - state.last_refill)
            .to_std()
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0);

        // Multiply before dividing so a full window restores exactly `capacity`
        let restored = elapsed_secs * self.capacity / self.refill_window_secs;
        state.tokens = (state.tokens + restored).min(self.capacity);
        state.last_refill = now;
    }

    /// Refill to capacity as of `now`
    fn reset(&self, now: DateTime<Utc>) {
        let mut state = self.lock();
        state.tokens = self.capacity;
        state.last_refill = now;
    }

    /// Whether the bucket has been untouched since `cutoff`
    fn idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.lock().last_refill <= cutoff
    }

    // A panic can only interrupt the lock holder between whole-field writes,
    // so the state is usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of login buckets keyed by normalized identity
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Arc<Bucket>>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default(), Arc::new(SystemClock))
    }
}

impl RateLimiter {
    /// Create a rate limiter with the given bucket config and clock
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Return the bucket for `key`, creating a full one on first access.
    ///
    /// The key is trimmed and lower-cased first, so differently cased
    /// identities share one bucket. Every call for the same normalized key
    /// returns the same shared instance.
    pub fn resolve_bucket(&self, key: &str) -> Arc<Bucket> {
        let key = normalize_identity(key);

        {
            let read_guard = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(bucket) = read_guard.get(&key) {
                return Arc::clone(bucket);
            }
        }

        let mut write_guard = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        // Double-check after acquiring write lock
        if let Some(bucket) = write_guard.get(&key) {
            return Arc::clone(bucket);
        }

        tracing::debug!("Creating rate limit bucket for {}", key);
        let bucket = Arc::new(Bucket::new(key.clone(), &self.config, self.clock.now()));
        write_guard.insert(key, Arc::clone(&bucket));
        bucket
    }

    /// Refill `bucket` to the limiter's current time and try to take `n` tokens
    pub fn try_consume(&self, bucket: &Bucket, n: u32) -> bool {
        bucket.try_consume_at(n, self.clock.now())
    }

    /// Admit one attempt for `key`
    ///
    /// # Errors
    /// Returns the generic authentication failure when the bucket is empty.
    pub fn check(&self, key: &str) -> Result<(), AuthError> {
        let bucket = self.resolve_bucket(key);
        if self.try_consume(&bucket, 1) {
            Ok(())
        } else {
            tracing::warn!("Rate limit exceeded for {}", bucket.key());
            Err(AuthError::rate_limited())
        }
    }

    /// Number of live buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Reset the throttling state for a key (e.g. after a password reset).
    ///
    /// A bucket no caller holds is dropped. A held bucket stays registered
    /// and is refilled in place, so the key keeps a single live bucket.
    pub fn clear_key(&self, key: &str) {
        let key = normalize_identity(key);
        let now = self.clock.now();

        let mut write_guard = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(bucket) = write_guard.get(&key) {
            if Arc::strong_count(bucket) > 1 {
                bucket.reset(now);
            } else {
                write_guard.remove(&key);
            }
        }
    }

    /// Reset every key, with the same held-bucket rule as [`Self::clear_key`]
    pub fn clear_all(&self) {
        let now = self.clock.now();

        let mut write_guard = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        write_guard.retain(|_, bucket| {
            let held = Arc::strong_count(bucket) > 1;
            if held {
                bucket.reset(now);
            }
            held
        });
    }

    /// Remove buckets untouched for at least `idle_for`, returning how many
    /// were dropped.
    ///
    /// `idle_for` is raised to the refill window, so an evicted bucket was
    /// already full and recreating it later is indistinguishable. Buckets
    /// still referenced by a caller are kept so a key never has two live
    /// buckets.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let idle_for = idle_for.max(self.config.refill_window());
        let Ok(idle_for) = chrono::Duration::from_std(idle_for) else {
            return 0;
        };
        // A cutoff before the earliest representable instant: nothing can be that idle
        let Some(cutoff) = self.clock.now().checked_sub_signed(idle_for) else {
            return 0;
        };

        let mut write_guard = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let before = write_guard.len();
        write_guard.retain(|_, bucket| Arc::strong_count(bucket) > 1 || !bucket.idle_since(cutoff));
        let evicted = before - write_guard.len();

        if evicted > 0 {
            tracing::debug!("Evicted {} idle rate limit buckets", evicted);
        }
        evicted
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("buckets", &self.bucket_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration as ChronoDuration;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = RateLimiter::new(RateLimitConfig::default(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_new_bucket_starts_full() {
        let (limiter, clock) = limiter();
        let bucket = limiter.resolve_bucket("user@example.com");
        assert_eq!(bucket.available_tokens(), 5.0);
        assert_eq!(bucket.last_refill(), clock.now());
        assert_eq!(bucket.key(), "user@example.com");
    }

    #[test]
    fn test_same_key_same_bucket() {
        let (limiter, _) = limiter();
        let a = limiter.resolve_bucket("user@example.com");
        let b = limiter.resolve_bucket("user@example.com");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_key_normalization() {
        let (limiter, _) = limiter();
        let a = limiter.resolve_bucket("User@Example.com");
        let b = limiter.resolve_bucket("  user@example.com ");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_different_keys_different_buckets() {
        let (limiter, _) = limiter();
        let a = limiter.resolve_bucket("user1@example.com");
        let b = limiter.resolve_bucket("user2@example.com");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[test]
    fn test_allows_up_to_capacity() {
        let (limiter, _) = limiter();
        let bucket = limiter.resolve_bucket("test@test.com");

        for _ in 0..5 {
            assert!(limiter.try_consume(&bucket, 1));
        }
        assert!(!limiter.try_consume(&bucket, 1));
        assert_eq!(bucket.available_tokens(), 0.0);
    }

    #[test]
    fn test_failed_consume_leaves_count_unchanged() {
        let (limiter, _) = limiter();
        let bucket = limiter.resolve_bucket("test@test.com");

        assert!(limiter.try_consume(&bucket, 3));
        assert!(!limiter.try_consume(&bucket, 3));
        assert_eq!(bucket.available_tokens(), 2.0);
    }

    #[test]
    fn test_partial_refill() {
        let (limiter, clock) = limiter();
        let bucket = limiter.resolve_bucket("test@test.com");
        for _ in 0..5 {
            assert!(limiter.try_consume(&bucket, 1));
        }

        // 5 tokens per 60s: one token every 12s
        clock.advance(ChronoDuration::seconds(11));
        assert!(!limiter.try_consume(&bucket, 1));

        clock.advance(ChronoDuration::seconds(2));
        assert!(limiter.try_consume(&bucket, 1));
        assert!(!limiter.try_consume(&bucket, 1));
    }

    #[test]
    fn test_full_window_refills_to_capacity_only() {
        let (limiter, clock) = limiter();
        let bucket = limiter.resolve_bucket("test@test.com");
        for _ in 0..5 {
            assert!(limiter.try_consume(&bucket, 1));
        }

        clock.advance(ChronoDuration::days(30));
        assert!(limiter.try_consume(&bucket, 1));
        assert_eq!(bucket.available_tokens(), 4.0);
    }

    #[test]
    fn test_clock_skew_does_not_refill_or_drain() {
        let (limiter, clock) = limiter();
        let bucket = limiter.resolve_bucket("skew@test.com");
        assert!(limiter.try_consume(&bucket, 2));

        clock.advance(ChronoDuration::seconds(-30));
        assert!(limiter.try_consume(&bucket, 1));
        assert_eq!(bucket.available_tokens(), 2.0);
        assert_eq!(bucket.last_refill(), clock.now());
    }

    #[test]
    fn test_check_returns_rate_limited() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            assert!(limiter.check("a@example.com").is_ok());
        }
        let err = limiter.check("A@EXAMPLE.COM").unwrap_err();
        assert_eq!(err.login_failure(), Some(crate::LoginFailure::RateLimited));
        assert!(limiter.check("b@example.com").is_ok());
    }

    #[test]
    fn test_clear_key_and_all() {
        let (limiter, _) = limiter();
        limiter.resolve_bucket("a@example.com");
        limiter.resolve_bucket("b@example.com");

        limiter.clear_key("A@example.com");
        assert_eq!(limiter.bucket_count(), 1);

        limiter.clear_all();
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_clear_key_refills_held_bucket_in_place() {
        let (limiter, _) = limiter();
        let held = limiter.resolve_bucket("held@example.com");
        for _ in 0..5 {
            assert!(limiter.try_consume(&held, 1));
        }

        limiter.clear_key("HELD@example.com");
        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(held.available_tokens(), 5.0);
        assert!(Arc::ptr_eq(&held, &limiter.resolve_bucket("held@example.com")));

        assert!(limiter.try_consume(&held, 1));
        limiter.clear_all();
        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(held.available_tokens(), 5.0);

        drop(held);
        limiter.clear_all();
        assert_eq!(limiter.bucket_count(), 0);
    }

    #[test]
    fn test_evict_idle_with_unrepresentable_cutoff() {
        let (limiter, _) = limiter();
        drop(limiter.resolve_bucket("old@example.com"));

        assert_eq!(
            limiter.evict_idle(Duration::from_secs(1_000_000_000_000_000)),
            0
        );
        // Converts to a chrono duration, but reaches past the earliest date
        assert_eq!(
            limiter.evict_idle(Duration::from_secs(10_000_000_000_000)),
            0
        );
        assert_eq!(limiter.evict_idle(Duration::MAX), 0);
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_evict_idle() {
        let (limiter, clock) = limiter();
        drop(limiter.resolve_bucket("idle@example.com"));
        let held = limiter.resolve_bucket("held@example.com");

        // Shorter than the refill window: raised to the window, nothing evicted yet
        clock.advance(ChronoDuration::seconds(30));
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 0);

        clock.advance(ChronoDuration::seconds(31));
        assert_eq!(limiter.evict_idle(Duration::from_secs(1)), 1);
        assert_eq!(limiter.bucket_count(), 1);

        // The held bucket survives and is still the registered one
        assert!(Arc::ptr_eq(&held, &limiter.resolve_bucket("held@example.com")));
    }
}
