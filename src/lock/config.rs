// File: src/lock/config.rs

use std::time::Duration;

/// Lease and contention settings shared by every lock kind
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease time-to-live; renewed every `ttl / 3` while held
    pub ttl: Duration,

    /// Give up and skip the cycle after waiting this long
    pub acquire_timeout: Duration,

    /// Delay between acquisition attempts
    pub retry_interval: Duration,

    /// Random delay in `[0, max_jitter)` before the first attempt
    pub max_jitter: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(250),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl LockConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: env_millis("CAL_LOCK_TTL_MS").unwrap_or(defaults.ttl),
            acquire_timeout: env_millis("CAL_LOCK_ACQUIRE_TIMEOUT_MS")
                .unwrap_or(defaults.acquire_timeout),
            retry_interval: env_millis("CAL_LOCK_RETRY_MS").unwrap_or(defaults.retry_interval),
            max_jitter: env_millis("CAL_LOCK_MAX_JITTER_MS").unwrap_or(defaults.max_jitter),
        }
    }

    /// Settings for tests: no jitter, one quick attempt
    pub fn immediate() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::ZERO,
            retry_interval: Duration::from_millis(10),
            max_jitter: Duration::ZERO,
        }
    }
}

/// Read a millisecond duration from the environment
pub(crate) fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}
