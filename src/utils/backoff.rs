//! Exponential backoff with jitter between search attempts

use std::time::Duration;

use crate::config::RetryConfig;
use crate::utils::jitter::generate_jitter;

/// Delay to wait after failed attempt `attempt` (1-based)
///
/// `2^attempt * base_delay + jitter`, jitter uniform in `[0, max_jitter)`.
/// With the defaults this is 2-3s after the first failure and 4-5s after the
/// second.
pub fn retry_delay(config: &RetryConfig, attempt: u32) -> Duration {
    backoff_floor(config, attempt) + generate_jitter(config.max_jitter)
}

/// Deterministic part of [`retry_delay`]
pub fn backoff_floor(config: &RetryConfig, attempt: u32) -> Duration {
    let multiplier = 2u32.saturating_pow(attempt);
    config.base_delay.saturating_mul(multiplier)
}
