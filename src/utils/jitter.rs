//! Jitter generation for retry delays

use rand::Rng;
use std::time::Duration;

/// Uniform jitter in `[0, max_jitter_ms)` milliseconds
///
/// # Examples
/// ```
/// use scene_finder::utils::jitter::generate_jitter_ms;
///
/// let jitter = generate_jitter_ms(1000);
/// assert!(jitter < 1000);
/// ```
pub fn generate_jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    rand::rng().random_range(0..max_jitter_ms)
}

/// Uniform jitter in `[0, max_jitter)` at millisecond resolution
pub fn generate_jitter(max_jitter: Duration) -> Duration {
    let max_ms = u64::try_from(max_jitter.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(generate_jitter_ms(max_ms))
}
