//! Search metrics recorder
//!
//! Counters are atomics and latency state sits behind a short-lived mutex,
//! so recording never waits on I/O. Nothing here feeds back into control
//! flow.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::trace;

/// Number of latency samples retained for the snapshot
pub const MAX_LATENCY_SAMPLES: usize = 100;

#[derive(Debug, Default)]
struct LatencyState {
    samples: VecDeque<u64>,
    /// `(avg + t) / 2`, seeded with the first sample
    rolling_average_ms: Option<f64>,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    successes: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cancellations: AtomicU64,
    latency: Mutex<LatencyState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub successes: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cancellations: u64,
    /// Hits over lookups, `0.0` before the first lookup
    pub cache_hit_rate: f64,
    pub average_response_time_ms: Option<f64>,
    pub latency_samples: Vec<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, response_time_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.record_response_time(response_time_ms);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Neutral bookkeeping; cancellations are not errors
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, response_time_ms: u64) {
        let mut latency = self.lock_latency();
        if latency.samples.len() == MAX_LATENCY_SAMPLES {
            latency.samples.pop_front();
        }
        latency.samples.push_back(response_time_ms);

        let sample = response_time_ms as f64;
        let average = match latency.rolling_average_ms {
            Some(avg) => (avg + sample) / 2.0,
            None => sample,
        };
        latency.rolling_average_ms = Some(average);

        trace!(
            response_time_ms = response_time_ms,
            rolling_average_ms = average,
            "Recorded search response time"
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let latency = self.lock_latency();

        MetricsSnapshot {
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cancellations: self.cancellations.load(Ordering::Relaxed),
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                cache_hits as f64 / lookups as f64
            },
            average_response_time_ms: latency.rolling_average_ms,
            latency_samples: latency.samples.iter().copied().collect(),
        }
    }

    fn lock_latency(&self) -> std::sync::MutexGuard<'_, LatencyState> {
        // Recording cannot leave the state half-written, so a poisoned lock
        // is still usable
        self.latency
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
