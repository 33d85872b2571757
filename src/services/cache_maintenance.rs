//! Periodic result cache sweep
//!
//! Lazy expiry keeps lookups correct on its own; this task reclaims memory
//! and re-applies the capacity bound when no insertions happen.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::services::result_cache::{MaintenanceStats, ResultCache};

pub struct CacheMaintenanceService {
    cache: Arc<ResultCache>,
    sweep_interval: Duration,
}

impl CacheMaintenanceService {
    pub fn new(cache: Arc<ResultCache>, sweep_interval: Duration) -> Self {
        Self {
            cache,
            sweep_interval,
        }
    }

    /// Run one sweep immediately
    pub async fn execute_maintenance(&self) -> MaintenanceStats {
        let stats = self.cache.run_maintenance().await;

        if stats.removed_expired + stats.removed_by_capacity > 0 {
            info!(
                "Result cache maintenance completed: kept={} removed_expired={} removed_capacity={} duration={}ms",
                stats.kept_entries,
                stats.removed_expired,
                stats.removed_by_capacity,
                stats.duration_ms
            );
        } else {
            trace!(
                "Result cache maintenance completed in {}ms: no work performed",
                stats.duration_ms
            );
        }

        stats
    }

    /// Sweep every `sweep_interval` until `shutdown` is cancelled
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            debug!(
                "Starting result cache maintenance with interval: {:?}",
                self.sweep_interval
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Result cache maintenance stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.execute_maintenance().await;
                    }
                }
            }
        })
    }
}
