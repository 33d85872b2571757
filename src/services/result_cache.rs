//! In-memory TTL + capacity bounded cache of search results
//!
//! Entries are ordered by insertion: reads use `peek`, so a hit never
//! refreshes an entry's position, and re-inserting a key moves it to the
//! newest slot. Expiry is lazy; [`ResultCache::evict_expired`] only reclaims
//! memory.

use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::models::{CacheKey, RawMatch};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub results: Vec<RawMatch>,
    pub inserted_at: Instant,
    /// Wall-clock insertion time, for display only
    pub cached_at: DateTime<Utc>,
    pub last_response_time_ms: u64,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() >= ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    #[serde(with = "crate::config::duration_serde::duration")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceStats {
    pub removed_expired: usize,
    pub removed_by_capacity: usize,
    pub kept_entries: usize,
    pub duration_ms: u64,
}

pub struct ResultCache {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            // Capacity is enforced explicitly so that the bound can be applied
            // on a schedule as well as after insertion
            entries: RwLock::new(LruCache::unbounded()),
            ttl,
            max_entries,
        }
    }

    /// Unexpired entry for `key`, if any
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entries = self.entries.read().await;
        match entries.peek(key) {
            Some(entry) if !entry.is_expired(self.ttl) => Some(entry.clone()),
            Some(_) => {
                trace!("Cache entry {} expired", key);
                None
            }
            None => None,
        }
    }

    /// Store results for `key`, overwriting any previous entry
    ///
    /// Empty result sets are not stored. Returns whether an entry was written.
    pub async fn put(&self, key: CacheKey, results: Vec<RawMatch>, response_time_ms: u64) -> bool {
        if results.is_empty() {
            debug!("Not caching empty result set for {}", key);
            return false;
        }

        let entry = CacheEntry {
            key: key.clone(),
            results,
            inserted_at: Instant::now(),
            cached_at: Utc::now(),
            last_response_time_ms: response_time_ms,
        };

        let mut entries = self.entries.write().await;
        entries.put(key, entry);
        let evicted = Self::trim_to(&mut entries, self.max_entries);
        if evicted > 0 {
            debug!("Evicted {} cache entries over capacity {}", evicted, self.max_entries);
        }
        true
    }

    /// Remove every entry whose age has reached the TTL
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Drop oldest-inserted entries until at most `max_entries` remain
    pub async fn enforce_capacity(&self, max_entries: usize) -> usize {
        let mut entries = self.entries.write().await;
        Self::trim_to(&mut entries, max_entries)
    }

    fn trim_to(entries: &mut LruCache<CacheKey, CacheEntry>, max_entries: usize) -> usize {
        let mut removed = 0;
        while entries.len() > max_entries {
            if entries.pop_lru().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// One sweep: expiry first, then the configured capacity
    pub async fn run_maintenance(&self) -> MaintenanceStats {
        let started = std::time::Instant::now();
        let removed_expired = self.evict_expired().await;
        let removed_by_capacity = self.enforce_capacity(self.max_entries).await;

        MaintenanceStats {
            removed_expired,
            removed_by_capacity,
            kept_entries: self.len().await,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            max_entries: self.max_entries,
            ttl: self.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn matches(similarity: f64) -> Vec<RawMatch> {
        vec![RawMatch {
            similarity,
            ..Default::default()
        }]
    }

    fn key(n: usize) -> CacheKey {
        CacheKey::new(format!("url:https://example.com/{n}.png"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_visible_until_ttl() {
        let cache = ResultCache::new(HOUR, 100);
        assert!(cache.put(key(1), matches(0.9), 120).await);

        tokio::time::advance(HOUR - Duration::from_millis(1)).await;
        let entry = cache.get(&key(1)).await.expect("entry before TTL");
        assert_eq!(entry.results.len(), 1);
        assert_eq!(entry.last_response_time_ms, 120);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&key(1)).await.is_none());
        // Lazy expiry leaves the slot until a sweep
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.evict_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_results_never_cached() {
        let cache = ResultCache::new(HOUR, 100);
        assert!(!cache.put(key(1), Vec::new(), 50).await);
        assert!(cache.get(&key(1)).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let cache = ResultCache::new(HOUR, 100);
        cache.put(key(1), matches(0.5), 10).await;
        cache.put(key(1), matches(0.7), 20).await;

        let entry = cache.get(&key(1)).await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert_eq!(entry.results[0].similarity, 0.7);
        assert_eq!(entry.last_response_time_ms, 20);
    }

    #[tokio::test]
    async fn test_capacity_keeps_most_recent_insertions() {
        let cache = ResultCache::new(HOUR, 100);
        for n in 0..150 {
            cache.put(key(n), matches(0.9), 1).await;
            // Reads must not protect old entries from eviction
            let _ = cache.get(&key(0)).await;
        }

        assert_eq!(cache.len().await, 100);
        assert!(cache.get(&key(49)).await.is_none());
        for n in 50..150 {
            assert!(cache.contains(&key(n)).await, "missing entry {n}");
        }
    }

    #[tokio::test]
    async fn test_enforce_capacity_explicit_bound() {
        let cache = ResultCache::new(HOUR, 1000);
        for n in 0..20 {
            cache.put(key(n), matches(0.9), 1).await;
        }

        assert_eq!(cache.enforce_capacity(5).await, 15);
        assert_eq!(cache.len().await, 5);
        assert!(cache.contains(&key(19)).await);
        assert!(!cache.contains(&key(14)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_maintenance_reports_work() {
        let cache = ResultCache::new(Duration::from_secs(60), 100);
        cache.put(key(1), matches(0.9), 1).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put(key(2), matches(0.9), 1).await;

        let stats = cache.run_maintenance().await;
        assert_eq!(stats.removed_expired, 1);
        assert_eq!(stats.removed_by_capacity, 0);
        assert_eq!(stats.kept_entries, 1);
    }
}
