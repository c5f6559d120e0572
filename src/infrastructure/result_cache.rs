//! Result Cache
//!
//! Concurrent key/value cache with a fixed time-to-live per entry.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Default freshness window for cached lookups.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// DashMap-backed TTL cache.
///
/// Freshness is measured from the last `set`, never from reads. An entry
/// is visible only while `now < expires_at`; stale entries are dropped
/// when a reader trips over them or by the optional sweeper task.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl` after being set.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh value for `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        let stale = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if stale {
            // A concurrent set may have refreshed the entry in between.
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        None
    }

    /// Insert or overwrite `key`, restarting its freshness window.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Evict `key`. Returns `true` if an entry (fresh or stale) was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        Self::purge(&self.entries)
    }

    /// Number of stored entries, including stale ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the background sweep task.
    ///
    /// Keeps memory bounded for IPs that are never read again.
    pub fn start_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let entries = self.entries.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = Self::purge(&entries);
                if removed > 0 {
                    tracing::debug!("cache sweep removed {} expired entries", removed);
                }
            }
        })
    }

    fn purge(entries: &DashMap<String, CacheEntry<V>>) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        entries.retain(|_, entry| {
            let fresh = entry.expires_at > now;
            if !fresh {
                removed += 1;
            }
            fresh
        });
        removed
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const SHORT_TTL: Duration = Duration::from_millis(50);

    #[test]
    fn test_set_and_get() {
        let cache = ResultCache::new(DEFAULT_TTL);
        cache.set("45.5.164.0", "BR".to_string());

        assert_eq!(cache.get("45.5.164.0"), Some("BR".to_string()));
        assert_eq!(cache.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn test_get_missing() {
        let cache: ResultCache<String> = ResultCache::new(DEFAULT_TTL);
        assert!(cache.get("45.5.164.0").is_none());
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ResultCache::new(SHORT_TTL);
        cache.set("10.0.0.1", 1u32);
        assert_eq!(cache.get("10.0.0.1"), Some(1));

        std::thread::sleep(SHORT_TTL + Duration::from_millis(20));

        assert!(cache.get("10.0.0.1").is_none());
    }

    #[test]
    fn test_stale_entry_reclaimed_on_access() {
        let cache = ResultCache::new(SHORT_TTL);
        cache.set("10.0.0.1", 1u32);

        std::thread::sleep(SHORT_TTL + Duration::from_millis(20));
        assert_eq!(cache.len(), 1);

        assert!(cache.get("10.0.0.1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_overwrite_resets_freshness() {
        let cache = ResultCache::new(Duration::from_millis(300));
        cache.set("10.0.0.1", 1u32);

        std::thread::sleep(Duration::from_millis(200));
        cache.set("10.0.0.1", 2u32);
        std::thread::sleep(Duration::from_millis(150));

        // 350ms after the first set, 150ms after the second
        assert_eq!(cache.get("10.0.0.1"), Some(2));
    }

    #[test]
    fn test_reads_do_not_extend_ttl() {
        let cache = ResultCache::new(Duration::from_millis(100));
        cache.set("10.0.0.1", 1u32);

        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(40));
            let _ = cache.get("10.0.0.1");
        }

        assert!(cache.get("10.0.0.1").is_none());
    }

    #[test]
    fn test_delete() {
        let cache = ResultCache::new(DEFAULT_TTL);
        cache.set("10.0.0.1", 1u32);

        assert!(cache.delete("10.0.0.1"));
        assert!(!cache.delete("10.0.0.1"));
        assert!(cache.get("10.0.0.1").is_none());
    }

    #[test]
    fn test_purge_expired_keeps_fresh_entries() {
        let cache = ResultCache::new(SHORT_TTL);
        cache.set("old", 1u32);
        std::thread::sleep(SHORT_TTL + Duration::from_millis(20));
        cache.set("fresh", 2u32);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(2));
    }

    #[test]
    fn test_shared_values_are_not_copied() {
        let cache = ResultCache::new(DEFAULT_TTL);
        let value = Arc::new("payload".to_string());
        cache.set("k", value.clone());

        let hit = cache.get("k").unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = ResultCache::new(SHORT_TTL);
        cache.set("10.0.0.1", 1u32);

        let handle = cache.start_sweeper(Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweeper_keeps_fresh_entries() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.set("10.0.0.1", 1u32);

        let handle = cache.start_sweeper(Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.len(), 1);
        handle.abort();
    }
}
