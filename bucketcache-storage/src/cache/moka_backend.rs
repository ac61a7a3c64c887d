//! `ExpiringCache` backed by `moka`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bucketcache_core::{CacheConfig, ItemInfo, ResourceId};
use moka::sync::Cache;

use super::traits::{CacheStats, ExpiringCache};

/// Concurrent item-info cache with a fixed TTL and a capacity bound.
#[derive(Debug)]
pub struct MokaItemCache {
    inner: Cache<ResourceId, ItemInfo>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MokaItemCache {
    /// Create a cache whose entries live for `max_entry_age` after each write.
    pub fn new(max_entry_age: Duration, max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(max_entry_age)
            .build();

        Self {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache sized and aged by `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entry_age, config.max_entries)
    }
}

impl Default for MokaItemCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl ExpiringCache for MokaItemCache {
    fn put(&self, key: ResourceId, value: ItemInfo) {
        self.inner.insert(key, value);
    }

    fn get_if_present(&self, key: &ResourceId) -> Option<ItemInfo> {
        let found = self.inner.get(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn invalidate(&self, key: &ResourceId) {
        self.inner.invalidate(key);
    }

    fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    fn invalidate_bucket(&self, bucket_name: &str) {
        let doomed: Vec<ResourceId> = self
            .inner
            .iter()
            .filter(|(key, _)| key.belongs_to_bucket(bucket_name))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &doomed {
            self.inner.invalidate(key);
        }
    }

    fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn object_info(bucket: &str, name: &str) -> ItemInfo {
        ItemInfo::inferred_directory(ResourceId::object(bucket, name))
    }

    #[test]
    fn test_put_get_invalidate() {
        let cache = MokaItemCache::default();
        let id = ResourceId::object("b", "o");

        assert!(cache.get_if_present(&id).is_none());
        cache.put(id.clone(), object_info("b", "o"));
        assert_eq!(cache.get_if_present(&id), Some(object_info("b", "o")));

        cache.invalidate(&id);
        assert!(cache.get_if_present(&id).is_none());
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = MokaItemCache::default();
        let id = ResourceId::object("b", "o");
        cache.get_if_present(&id);
        cache.put(id.clone(), object_info("b", "o"));
        cache.get_if_present(&id);
        cache.get_if_present(&id);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_invalidate_bucket_leaves_other_buckets() {
        let cache = MokaItemCache::default();
        cache.put(ResourceId::bucket("a"), ItemInfo::not_found(ResourceId::bucket("a")));
        cache.put(ResourceId::object("a", "x"), object_info("a", "x"));
        cache.put(ResourceId::object("ab", "x"), object_info("ab", "x"));
        cache.put(ResourceId::object("b", "x"), object_info("b", "x"));

        cache.invalidate_bucket("a");

        assert!(cache.get_if_present(&ResourceId::bucket("a")).is_none());
        assert!(cache.get_if_present(&ResourceId::object("a", "x")).is_none());
        assert!(cache.get_if_present(&ResourceId::object("ab", "x")).is_some());
        assert!(cache.get_if_present(&ResourceId::object("b", "x")).is_some());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = MokaItemCache::default();
        cache.put(ResourceId::object("a", "x"), object_info("a", "x"));
        cache.put(ResourceId::object("b", "x"), object_info("b", "x"));

        cache.invalidate_all();

        assert!(cache.get_if_present(&ResourceId::object("a", "x")).is_none());
        assert!(cache.get_if_present(&ResourceId::object("b", "x")).is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_entries_expire_after_max_age() {
        let cache = MokaItemCache::new(Duration::from_millis(50), 100);
        let id = ResourceId::object("b", "o");
        cache.put(id.clone(), object_info("b", "o"));
        assert!(cache.get_if_present(&id).is_some());

        thread::sleep(Duration::from_millis(200));
        assert!(cache.get_if_present(&id).is_none());
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig::new()
            .with_max_entry_age(Duration::from_millis(1234))
            .with_max_entries(77);
        let cache = MokaItemCache::from_config(&config);

        let policy = cache.inner.policy();
        assert_eq!(policy.time_to_live(), Some(Duration::from_millis(1234)));
        assert_eq!(policy.max_capacity(), Some(77));
    }
}
