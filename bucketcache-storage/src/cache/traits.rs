//! Expiring cache contract consumed by the caching decorator.

use bucketcache_core::{ItemInfo, ResourceId};

/// Time-bounded map from resource id to item info.
///
/// An entry that was put and not invalidated is observable until its TTL
/// elapses, and never after. Implementations must be safe to share between
/// threads; concurrent put and invalidate on one key resolve last-write-wins.
pub trait ExpiringCache: Send + Sync {
    /// Insert or replace the entry for `key`.
    fn put(&self, key: ResourceId, value: ItemInfo);

    /// Live entry for `key`, if any.
    fn get_if_present(&self, key: &ResourceId) -> Option<ItemInfo>;

    /// Remove the entry for `key`.
    fn invalidate(&self, key: &ResourceId);

    /// Remove every entry.
    fn invalidate_all(&self);

    /// Remove every entry whose id lives in `bucket_name`, bucket entry included.
    fn invalidate_bucket(&self, bucket_name: &str);

    /// Approximate number of live entries.
    fn entry_count(&self) -> u64;

    /// Usage counters. Backends without counters report zeros.
    fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entry_count(),
            ..CacheStats::default()
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
