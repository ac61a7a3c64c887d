//! Item-info caching decorator.
//!
//! [`PerformanceCachingStorage`] wraps a [`StorageBackend`] and keeps the
//! metadata it has seen in an [`ExpiringCache`]. Each operation follows one
//! of four policies:
//!
//! - passthrough: content reads and writes, bucket and object creation,
//!   name listings and `wait_for_bucket_empty` go straight to the backend.
//! - populate: every call returning item infos stores the existing ones.
//! - invalidate: deletes, copies and `close` drop the entries they affect,
//!   and only after the backend call succeeded.
//! - read-through: `get_item_info` and `get_item_infos` answer from the cache
//!   and fetch only what is missing, preserving request order.
//!
//! Backend errors propagate unchanged and never touch the cache.

use std::collections::HashMap;
use std::sync::Arc;

use bucketcache_core::{
    BucketCacheResult, CacheConfig, ComposeOptions, CreateBucketOptions, CreateObjectOptions,
    ItemInfo, ListOptions, ResourceId, UpdatableItemInfo,
};

use super::moka_backend::MokaItemCache;
use super::traits::ExpiringCache;
use crate::StorageBackend;

/// Storage decorator caching item metadata.
///
/// # Type Parameters
///
/// - `S`: the wrapped backend
/// - `C`: the cache holding item infos
pub struct PerformanceCachingStorage<S, C = MokaItemCache> {
    delegate: Arc<S>,
    cache: Arc<C>,
}

impl<S: StorageBackend> PerformanceCachingStorage<S, MokaItemCache> {
    /// Wrap `delegate` with a [`MokaItemCache`] built from `config`.
    pub fn with_config(delegate: S, config: &CacheConfig) -> BucketCacheResult<Self> {
        config.validate()?;
        Ok(Self::new(delegate, MokaItemCache::from_config(config)))
    }
}

impl<S: StorageBackend, C: ExpiringCache> PerformanceCachingStorage<S, C> {
    /// Wrap `delegate`, keeping item infos in `cache`.
    pub fn new(delegate: S, cache: C) -> Self {
        Self::from_shared(Arc::new(delegate), Arc::new(cache))
    }

    /// Build from handles that are also held elsewhere.
    pub fn from_shared(delegate: Arc<S>, cache: Arc<C>) -> Self {
        Self { delegate, cache }
    }

    /// The wrapped backend.
    pub fn delegate(&self) -> &S {
        &self.delegate
    }

    /// The item-info cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Drop every cached entry without closing the backend.
    pub fn invalidate_cache(&self) {
        tracing::debug!("Invalidating all cached item infos");
        self.cache.invalidate_all();
    }

    fn populate<'a>(&self, items: impl IntoIterator<Item = &'a ItemInfo>) {
        let mut count = 0usize;
        for item in items {
            if item.exists() && !item.resource_id.is_root() {
                self.cache.put(item.resource_id.clone(), item.clone());
                count += 1;
            }
        }
        if count > 0 {
            tracing::debug!(count, "Cached item infos");
        }
    }

    /// Line backend results up with the ids that were asked for.
    ///
    /// A well-behaved backend answers one entry per id in order. Anything else
    /// is matched by resource id and unmatched ids become not-found.
    fn align(misses: &[ResourceId], fetched: Vec<ItemInfo>) -> Vec<ItemInfo> {
        if fetched.len() == misses.len() {
            return fetched;
        }

        tracing::warn!(
            requested = misses.len(),
            returned = fetched.len(),
            "Backend returned a batch of unexpected length, matching by resource id"
        );
        let by_id: HashMap<ResourceId, ItemInfo> = fetched
            .into_iter()
            .map(|info| (info.resource_id.clone(), info))
            .collect();
        misses
            .iter()
            .map(|id| {
                by_id
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| ItemInfo::not_found(id.clone()))
            })
            .collect()
    }
}

impl<S: StorageBackend, C: ExpiringCache> StorageBackend for PerformanceCachingStorage<S, C> {
    // === Passthrough ===

    fn create_bucket(
        &self,
        bucket_name: &str,
        options: &CreateBucketOptions,
    ) -> BucketCacheResult<()> {
        self.delegate.create_bucket(bucket_name, options)
    }

    fn create_empty_object(
        &self,
        resource_id: &ResourceId,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.delegate.create_empty_object(resource_id, options)
    }

    fn create_empty_objects(
        &self,
        resource_ids: &[ResourceId],
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.delegate.create_empty_objects(resource_ids, options)
    }

    fn write_object(
        &self,
        resource_id: &ResourceId,
        content: Vec<u8>,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.delegate.write_object(resource_id, content, options)
    }

    fn read_object(&self, resource_id: &ResourceId) -> BucketCacheResult<Vec<u8>> {
        self.delegate.read_object(resource_id)
    }

    fn list_bucket_names(&self) -> BucketCacheResult<Vec<String>> {
        self.delegate.list_bucket_names()
    }

    fn list_object_names(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<String>> {
        self.delegate.list_object_names(bucket_name, options)
    }

    fn wait_for_bucket_empty(&self, bucket_name: &str) -> BucketCacheResult<()> {
        self.delegate.wait_for_bucket_empty(bucket_name)
    }

    // === Invalidate on mutation ===

    fn copy(
        &self,
        src_bucket_name: &str,
        src_object_names: &[String],
        dst_bucket_name: &str,
        dst_object_names: &[String],
    ) -> BucketCacheResult<()> {
        self.delegate
            .copy(src_bucket_name, src_object_names, dst_bucket_name, dst_object_names)?;

        for name in dst_object_names {
            self.cache
                .invalidate(&ResourceId::object(dst_bucket_name, name.as_str()));
        }
        tracing::debug!(
            bucket = dst_bucket_name,
            count = dst_object_names.len(),
            "Invalidated copy destinations"
        );
        Ok(())
    }

    fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()> {
        self.delegate.delete_buckets(bucket_names)?;

        for name in bucket_names {
            self.cache.invalidate_bucket(name);
            tracing::debug!(bucket = %name, "Invalidated deleted bucket");
        }
        Ok(())
    }

    fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()> {
        self.delegate.delete_objects(resource_ids)?;

        for id in resource_ids {
            self.cache.invalidate(id);
        }
        tracing::debug!(count = resource_ids.len(), "Invalidated deleted objects");
        Ok(())
    }

    fn close(&self) -> BucketCacheResult<()> {
        self.delegate.close()?;
        self.invalidate_cache();
        Ok(())
    }

    // === Populate on success ===

    fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>> {
        let infos = self.delegate.list_bucket_info()?;
        self.populate(&infos);
        Ok(infos)
    }

    fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>> {
        let infos = self.delegate.list_object_info(bucket_name, options)?;
        self.populate(&infos);
        Ok(infos)
    }

    fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>> {
        let infos = self.delegate.update_items(updates)?;
        self.populate(&infos);
        Ok(infos)
    }

    fn compose_objects(
        &self,
        sources: &[ResourceId],
        destination: &ResourceId,
        options: &ComposeOptions,
    ) -> BucketCacheResult<ItemInfo> {
        let info = self.delegate.compose_objects(sources, destination, options)?;
        self.populate([&info]);
        Ok(info)
    }

    // === Read-through ===

    fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo> {
        if let Some(cached) = self.cache.get_if_present(resource_id) {
            tracing::debug!(resource = %resource_id, "Item info cache hit");
            return Ok(cached);
        }

        tracing::debug!(resource = %resource_id, "Item info cache miss");
        let info = self.delegate.get_item_info(resource_id)?;
        self.populate([&info]);
        Ok(info)
    }

    fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>> {
        let mut slots: Vec<Option<ItemInfo>> = Vec::with_capacity(resource_ids.len());
        let mut misses = Vec::new();

        for id in resource_ids {
            let cached = self.cache.get_if_present(id);
            if cached.is_none() {
                misses.push(id.clone());
            }
            slots.push(cached);
        }

        tracing::debug!(
            hits = resource_ids.len() - misses.len(),
            misses = misses.len(),
            "Looked up item infos in cache"
        );

        if misses.is_empty() {
            return Ok(slots.into_iter().flatten().collect());
        }

        let fetched = self.delegate.get_item_infos(&misses)?;
        self.populate(&fetched);
        let mut fetched = Self::align(&misses, fetched).into_iter();

        Ok(resource_ids
            .iter()
            .zip(slots)
            .map(|(id, slot)| match slot {
                Some(hit) => hit,
                None => fetched
                    .next()
                    .unwrap_or_else(|| ItemInfo::not_found(id.clone())),
            })
            .collect())
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::InMemoryStorage;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Batch lookups return one entry per id, in order, whatever was cached.
        #[test]
        fn prop_get_item_infos_preserves_order(
            stored in proptest::collection::btree_set("[a-d]", 0..4),
            warm in proptest::collection::vec("[a-d]", 0..4),
            requested in proptest::collection::vec("[a-d]", 0..8),
        ) {
            let inner = InMemoryStorage::new();
            inner.create_bucket("b", &CreateBucketOptions::default()).unwrap();
            for name in &stored {
                inner
                    .create_empty_object(&ResourceId::object("b", name.as_str()), &CreateObjectOptions::default())
                    .unwrap();
            }
            let storage = PerformanceCachingStorage::with_config(inner, &CacheConfig::default()).unwrap();
            for name in &warm {
                storage.get_item_info(&ResourceId::object("b", name.as_str())).unwrap();
            }

            let ids: Vec<ResourceId> = requested.iter().map(|n| ResourceId::object("b", n.as_str())).collect();
            let infos = storage.get_item_infos(&ids).unwrap();

            prop_assert_eq!(infos.len(), ids.len());
            for (info, id) in infos.iter().zip(&ids) {
                prop_assert_eq!(&info.resource_id, id);
                prop_assert_eq!(info.exists(), stored.contains(id.object_name().unwrap()));
            }
        }
    }
}
