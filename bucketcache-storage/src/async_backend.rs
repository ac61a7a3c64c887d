//! Async access to storage metadata.
//!
//! [`AsyncStorageBackend`] is the async face of the metadata operations of
//! [`StorageBackend`]. [`BlockingBridge`] provides it for any synchronous
//! backend by running each call on tokio's blocking pool.

use std::sync::Arc;

use ::async_trait::async_trait;
use bucketcache_core::{
    BucketCacheResult, ItemInfo, ListOptions, ResourceId, StorageError, UpdatableItemInfo,
};

use crate::StorageBackend;

/// Async metadata operations.
#[async_trait]
pub trait AsyncStorageBackend: Send + Sync {
    // ========================================================================
    // READS
    // ========================================================================

    /// Info for one resource; not-found sentinel when absent.
    async fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo>;

    /// Info for several resources, in request order.
    async fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Info for every bucket.
    async fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Object infos in a bucket matching the listing options.
    async fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>>;

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Apply metadata patches, returning the updated infos in request order.
    async fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Delete buckets together with their objects.
    async fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()>;

    /// Delete objects.
    async fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()>;

    /// Release backend resources.
    async fn close(&self) -> BucketCacheResult<()>;
}

/// Runs a synchronous backend on `tokio::task::spawn_blocking`.
pub struct BlockingBridge<S> {
    inner: Arc<S>,
}

impl<S> Clone for BlockingBridge<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StorageBackend + 'static> BlockingBridge<S> {
    /// Wrap `inner` for async callers.
    pub fn new(inner: S) -> Self {
        Self::from_shared(Arc::new(inner))
    }

    /// Wrap a backend that is also used synchronously elsewhere.
    pub fn from_shared(inner: Arc<S>) -> Self {
        Self { inner }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> BucketCacheResult<T>
    where
        F: FnOnce(&S) -> BucketCacheResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner))
            .await
            .map_err(|e| StorageError::TaskFailed {
                reason: e.to_string(),
            })?
    }
}

#[async_trait]
impl<S: StorageBackend + 'static> AsyncStorageBackend for BlockingBridge<S> {
    async fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo> {
        let resource_id = resource_id.clone();
        self.run(move |s| s.get_item_info(&resource_id)).await
    }

    async fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>> {
        let resource_ids = resource_ids.to_vec();
        self.run(move |s| s.get_item_infos(&resource_ids)).await
    }

    async fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>> {
        self.run(|s| s.list_bucket_info()).await
    }

    async fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>> {
        let bucket_name = bucket_name.to_string();
        let options = options.clone();
        self.run(move |s| s.list_object_info(&bucket_name, &options))
            .await
    }

    async fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>> {
        let updates = updates.to_vec();
        self.run(move |s| s.update_items(&updates)).await
    }

    async fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()> {
        let bucket_names = bucket_names.to_vec();
        self.run(move |s| s.delete_buckets(&bucket_names)).await
    }

    async fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()> {
        let resource_ids = resource_ids.to_vec();
        self.run(move |s| s.delete_objects(&resource_ids)).await
    }

    async fn close(&self) -> BucketCacheResult<()> {
        self.run(|s| s.close()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExpiringCache, InMemoryStorage, PerformanceCachingStorage};
    use bucketcache_core::{
        BucketCacheError, CacheConfig, CreateBucketOptions, CreateObjectOptions,
    };

    fn make_bridge() -> BlockingBridge<PerformanceCachingStorage<InMemoryStorage>> {
        let inner = InMemoryStorage::new();
        inner.create_bucket("b", &CreateBucketOptions::default()).unwrap();
        inner
            .create_empty_object(&ResourceId::object("b", "o"), &CreateObjectOptions::default())
            .unwrap();
        BlockingBridge::new(
            PerformanceCachingStorage::with_config(inner, &CacheConfig::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_get_item_info_through_bridge_populates_cache() {
        let bridge = make_bridge();
        let id = ResourceId::object("b", "o");

        let info = bridge.get_item_info(&id).await.unwrap();

        assert!(info.exists());
        assert_eq!(bridge.inner().cache().get_if_present(&id), Some(info));
    }

    #[tokio::test]
    async fn test_get_item_infos_preserves_order() {
        let bridge = make_bridge();
        let ids = vec![ResourceId::object("b", "missing"), ResourceId::object("b", "o")];

        let infos = bridge.get_item_infos(&ids).await.unwrap();

        assert_eq!(infos.len(), 2);
        assert!(!infos[0].exists());
        assert!(infos[1].exists());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let bridge = make_bridge();
        let listed = bridge.list_object_info("b", &ListOptions::new()).await.unwrap();
        assert_eq!(listed.len(), 1);

        bridge
            .delete_objects(&[ResourceId::object("b", "o")])
            .await
            .unwrap();
        bridge.delete_buckets(&["b".to_string()]).await.unwrap();

        assert!(bridge.list_bucket_info().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_errors_cross_the_bridge() {
        let bridge = make_bridge();
        bridge.close().await.unwrap();

        let result = bridge.get_item_info(&ResourceId::object("b", "o")).await;
        assert!(matches!(
            result,
            Err(BucketCacheError::Storage(StorageError::Closed))
        ));
    }
}
