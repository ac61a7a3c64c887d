//! bucketcache Storage - Backend Trait, In-Memory Backend and Metadata Cache
//!
//! Defines the storage abstraction every backend implements, an in-process
//! backend for development and tests, and the caching decorator that keeps
//! item metadata close to the caller.

pub mod async_backend;
pub mod cache;
pub mod in_memory;

pub use async_backend::{AsyncStorageBackend, BlockingBridge};
pub use cache::{CacheStats, ExpiringCache, MokaItemCache, PerformanceCachingStorage};
pub use in_memory::{Clock, FixedClock, InMemoryStorage, SystemClock};

use bucketcache_core::{
    BucketCacheResult, ComposeOptions, CreateBucketOptions, CreateObjectOptions, ItemInfo,
    ListOptions, ResourceId, UpdatableItemInfo,
};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Operations offered by an object-storage backend.
///
/// Calls block until the backend answers. Implementations must be safe to
/// share between threads.
pub trait StorageBackend: Send + Sync {
    // === Creation ===

    /// Create a bucket.
    fn create_bucket(&self, bucket_name: &str, options: &CreateBucketOptions)
        -> BucketCacheResult<()>;

    /// Create a zero-length object.
    fn create_empty_object(
        &self,
        resource_id: &ResourceId,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()>;

    /// Create several zero-length objects with the same options.
    fn create_empty_objects(
        &self,
        resource_ids: &[ResourceId],
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()>;

    // === Object content ===

    /// Write the full content of an object.
    fn write_object(
        &self,
        resource_id: &ResourceId,
        content: Vec<u8>,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()>;

    /// Read the full content of an object.
    fn read_object(&self, resource_id: &ResourceId) -> BucketCacheResult<Vec<u8>>;

    /// Copy objects pairwise from one bucket to another.
    fn copy(
        &self,
        src_bucket_name: &str,
        src_object_names: &[String],
        dst_bucket_name: &str,
        dst_object_names: &[String],
    ) -> BucketCacheResult<()>;

    // === Deletion ===

    /// Delete buckets together with their objects.
    fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()>;

    /// Delete objects.
    fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()>;

    // === Listing ===

    /// Names of all buckets.
    fn list_bucket_names(&self) -> BucketCacheResult<Vec<String>>;

    /// Info for all buckets.
    fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Object names in a bucket matching the listing options.
    fn list_object_names(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<String>>;

    /// Object infos in a bucket matching the listing options.
    fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>>;

    // === Metadata ===

    /// Info for one resource; [`ItemInfo::not_found`] when it does not exist.
    fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo>;

    /// Info for several resources, one entry per requested id in request order.
    fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Apply metadata patches, returning the updated infos in request order.
    fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>>;

    /// Concatenate `sources` into `destination`.
    fn compose_objects(
        &self,
        sources: &[ResourceId],
        destination: &ResourceId,
        options: &ComposeOptions,
    ) -> BucketCacheResult<ItemInfo>;

    // === Lifecycle ===

    /// Return once the bucket holds no objects.
    fn wait_for_bucket_empty(&self, bucket_name: &str) -> BucketCacheResult<()>;

    /// Release backend resources.
    fn close(&self) -> BucketCacheResult<()>;
}
