//! bucketcache Test Utilities
//!
//! Shared test infrastructure for the bucketcache workspace:
//! - A recording spy backend for asserting on delegate calls
//! - Proptest generators for ids, metadata and item infos
//! - Fixtures for the two-bucket scenarios
//! - Equivalence-based assertions for item infos
//! - One-time tracing setup

// Re-export the in-memory backend from its source crate
pub use bucketcache_storage::{
    ExpiringCache, InMemoryStorage, MokaItemCache, PerformanceCachingStorage, StorageBackend,
};

// Re-export core types for convenience
pub use bucketcache_core::{
    BucketCacheError, BucketCacheResult, CacheConfig, ComposeOptions, ContentHash,
    CreateBucketOptions, CreateObjectOptions, ItemInfo, ListOptions, Metadata, ResourceId,
    StorageError, Timestamp, UpdatableItemInfo,
};

use std::sync::{Mutex, MutexGuard, Once};

// ============================================================================
// RECORDING STORAGE
// ============================================================================

/// One call observed by [`RecordingStorage`], with the arguments that matter
/// for cache assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateBucket(String),
    CreateEmptyObject(ResourceId),
    CreateEmptyObjects(Vec<ResourceId>),
    WriteObject(ResourceId),
    ReadObject(ResourceId),
    Copy {
        src_bucket: String,
        src_objects: Vec<String>,
        dst_bucket: String,
        dst_objects: Vec<String>,
    },
    DeleteBuckets(Vec<String>),
    DeleteObjects(Vec<ResourceId>),
    ListBucketNames,
    ListBucketInfo,
    ListObjectNames {
        bucket: String,
        options: ListOptions,
    },
    ListObjectInfo {
        bucket: String,
        options: ListOptions,
    },
    GetItemInfo(ResourceId),
    GetItemInfos(Vec<ResourceId>),
    UpdateItems(Vec<ResourceId>),
    ComposeObjects {
        sources: Vec<ResourceId>,
        destination: ResourceId,
    },
    WaitForBucketEmpty(String),
    Close,
}

/// Spy backend: records every call, then forwards it to an [`InMemoryStorage`].
///
/// Arm [`RecordingStorage::fail_next`] to make the next call fail before it
/// reaches the inner backend.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    calls: Mutex<Vec<RecordedCall>>,
    next_failure: Mutex<Option<StorageError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingStorage {
    /// Spy over an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spy over an existing backend, e.g. one with a fixed clock.
    pub fn wrapping(inner: InMemoryStorage) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            next_failure: Mutex::new(None),
        }
    }

    /// The backend calls are forwarded to. Calls made on it are not recorded.
    pub fn inner(&self) -> &InMemoryStorage {
        &self.inner
    }

    /// Calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls recorded so far.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Forget recorded calls, typically after fixture setup.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Fail the next call with `error` instead of forwarding it.
    pub fn fail_next(&self, error: StorageError) {
        *lock(&self.next_failure) = Some(error);
    }

    fn record(&self, call: RecordedCall) -> BucketCacheResult<()> {
        lock(&self.calls).push(call);
        match lock(&self.next_failure).take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

impl StorageBackend for RecordingStorage {
    fn create_bucket(
        &self,
        bucket_name: &str,
        options: &CreateBucketOptions,
    ) -> BucketCacheResult<()> {
        self.record(RecordedCall::CreateBucket(bucket_name.to_string()))?;
        self.inner.create_bucket(bucket_name, options)
    }

    fn create_empty_object(
        &self,
        resource_id: &ResourceId,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.record(RecordedCall::CreateEmptyObject(resource_id.clone()))?;
        self.inner.create_empty_object(resource_id, options)
    }

    fn create_empty_objects(
        &self,
        resource_ids: &[ResourceId],
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.record(RecordedCall::CreateEmptyObjects(resource_ids.to_vec()))?;
        self.inner.create_empty_objects(resource_ids, options)
    }

    fn write_object(
        &self,
        resource_id: &ResourceId,
        content: Vec<u8>,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        self.record(RecordedCall::WriteObject(resource_id.clone()))?;
        self.inner.write_object(resource_id, content, options)
    }

    fn read_object(&self, resource_id: &ResourceId) -> BucketCacheResult<Vec<u8>> {
        self.record(RecordedCall::ReadObject(resource_id.clone()))?;
        self.inner.read_object(resource_id)
    }

    fn copy(
        &self,
        src_bucket_name: &str,
        src_object_names: &[String],
        dst_bucket_name: &str,
        dst_object_names: &[String],
    ) -> BucketCacheResult<()> {
        self.record(RecordedCall::Copy {
            src_bucket: src_bucket_name.to_string(),
            src_objects: src_object_names.to_vec(),
            dst_bucket: dst_bucket_name.to_string(),
            dst_objects: dst_object_names.to_vec(),
        })?;
        self.inner
            .copy(src_bucket_name, src_object_names, dst_bucket_name, dst_object_names)
    }

    fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()> {
        self.record(RecordedCall::DeleteBuckets(bucket_names.to_vec()))?;
        self.inner.delete_buckets(bucket_names)
    }

    fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()> {
        self.record(RecordedCall::DeleteObjects(resource_ids.to_vec()))?;
        self.inner.delete_objects(resource_ids)
    }

    fn list_bucket_names(&self) -> BucketCacheResult<Vec<String>> {
        self.record(RecordedCall::ListBucketNames)?;
        self.inner.list_bucket_names()
    }

    fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>> {
        self.record(RecordedCall::ListBucketInfo)?;
        self.inner.list_bucket_info()
    }

    fn list_object_names(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<String>> {
        self.record(RecordedCall::ListObjectNames {
            bucket: bucket_name.to_string(),
            options: options.clone(),
        })?;
        self.inner.list_object_names(bucket_name, options)
    }

    fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>> {
        self.record(RecordedCall::ListObjectInfo {
            bucket: bucket_name.to_string(),
            options: options.clone(),
        })?;
        self.inner.list_object_info(bucket_name, options)
    }

    fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo> {
        self.record(RecordedCall::GetItemInfo(resource_id.clone()))?;
        self.inner.get_item_info(resource_id)
    }

    fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>> {
        self.record(RecordedCall::GetItemInfos(resource_ids.to_vec()))?;
        self.inner.get_item_infos(resource_ids)
    }

    fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>> {
        self.record(RecordedCall::UpdateItems(
            updates.iter().map(|u| u.resource_id.clone()).collect(),
        ))?;
        self.inner.update_items(updates)
    }

    fn compose_objects(
        &self,
        sources: &[ResourceId],
        destination: &ResourceId,
        options: &ComposeOptions,
    ) -> BucketCacheResult<ItemInfo> {
        self.record(RecordedCall::ComposeObjects {
            sources: sources.to_vec(),
            destination: destination.clone(),
        })?;
        self.inner.compose_objects(sources, destination, options)
    }

    fn wait_for_bucket_empty(&self, bucket_name: &str) -> BucketCacheResult<()> {
        self.record(RecordedCall::WaitForBucketEmpty(bucket_name.to_string()))?;
        self.inner.wait_for_bucket_empty(bucket_name)
    }

    fn close(&self) -> BucketCacheResult<()> {
        self.record(RecordedCall::Close)?;
        self.inner.close()
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber filtered by `RUST_LOG` (default `warn`).
/// Safe to call from every test; only the first call has an effect.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for bucketcache value types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a valid bucket name.
    pub fn arb_bucket_name() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9_.-]{0,15}"
    }

    /// Generate a valid object name, possibly nested in directories.
    pub fn arb_object_name() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_.-]{1,10}(/[a-zA-Z0-9_.-]{1,10}){0,2}"
    }

    /// Generate a bucket or object id.
    pub fn arb_resource_id() -> impl Strategy<Value = ResourceId> {
        prop_oneof![
            arb_bucket_name().prop_map(ResourceId::bucket),
            (arb_bucket_name(), arb_object_name())
                .prop_map(|(bucket, object)| ResourceId::object(bucket, object)),
        ]
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // Generate timestamps within a reasonable range (2020-2030)
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    /// Generate user metadata.
    pub fn arb_metadata() -> impl Strategy<Value = Metadata> {
        proptest::collection::btree_map("[a-z_]{1,8}", proptest::collection::vec(any::<u8>(), 0..8), 0..4)
    }

    /// Generate an existing object info.
    pub fn arb_object_info() -> impl Strategy<Value = ItemInfo> {
        (
            arb_bucket_name(),
            arb_object_name(),
            arb_timestamp(),
            any::<u32>(),
            proptest::option::of("(text/plain|image/png|application/json)"),
            arb_metadata(),
        )
            .prop_map(|(bucket, object, time, size, content_type, metadata)| {
                ItemInfo::object(
                    ResourceId::object(bucket, object),
                    time,
                    time,
                    u64::from(size),
                    content_type,
                    metadata,
                )
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Two buckets with the same object names in each.

    use super::*;

    pub const BUCKET_A: &str = "alpha";
    pub const BUCKET_B: &str = "beta";
    pub const OBJECT_A: &str = "foo/a";
    pub const OBJECT_B: &str = "foo/b";
    pub const OBJECT_C: &str = "foo/c";

    /// Metadata written on every fixture object.
    pub fn test_metadata() -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("test_key".to_string(), vec![2]);
        metadata
    }

    pub fn object_options() -> CreateObjectOptions {
        CreateObjectOptions::new(true, Some("text/plain".to_string()), test_metadata(), false)
    }

    pub fn item_id(bucket: &str, object: &str) -> ResourceId {
        ResourceId::object(bucket, object)
    }

    /// Buckets A and B, each holding objects A and B. Recorded calls are
    /// cleared so tests only see their own.
    pub fn populated_storage() -> RecordingStorage {
        let storage = RecordingStorage::new();
        for bucket in [BUCKET_A, BUCKET_B] {
            storage
                .create_bucket(bucket, &CreateBucketOptions::new("us-central1", "STANDARD"))
                .expect("fixture setup failed");
            storage
                .create_empty_objects(
                    &[item_id(bucket, OBJECT_A), item_id(bucket, OBJECT_B)],
                    &object_options(),
                )
                .expect("fixture setup failed");
        }
        storage.clear_calls();
        storage
    }

    /// [`populated_storage`] behind a caching decorator with default settings.
    pub fn caching_storage() -> PerformanceCachingStorage<RecordingStorage> {
        caching_storage_with(&CacheConfig::default())
    }

    /// [`populated_storage`] behind a caching decorator built from `config`.
    pub fn caching_storage_with(config: &CacheConfig) -> PerformanceCachingStorage<RecordingStorage> {
        PerformanceCachingStorage::with_config(populated_storage(), config)
            .expect("invalid cache config for fixture")
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Item-info assertions based on [`ItemInfo::is_equivalent`].

    use super::*;

    /// Assert two infos describe the same resource with the same attributes.
    pub fn assert_item_info_eq(actual: &ItemInfo, expected: &ItemInfo) {
        assert!(
            actual.is_equivalent(expected),
            "Item infos differ:\n  actual:   {:?}\n  expected: {:?}",
            actual,
            expected
        );
    }

    /// Assert both lists hold equivalent infos, one for one, in the same order.
    pub fn assert_item_infos_eq(actual: &[ItemInfo], expected: &[ItemInfo]) {
        assert_eq!(actual.len(), expected.len(), "Item info counts differ");
        for (a, e) in actual.iter().zip(expected) {
            assert_item_info_eq(a, e);
        }
    }

    /// Assert both lists hold equivalent infos, one for one, in any order.
    pub fn assert_contains_in_any_order(actual: &[ItemInfo], expected: &[ItemInfo]) {
        assert_eq!(actual.len(), expected.len(), "Item info counts differ");
        let mut unmatched: Vec<&ItemInfo> = actual.iter().collect();
        for e in expected {
            match unmatched.iter().position(|a| a.is_equivalent(e)) {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => panic!("No equivalent of {:?} in {:?}", e, actual),
            }
        }
    }

    /// Assert the cache holds an entry for `id`.
    pub fn assert_cached<C: ExpiringCache>(cache: &C, id: &ResourceId) {
        assert!(
            cache.get_if_present(id).is_some(),
            "Expected {} to be cached",
            id
        );
    }

    /// Assert the cache holds no entry for `id`.
    pub fn assert_not_cached<C: ExpiringCache>(cache: &C, id: &ResourceId) {
        assert!(
            cache.get_if_present(id).is_none(),
            "Expected {} not to be cached",
            id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_recording_storage_records_and_forwards() {
        let storage = populated_storage();
        let info = storage.get_item_info(&item_id(BUCKET_A, OBJECT_A)).unwrap();

        assert!(info.exists());
        assert_eq!(
            storage.calls(),
            vec![RecordedCall::GetItemInfo(item_id(BUCKET_A, OBJECT_A))]
        );
    }

    #[test]
    fn test_fail_next_fails_once() {
        let storage = populated_storage();
        storage.fail_next(StorageError::Backend {
            reason: "boom".to_string(),
        });

        assert!(storage.list_bucket_names().is_err());
        assert_eq!(storage.list_bucket_names().unwrap(), vec![BUCKET_A, BUCKET_B]);
        assert_eq!(storage.call_count(), 2);
    }

    #[test]
    fn test_wrapping_uses_inner_clock() {
        let clock = bucketcache_storage::FixedClock::epoch();
        let storage =
            RecordingStorage::wrapping(InMemoryStorage::with_clock(std::sync::Arc::new(clock)));
        storage
            .create_bucket(BUCKET_A, &CreateBucketOptions::default())
            .unwrap();

        let info = storage.get_item_info(&ResourceId::bucket(BUCKET_A)).unwrap();
        assert_eq!(info.creation_time, Some(clock.0));
        assert_eq!(storage.call_count(), 2);
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
