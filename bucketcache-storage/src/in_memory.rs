//! In-memory storage backend.
//!
//! Keeps buckets and objects in process memory. Used for development, tests
//! and as the delegate behind the caching layer in examples. Behaves like a
//! strongly consistent remote store: every call observes all earlier writes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bucketcache_core::{
    compute_content_hash, validate_bucket_name, validate_object_name, BucketCacheError,
    BucketCacheResult, ComposeOptions, CreateBucketOptions, CreateObjectOptions, ItemInfo,
    ListOptions, Metadata, ResourceId, StorageError, Timestamp, UpdatableItemInfo,
};
use chrono::{DateTime, Utc};

use crate::StorageBackend;

/// Upper bound on the number of sources one compose accepts.
pub const MAX_COMPOSE_SOURCES: usize = 32;

// ============================================================================
// CLOCKS
// ============================================================================

/// Source of creation and modification timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock stuck at one instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl FixedClock {
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
    info: ItemInfo,
    content: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredBucket {
    info: ItemInfo,
    objects: BTreeMap<String, StoredObject>,
}

type Buckets = BTreeMap<String, StoredBucket>;

/// One listing result before it is rendered as a name or an info.
enum Listed<'a> {
    Object(&'a StoredObject),
    Prefix(String),
}

/// In-memory object store.
#[derive(Debug)]
pub struct InMemoryStorage {
    buckets: RwLock<Buckets>,
    closed: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Create an empty store using wall-clock timestamps.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping items with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(Buckets::new()),
            closed: AtomicBool::new(false),
            clock,
        }
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> BucketCacheResult<usize> {
        Ok(self.read()?.len())
    }

    /// Number of objects in `bucket_name`.
    pub fn object_count(&self, bucket_name: &str) -> BucketCacheResult<usize> {
        let buckets = self.read()?;
        Ok(bucket_ref(&buckets, bucket_name)?.objects.len())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> BucketCacheResult<()> {
        if self.is_closed() {
            return Err(StorageError::Closed.into());
        }
        Ok(())
    }

    fn read(&self) -> BucketCacheResult<RwLockReadGuard<'_, Buckets>> {
        self.ensure_open()?;
        self.buckets
            .read()
            .map_err(|_| BucketCacheError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> BucketCacheResult<RwLockWriteGuard<'_, Buckets>> {
        self.ensure_open()?;
        self.buckets
            .write()
            .map_err(|_| BucketCacheError::Storage(StorageError::LockPoisoned))
    }

    fn store_object(
        &self,
        buckets: &mut Buckets,
        resource_id: &ResourceId,
        content: Vec<u8>,
        content_type: Option<String>,
        metadata: Metadata,
        overwrite_existing: bool,
    ) -> BucketCacheResult<ItemInfo> {
        let name = object_name(resource_id)?;
        validate_object_name(name)?;
        let bucket = bucket_mut(buckets, resource_id.bucket_name())?;

        let previous_generation = match bucket.objects.get(name) {
            Some(_) if !overwrite_existing => {
                return Err(StorageError::AlreadyExists {
                    resource: resource_id.clone(),
                }
                .into());
            }
            Some(existing) => existing.info.content_generation,
            None => 0,
        };

        let now = self.clock.now();
        let mut info = ItemInfo::object(
            resource_id.clone(),
            now,
            now,
            content.len() as u64,
            content_type,
            metadata,
        );
        info.content_generation = previous_generation + 1;
        info.content_hash = Some(compute_content_hash(&content));

        bucket.objects.insert(
            name.to_string(),
            StoredObject {
                info: info.clone(),
                content,
            },
        );
        Ok(info)
    }

    fn create_empty_in(
        &self,
        buckets: &mut Buckets,
        resource_id: &ResourceId,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        if options.ensure_empty_objects_metadata_match && !options.overwrite_existing {
            if let Some(existing) = find_object(buckets, resource_id) {
                if existing.content.is_empty()
                    && existing.info.content_type == options.content_type
                    && existing.info.metadata == options.metadata
                {
                    return Ok(());
                }
            }
        }

        self.store_object(
            buckets,
            resource_id,
            Vec::new(),
            options.content_type.clone(),
            options.metadata.clone(),
            options.overwrite_existing,
        )
        .map(|_| ())
    }
}

fn not_found(resource_id: &ResourceId) -> BucketCacheError {
    StorageError::NotFound {
        resource: resource_id.clone(),
    }
    .into()
}

fn object_name(resource_id: &ResourceId) -> BucketCacheResult<&str> {
    resource_id.object_name().ok_or_else(|| {
        StorageError::InvalidArgument {
            reason: format!("{} does not name an object", resource_id),
        }
        .into()
    })
}

fn bucket_ref<'a>(buckets: &'a Buckets, bucket_name: &str) -> BucketCacheResult<&'a StoredBucket> {
    buckets
        .get(bucket_name)
        .ok_or_else(|| not_found(&ResourceId::bucket(bucket_name)))
}

fn bucket_mut<'a>(
    buckets: &'a mut Buckets,
    bucket_name: &str,
) -> BucketCacheResult<&'a mut StoredBucket> {
    buckets
        .get_mut(bucket_name)
        .ok_or_else(|| not_found(&ResourceId::bucket(bucket_name)))
}

fn find_object<'a>(buckets: &'a Buckets, resource_id: &ResourceId) -> Option<&'a StoredObject> {
    buckets
        .get(resource_id.bucket_name())?
        .objects
        .get(resource_id.object_name()?)
}

fn find_object_mut<'a>(
    buckets: &'a mut Buckets,
    resource_id: &ResourceId,
) -> Option<&'a mut StoredObject> {
    buckets
        .get_mut(resource_id.bucket_name())?
        .objects
        .get_mut(resource_id.object_name()?)
}

fn lookup(buckets: &Buckets, resource_id: &ResourceId) -> ItemInfo {
    if resource_id.is_root() {
        return ItemInfo::inferred_directory(ResourceId::root());
    }

    let found = match resource_id.object_name() {
        None => buckets.get(resource_id.bucket_name()).map(|b| b.info.clone()),
        Some(_) => find_object(buckets, resource_id).map(|o| o.info.clone()),
    };
    found.unwrap_or_else(|| ItemInfo::not_found(resource_id.clone()))
}

fn list_entries<'a>(bucket: &'a StoredBucket, options: &ListOptions) -> Vec<Listed<'a>> {
    let prefix = options.prefix.as_deref().unwrap_or("");
    let delimiter = options.delimiter.as_deref().filter(|d| !d.is_empty());
    let limit = options.limit();

    let mut listed = Vec::new();
    let mut seen_prefixes = BTreeSet::new();

    for (name, object) in bucket.objects.iter().filter(|(n, _)| n.starts_with(prefix)) {
        if limit.is_some_and(|limit| listed.len() >= limit) {
            break;
        }

        let rest = &name[prefix.len()..];
        let directory = delimiter
            .and_then(|d| rest.find(d).map(|i| format!("{}{}", prefix, &rest[..i + d.len()])));

        match directory {
            Some(directory) if directory != *name => {
                if seen_prefixes.insert(directory.clone()) {
                    listed.push(Listed::Prefix(directory));
                }
            }
            _ => {
                // A placeholder object named like a prefix stands in for it.
                if seen_prefixes.insert(name.clone()) {
                    listed.push(Listed::Object(object));
                }
            }
        }
    }

    listed
}

impl StorageBackend for InMemoryStorage {
    fn create_bucket(
        &self,
        bucket_name: &str,
        options: &CreateBucketOptions,
    ) -> BucketCacheResult<()> {
        validate_bucket_name(bucket_name)?;
        let mut buckets = self.write()?;
        if buckets.contains_key(bucket_name) {
            return Err(StorageError::AlreadyExists {
                resource: ResourceId::bucket(bucket_name),
            }
            .into());
        }

        let info = ItemInfo::bucket(
            bucket_name,
            self.clock.now(),
            options.location.clone(),
            options.storage_class.clone(),
        );
        buckets.insert(
            bucket_name.to_string(),
            StoredBucket {
                info,
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn create_empty_object(
        &self,
        resource_id: &ResourceId,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        let mut buckets = self.write()?;
        self.create_empty_in(&mut buckets, resource_id, options)
    }

    fn create_empty_objects(
        &self,
        resource_ids: &[ResourceId],
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        let mut buckets = self.write()?;
        for resource_id in resource_ids {
            self.create_empty_in(&mut buckets, resource_id, options)?;
        }
        Ok(())
    }

    fn write_object(
        &self,
        resource_id: &ResourceId,
        content: Vec<u8>,
        options: &CreateObjectOptions,
    ) -> BucketCacheResult<()> {
        let mut buckets = self.write()?;
        self.store_object(
            &mut buckets,
            resource_id,
            content,
            options.content_type.clone(),
            options.metadata.clone(),
            options.overwrite_existing,
        )
        .map(|_| ())
    }

    fn read_object(&self, resource_id: &ResourceId) -> BucketCacheResult<Vec<u8>> {
        let buckets = self.read()?;
        find_object(&buckets, resource_id)
            .map(|object| object.content.clone())
            .ok_or_else(|| not_found(resource_id))
    }

    fn copy(
        &self,
        src_bucket_name: &str,
        src_object_names: &[String],
        dst_bucket_name: &str,
        dst_object_names: &[String],
    ) -> BucketCacheResult<()> {
        if src_object_names.len() != dst_object_names.len() {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "copy needs one destination per source, got {} sources and {} destinations",
                    src_object_names.len(),
                    dst_object_names.len()
                ),
            }
            .into());
        }

        let mut buckets = self.write()?;
        bucket_ref(&buckets, dst_bucket_name)?;
        let src_bucket = bucket_ref(&buckets, src_bucket_name)?;

        let mut staged = Vec::with_capacity(src_object_names.len());
        for (src_name, dst_name) in src_object_names.iter().zip(dst_object_names) {
            if src_bucket_name == dst_bucket_name && src_name == dst_name {
                return Err(StorageError::InvalidArgument {
                    reason: format!("cannot copy gs://{}/{} onto itself", src_bucket_name, src_name),
                }
                .into());
            }
            let object = src_bucket
                .objects
                .get(src_name)
                .ok_or_else(|| not_found(&ResourceId::object(src_bucket_name, src_name.as_str())))?;
            staged.push((
                ResourceId::object(dst_bucket_name, dst_name.as_str()),
                object.content.clone(),
                object.info.content_type.clone(),
                object.info.metadata.clone(),
            ));
        }

        for (destination, content, content_type, metadata) in staged {
            self.store_object(&mut buckets, &destination, content, content_type, metadata, true)?;
        }
        Ok(())
    }

    fn delete_buckets(&self, bucket_names: &[String]) -> BucketCacheResult<()> {
        let mut buckets = self.write()?;
        for name in bucket_names {
            bucket_ref(&buckets, name)?;
        }
        for name in bucket_names {
            buckets.remove(name);
        }
        Ok(())
    }

    fn delete_objects(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<()> {
        let mut buckets = self.write()?;
        for resource_id in resource_ids {
            if find_object(&buckets, resource_id).is_none() {
                return Err(not_found(resource_id));
            }
        }
        for resource_id in resource_ids {
            if let (Some(bucket), Some(name)) = (
                buckets.get_mut(resource_id.bucket_name()),
                resource_id.object_name(),
            ) {
                bucket.objects.remove(name);
            }
        }
        Ok(())
    }

    fn list_bucket_names(&self) -> BucketCacheResult<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn list_bucket_info(&self) -> BucketCacheResult<Vec<ItemInfo>> {
        Ok(self.read()?.values().map(|b| b.info.clone()).collect())
    }

    fn list_object_names(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<String>> {
        let buckets = self.read()?;
        let Some(bucket) = buckets.get(bucket_name) else {
            return Ok(Vec::new());
        };

        Ok(list_entries(bucket, options)
            .into_iter()
            .map(|listed| match listed {
                Listed::Object(object) => object
                    .info
                    .resource_id
                    .object_name()
                    .unwrap_or_default()
                    .to_string(),
                Listed::Prefix(prefix) => prefix,
            })
            .collect())
    }

    fn list_object_info(
        &self,
        bucket_name: &str,
        options: &ListOptions,
    ) -> BucketCacheResult<Vec<ItemInfo>> {
        let buckets = self.read()?;
        let Some(bucket) = buckets.get(bucket_name) else {
            return Ok(Vec::new());
        };

        Ok(list_entries(bucket, options)
            .into_iter()
            .map(|listed| match listed {
                Listed::Object(object) => object.info.clone(),
                Listed::Prefix(prefix) => {
                    ItemInfo::inferred_directory(ResourceId::object(bucket_name, prefix))
                }
            })
            .collect())
    }

    fn get_item_info(&self, resource_id: &ResourceId) -> BucketCacheResult<ItemInfo> {
        let buckets = self.read()?;
        Ok(lookup(&buckets, resource_id))
    }

    fn get_item_infos(&self, resource_ids: &[ResourceId]) -> BucketCacheResult<Vec<ItemInfo>> {
        let buckets = self.read()?;
        Ok(resource_ids.iter().map(|id| lookup(&buckets, id)).collect())
    }

    fn update_items(&self, updates: &[UpdatableItemInfo]) -> BucketCacheResult<Vec<ItemInfo>> {
        let mut buckets = self.write()?;
        for update in updates {
            if find_object(&buckets, &update.resource_id).is_none() {
                return Err(not_found(&update.resource_id));
            }
        }

        let now = self.clock.now();
        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            let object = find_object_mut(&mut buckets, &update.resource_id)
                .ok_or_else(|| not_found(&update.resource_id))?;
            for (key, value) in &update.metadata {
                match value {
                    Some(value) => {
                        object.info.metadata.insert(key.clone(), value.clone());
                    }
                    None => {
                        object.info.metadata.remove(key);
                    }
                }
            }
            object.info.meta_generation += 1;
            object.info.modification_time = Some(now);
            updated.push(object.info.clone());
        }
        Ok(updated)
    }

    fn compose_objects(
        &self,
        sources: &[ResourceId],
        destination: &ResourceId,
        options: &ComposeOptions,
    ) -> BucketCacheResult<ItemInfo> {
        if sources.is_empty() || sources.len() > MAX_COMPOSE_SOURCES {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "compose takes 1 to {} sources, got {}",
                    MAX_COMPOSE_SOURCES,
                    sources.len()
                ),
            }
            .into());
        }
        object_name(destination)?;
        if let Some(stray) = sources
            .iter()
            .find(|s| s.bucket_name() != destination.bucket_name())
        {
            return Err(StorageError::InvalidArgument {
                reason: format!(
                    "compose source {} is not in bucket {}",
                    stray,
                    destination.bucket_name()
                ),
            }
            .into());
        }

        let mut buckets = self.write()?;
        let mut content = Vec::new();
        for source in sources {
            let object = find_object(&buckets, source).ok_or_else(|| not_found(source))?;
            content.extend_from_slice(&object.content);
        }

        self.store_object(
            &mut buckets,
            destination,
            content,
            options.content_type.clone(),
            options.metadata.clone(),
            true,
        )
    }

    fn wait_for_bucket_empty(&self, bucket_name: &str) -> BucketCacheResult<()> {
        let buckets = self.read()?;
        if !bucket_ref(&buckets, bucket_name)?.objects.is_empty() {
            return Err(StorageError::BucketNotEmpty {
                bucket: bucket_name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn close(&self) -> BucketCacheResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Batch lookups always answer one entry per requested id, in order.
        #[test]
        fn prop_get_item_infos_matches_request_shape(
            names in proptest::collection::vec("[a-c]{1,2}", 0..12),
            stored in proptest::collection::btree_set("[a-c]{1,2}", 0..6),
        ) {
            let storage = InMemoryStorage::new();
            storage.create_bucket("b", &CreateBucketOptions::default()).unwrap();
            for name in &stored {
                storage
                    .create_empty_object(&ResourceId::object("b", name.as_str()), &CreateObjectOptions::default())
                    .unwrap();
            }

            let ids: Vec<ResourceId> = names.iter().map(|n| ResourceId::object("b", n.as_str())).collect();
            let infos = storage.get_item_infos(&ids).unwrap();

            prop_assert_eq!(infos.len(), ids.len());
            for (info, name) in infos.iter().zip(&names) {
                prop_assert_eq!(info.resource_id.object_name(), Some(name.as_str()));
                prop_assert_eq!(info.exists(), stored.contains(name));
            }
        }

        /// A listing never returns more than max_results entries.
        #[test]
        fn prop_listing_respects_limit(
            stored in proptest::collection::btree_set("[a-c/]{1,4}", 0..10),
            limit in 1u64..5,
        ) {
            let storage = InMemoryStorage::new();
            storage.create_bucket("b", &CreateBucketOptions::default()).unwrap();
            for name in &stored {
                storage
                    .create_empty_object(&ResourceId::object("b", name.as_str()), &CreateObjectOptions::default())
                    .unwrap();
            }

            let options = ListOptions::new().with_delimiter("/").with_max_results(limit);
            let infos = storage.list_object_info("b", &options).unwrap();
            prop_assert!(infos.len() as u64 <= limit);
        }
    }
}
