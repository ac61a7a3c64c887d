//! Item metadata snapshots

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ContentHash, ResourceId, Timestamp};

/// User metadata attached to an object. Values are raw bytes.
pub type Metadata = BTreeMap<String, Vec<u8>>;

/// Snapshot of a bucket's or object's metadata as reported by a backend.
///
/// Only backends build these. A resource that does not exist is reported
/// with [`ItemInfo::not_found`], which keeps `exists == false` and every
/// attribute empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub resource_id: ResourceId,
    pub exists: bool,
    pub creation_time: Option<Timestamp>,
    pub modification_time: Option<Timestamp>,
    /// Object size in bytes; always zero for buckets.
    pub size: u64,
    /// Bucket location.
    pub location: Option<String>,
    /// Bucket storage class.
    pub storage_class: Option<String>,
    pub content_type: Option<String>,
    pub metadata: Metadata,
    pub content_generation: i64,
    pub meta_generation: i64,
    pub content_hash: Option<ContentHash>,
}

impl ItemInfo {
    /// The "not found" sentinel for `resource_id`.
    pub fn not_found(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            exists: false,
            creation_time: None,
            modification_time: None,
            size: 0,
            location: None,
            storage_class: None,
            content_type: None,
            metadata: Metadata::new(),
            content_generation: 0,
            meta_generation: 0,
            content_hash: None,
        }
    }

    /// Info for an existing bucket.
    pub fn bucket(
        bucket_name: impl Into<String>,
        creation_time: Timestamp,
        location: Option<String>,
        storage_class: Option<String>,
    ) -> Self {
        Self {
            exists: true,
            creation_time: Some(creation_time),
            modification_time: Some(creation_time),
            location,
            storage_class,
            ..Self::not_found(ResourceId::bucket(bucket_name))
        }
    }

    /// Info for an existing object.
    pub fn object(
        resource_id: ResourceId,
        creation_time: Timestamp,
        modification_time: Timestamp,
        size: u64,
        content_type: Option<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            exists: true,
            creation_time: Some(creation_time),
            modification_time: Some(modification_time),
            size,
            content_type,
            metadata,
            content_generation: 1,
            meta_generation: 1,
            ..Self::not_found(resource_id)
        }
    }

    /// Info for a directory that only exists because objects share its prefix.
    pub fn inferred_directory(resource_id: ResourceId) -> Self {
        Self {
            exists: true,
            ..Self::not_found(resource_id)
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_bucket(&self) -> bool {
        self.resource_id.is_bucket()
    }

    pub fn is_object(&self) -> bool {
        self.resource_id.is_object()
    }

    /// Object names ending in `/` are treated as directories.
    pub fn is_directory(&self) -> bool {
        self.resource_id
            .object_name()
            .is_some_and(|name| name.ends_with('/'))
    }

    /// Hex form of the content hash, if the backend computed one.
    pub fn content_hash_hex(&self) -> Option<String> {
        self.content_hash.map(hex::encode)
    }

    /// Byte-wise metadata comparison.
    pub fn metadata_equals(&self, other: &Metadata) -> bool {
        self.metadata == *other
    }

    /// Equivalence used when comparing snapshots taken at different times.
    ///
    /// Size, timestamps, generations and content hash are assigned by the
    /// backend and may differ between fetches of the same resource, so only
    /// resource id, location, storage class, content type and metadata count.
    pub fn is_equivalent(&self, other: &ItemInfo) -> bool {
        self.resource_id == other.resource_id
            && self.location == other.location
            && self.storage_class == other.storage_class
            && self.content_type == other.content_type
            && self.metadata_equals(&other.metadata)
    }
}

/// Metadata patch for one object, consumed by `update_items`.
///
/// A `None` value removes the key; `Some` sets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatableItemInfo {
    pub resource_id: ResourceId,
    pub metadata: BTreeMap<String, Option<Vec<u8>>>,
}

impl UpdatableItemInfo {
    pub fn new(resource_id: ResourceId, metadata: BTreeMap<String, Option<Vec<u8>>>) -> Self {
        Self {
            resource_id,
            metadata,
        }
    }

    /// Patch that only sets keys.
    pub fn setting(resource_id: ResourceId, metadata: &Metadata) -> Self {
        Self::new(
            resource_id,
            metadata
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn epoch() -> Timestamp {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    fn sample_object() -> ItemInfo {
        let mut metadata = Metadata::new();
        metadata.insert("test_key".to_string(), vec![2]);
        ItemInfo::object(
            ResourceId::object("bucket", "obj"),
            epoch(),
            epoch(),
            10,
            Some("text/plain".to_string()),
            metadata,
        )
    }

    #[test]
    fn test_not_found_sentinel() {
        let info = ItemInfo::not_found(ResourceId::object("b", "o"));
        assert!(!info.exists());
        assert!(info.metadata.is_empty());
        assert!(info.creation_time.is_none());
    }

    #[test]
    fn test_bucket_info() {
        let info = ItemInfo::bucket(
            "b",
            epoch(),
            Some("us-east1".to_string()),
            Some("STANDARD".to_string()),
        );
        assert!(info.exists());
        assert!(info.is_bucket());
        assert_eq!(info.size, 0);
        assert_eq!(info.location.as_deref(), Some("us-east1"));
    }

    #[test]
    fn test_equivalence_ignores_size_and_times() {
        let a = sample_object();
        let mut b = a.clone();
        b.size = 999;
        b.modification_time = Some(epoch() + Duration::hours(1));
        b.content_generation = 7;
        b.content_hash = Some([1u8; 32]);

        assert_ne!(a, b);
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_equivalence_respects_content_type_and_metadata() {
        let a = sample_object();

        let mut other_type = a.clone();
        other_type.content_type = Some("image/png".to_string());
        assert!(!a.is_equivalent(&other_type));

        let mut other_meta = a.clone();
        other_meta.metadata.insert("test_key".to_string(), vec![3]);
        assert!(!a.is_equivalent(&other_meta));

        let mut other_id = a.clone();
        other_id.resource_id = ResourceId::object("bucket", "other");
        assert!(!a.is_equivalent(&other_id));
    }

    #[test]
    fn test_is_directory() {
        assert!(ItemInfo::inferred_directory(ResourceId::object("b", "dir/")).is_directory());
        assert!(!sample_object().is_directory());
    }

    #[test]
    fn test_content_hash_hex() {
        let mut info = sample_object();
        assert!(info.content_hash_hex().is_none());
        info.content_hash = Some([0xab; 32]);
        assert_eq!(info.content_hash_hex().unwrap(), "ab".repeat(32));
    }

    #[test]
    fn test_serde_json_preserves_snapshot() {
        let mut info = sample_object();
        info.content_hash = Some([7u8; 32]);
        let json = serde_json::to_string(&info).unwrap();
        let back: ItemInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn test_updatable_item_info_setting() {
        let info = sample_object();
        let update = UpdatableItemInfo::setting(info.resource_id.clone(), &info.metadata);
        assert_eq!(update.metadata.get("test_key"), Some(&Some(vec![2])));
    }
}
