//! bucketcache Core - Storage Value Types
//!
//! Pure data structures shared by every other crate: resource identifiers,
//! item metadata snapshots, operation options, errors and configuration.
//! This crate contains no storage or caching logic.

pub mod config;
pub mod error;
pub mod identity;
pub mod item;
pub mod options;

pub use config::{CacheConfig, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_ENTRY_AGE};
pub use error::{
    BucketCacheError, BucketCacheResult, ConfigError, StorageError, ValidationError,
};
pub use identity::{
    compute_content_hash, validate_bucket_name, validate_object_name, ContentHash, ResourceId,
    Timestamp, SCHEME,
};
pub use item::{ItemInfo, Metadata, UpdatableItemInfo};
pub use options::{ComposeOptions, CreateBucketOptions, CreateObjectOptions, ListOptions};
