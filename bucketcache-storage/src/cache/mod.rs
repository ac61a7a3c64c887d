//! Item-info cache layer.
//!
//! [`ExpiringCache`] is the contract the decorator consumes, [`MokaItemCache`]
//! the default implementation, and [`PerformanceCachingStorage`] the
//! decorator that keeps metadata of a [`StorageBackend`](crate::StorageBackend)
//! consistent with the mutations routed through it.
//!
//! # Example
//!
//! ```
//! use bucketcache_core::{CacheConfig, CreateBucketOptions, ResourceId};
//! use bucketcache_storage::{InMemoryStorage, PerformanceCachingStorage, StorageBackend};
//!
//! let storage = PerformanceCachingStorage::with_config(InMemoryStorage::new(), &CacheConfig::default())?;
//! storage.create_bucket("logs", &CreateBucketOptions::default())?;
//!
//! // Second lookup is answered from the cache.
//! let first = storage.get_item_info(&ResourceId::bucket("logs"))?;
//! let second = storage.get_item_info(&ResourceId::bucket("logs"))?;
//! assert_eq!(first, second);
//! # Ok::<(), bucketcache_core::BucketCacheError>(())
//! ```

pub mod moka_backend;
pub mod performance;
pub mod traits;

pub use moka_backend::MokaItemCache;
pub use performance::PerformanceCachingStorage;
pub use traits::{CacheStats, ExpiringCache};
