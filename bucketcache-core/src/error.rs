//! Error types for bucketcache operations

use crate::ResourceId;
use thiserror::Error;

/// Storage layer errors.
///
/// Everything a backend can fail with lands here. The caching layer never
/// produces one of these itself; it only passes them through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: ResourceId },

    #[error("Resource already exists: {resource}")]
    AlreadyExists { resource: ResourceId },

    #[error("Bucket not empty: {bucket}")]
    BucketNotEmpty { bucket: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage has been closed")]
    Closed,

    #[error("Blocking task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid resource URI {uri}: {reason}")]
    InvalidResourceUri { uri: String, reason: String },

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all bucketcache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BucketCacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for bucketcache operations.
pub type BucketCacheResult<T> = Result<T, BucketCacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            resource: ResourceId::object("bucket", "dir/file.txt"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Resource not found"));
        assert!(msg.contains("gs://bucket/dir/file.txt"));
    }

    #[test]
    fn test_storage_error_display_bucket_not_empty() {
        let err = StorageError::BucketNotEmpty {
            bucket: "logs".to_string(),
        };
        assert_eq!(format!("{}", err), "Bucket not empty: logs");
    }

    #[test]
    fn test_validation_error_display_invalid_uri() {
        let err = ValidationError::InvalidResourceUri {
            uri: "s3://nope".to_string(),
            reason: "scheme must be gs".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("s3://nope"));
        assert!(msg.contains("scheme must be gs"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "max_entries".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("max_entries"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_bucketcache_error_from_variants() {
        let storage = BucketCacheError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, BucketCacheError::Storage(_)));

        let validation = BucketCacheError::from(ValidationError::InvalidName {
            name: String::new(),
            reason: "empty".to_string(),
        });
        assert!(matches!(validation, BucketCacheError::Validation(_)));

        let config = BucketCacheError::from(ConfigError::Parse {
            reason: "bad toml".to_string(),
        });
        assert!(matches!(config, BucketCacheError::Config(_)));
    }

    #[test]
    fn test_storage_error_display_lock_poisoned() {
        let err = StorageError::LockPoisoned;
        assert_eq!(format!("{}", err), "Storage lock poisoned");
    }
}
