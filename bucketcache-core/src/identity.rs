//! Identity types for buckets and objects

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{BucketCacheResult, ValidationError};

/// URI scheme used when rendering and parsing resource ids.
pub const SCHEME: &str = "gs";

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash of an object's bytes.
pub type ContentHash = [u8; 32];

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Identifies a bucket, or an object inside a bucket.
///
/// Bucket ids and object ids live in the same key space: a bucket id has no
/// object name, so `gs://a` and `gs://a/b` can never compare equal. The root
/// id (empty bucket, no object) names the whole namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    bucket_name: String,
    object_name: Option<String>,
}

impl ResourceId {
    /// The root of the namespace.
    pub fn root() -> Self {
        Self {
            bucket_name: String::new(),
            object_name: None,
        }
    }

    /// Id of a bucket.
    pub fn bucket(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: None,
        }
    }

    /// Id of an object inside `bucket_name`.
    pub fn object(bucket_name: impl Into<String>, object_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            object_name: Some(object_name.into()),
        }
    }

    /// Parse a `gs://bucket[/object]` URI.
    ///
    /// A trailing slash after the bucket (`gs://bucket/`) yields the bucket id.
    pub fn parse(uri: &str) -> BucketCacheResult<Self> {
        let prefix = format!("{}://", SCHEME);
        let rest = uri.strip_prefix(&prefix).ok_or_else(|| {
            ValidationError::InvalidResourceUri {
                uri: uri.to_string(),
                reason: format!("scheme must be {}", SCHEME),
            }
        })?;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        match rest.split_once('/') {
            None => Ok(Self::bucket(rest)),
            Some(("", _)) => Err(ValidationError::InvalidResourceUri {
                uri: uri.to_string(),
                reason: "object name given without a bucket".to_string(),
            }
            .into()),
            Some((bucket, "")) => Ok(Self::bucket(bucket)),
            Some((bucket, object)) => Ok(Self::object(bucket, object)),
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn object_name(&self) -> Option<&str> {
        self.object_name.as_deref()
    }

    /// True for the namespace root.
    pub fn is_root(&self) -> bool {
        self.bucket_name.is_empty() && self.object_name.is_none()
    }

    /// True when this names a bucket rather than an object.
    pub fn is_bucket(&self) -> bool {
        !self.bucket_name.is_empty() && self.object_name.is_none()
    }

    /// True when this names an object.
    pub fn is_object(&self) -> bool {
        self.object_name.is_some()
    }

    /// True when this id lives in `bucket_name`, bucket entry included.
    pub fn belongs_to_bucket(&self, bucket_name: &str) -> bool {
        !self.is_root() && self.bucket_name == bucket_name
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object_name {
            Some(object) => write!(f, "{}://{}/{}", SCHEME, self.bucket_name, object),
            None => write!(f, "{}://{}", SCHEME, self.bucket_name),
        }
    }
}

/// Check that a bucket name is usable.
pub fn validate_bucket_name(name: &str) -> BucketCacheResult<()> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "bucket name must not be empty".to_string(),
        }
        .into());
    }
    if name.contains('/') {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "bucket name must not contain '/'".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Check that an object name is usable.
pub fn validate_object_name(name: &str) -> BucketCacheResult<()> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "object name must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Rendering an id and parsing it back yields the same key.
        #[test]
        fn prop_display_parse_identity(
            bucket in "[a-z0-9][a-z0-9_.-]{0,20}",
            object in proptest::option::of("[a-zA-Z0-9_./-]{0,30}[a-zA-Z0-9_.-]"),
        ) {
            let id = match object {
                Some(object) => ResourceId::object(bucket, object),
                None => ResourceId::bucket(bucket),
            };
            let parsed = ResourceId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed, id);
        }

        /// A bucket id never equals an object id in the same bucket.
        #[test]
        fn prop_bucket_never_equals_object(
            bucket in "[a-z]{1,10}",
            object in ".{0,10}",
        ) {
            prop_assert_ne!(ResourceId::bucket(bucket.clone()), ResourceId::object(bucket, object));
        }
    }
}
