//! Option types accepted by storage operations

use serde::{Deserialize, Serialize};

use crate::Metadata;

/// Attributes of a bucket being created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBucketOptions {
    pub location: Option<String>,
    pub storage_class: Option<String>,
}

impl CreateBucketOptions {
    pub fn new(location: impl Into<String>, storage_class: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            storage_class: Some(storage_class.into()),
        }
    }
}

/// Attributes of an object being created or overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateObjectOptions {
    pub overwrite_existing: bool,
    pub content_type: Option<String>,
    pub metadata: Metadata,
    /// When an empty object already exists, accept it if its metadata matches
    /// instead of failing with `AlreadyExists`.
    pub ensure_empty_objects_metadata_match: bool,
}

impl Default for CreateObjectOptions {
    fn default() -> Self {
        Self {
            overwrite_existing: true,
            content_type: None,
            metadata: Metadata::new(),
            ensure_empty_objects_metadata_match: false,
        }
    }
}

impl CreateObjectOptions {
    pub fn new(
        overwrite_existing: bool,
        content_type: Option<String>,
        metadata: Metadata,
        ensure_empty_objects_metadata_match: bool,
    ) -> Self {
        Self {
            overwrite_existing,
            content_type,
            metadata,
            ensure_empty_objects_metadata_match,
        }
    }
}

/// Attributes applied to the destination of a compose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOptions {
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

/// Filters for object listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub prefix: Option<String>,
    /// Names containing the delimiter after the prefix are collapsed into one
    /// directory-style entry ending at the delimiter.
    pub delimiter: Option<String>,
    /// Upper bound on returned entries; `None` or `Some(0)` means unlimited.
    pub max_results: Option<u64>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_max_results(mut self, max_results: u64) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Effective limit, `None` when unlimited.
    pub fn limit(&self) -> Option<usize> {
        match self.max_results {
            None | Some(0) => None,
            Some(n) => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_options_limit() {
        assert_eq!(ListOptions::new().limit(), None);
        assert_eq!(ListOptions::new().with_max_results(0).limit(), None);
        assert_eq!(ListOptions::new().with_max_results(3).limit(), Some(3));
    }

    #[test]
    fn test_create_object_options_default_overwrites() {
        let options = CreateObjectOptions::default();
        assert!(options.overwrite_existing);
        assert!(options.metadata.is_empty());
    }
}
