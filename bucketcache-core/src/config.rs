//! Configuration types

use serde::Deserialize;
use std::time::Duration;

use crate::{BucketCacheError, BucketCacheResult, ConfigError};

/// Default lifetime of a cached item info.
pub const DEFAULT_MAX_ENTRY_AGE: Duration = Duration::from_millis(5_000);

/// Default bound on the number of cached item infos.
pub const DEFAULT_MAX_ENTRIES: u64 = 5_000;

/// Settings for the item-info cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an entry stays observable after it was written.
    pub max_entry_age: Duration,
    /// Capacity bound; least valuable entries are evicted past it.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entry_age: DEFAULT_MAX_ENTRY_AGE,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// On-disk form: durations are written in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheConfigFile {
    max_entry_age_ms: Option<u64>,
    max_entries: Option<u64>,
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_max_entry_age(mut self, max_entry_age: Duration) -> Self {
        self.max_entry_age = max_entry_age;
        self
    }

    /// Set the capacity bound.
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(BucketCacheError::Config) if invalid.
    pub fn validate(&self) -> BucketCacheResult<()> {
        if self.max_entry_age.is_zero() {
            return Err(BucketCacheError::Config(ConfigError::InvalidValue {
                field: "max_entry_age".to_string(),
                value: format!("{:?}", self.max_entry_age),
                reason: "max_entry_age must be positive".to_string(),
            }));
        }

        if self.max_entries == 0 {
            return Err(BucketCacheError::Config(ConfigError::InvalidValue {
                field: "max_entries".to_string(),
                value: self.max_entries.to_string(),
                reason: "max_entries must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `BUCKETCACHE_MAX_ENTRY_AGE_MS`: entry TTL in milliseconds (default: 5000)
    /// - `BUCKETCACHE_MAX_ENTRIES`: capacity bound (default: 5000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            max_entry_age: lookup("BUCKETCACHE_MAX_ENTRY_AGE_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_entry_age),
            max_entries: lookup("BUCKETCACHE_MAX_ENTRIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
        }
    }

    /// Parse a TOML document. Missing keys fall back to defaults; the result
    /// is validated.
    ///
    /// ```toml
    /// max_entry_age_ms = 3000
    /// max_entries = 10000
    /// ```
    pub fn from_toml_str(source: &str) -> BucketCacheResult<Self> {
        let file: CacheConfigFile = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;

        let defaults = Self::default();
        let config = Self {
            max_entry_age: file
                .max_entry_age_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_entry_age),
            max_entries: file.max_entries.unwrap_or(defaults.max_entries),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_entry_age, Duration::from_secs(5));
        assert_eq!(config.max_entries, 5_000);
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_max_entry_age(Duration::from_millis(250))
            .with_max_entries(42);
        assert_eq!(config.max_entry_age, Duration::from_millis(250));
        assert_eq!(config.max_entries, 42);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_age = CacheConfig::new().with_max_entry_age(Duration::ZERO);
        assert!(matches!(
            zero_age.validate(),
            Err(BucketCacheError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "max_entry_age"
        ));

        let zero_entries = CacheConfig::new().with_max_entries(0);
        assert!(matches!(
            zero_entries.validate(),
            Err(BucketCacheError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "max_entries"
        ));
    }

    #[test]
    fn test_from_lookup_overrides_and_falls_back() {
        let vars: HashMap<&str, &str> = [
            ("BUCKETCACHE_MAX_ENTRY_AGE_MS", "1500"),
            ("BUCKETCACHE_MAX_ENTRIES", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = CacheConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_entry_age, Duration::from_millis(1500));
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn test_from_toml_str() {
        let config = CacheConfig::from_toml_str("max_entry_age_ms = 3000\nmax_entries = 10\n").unwrap();
        assert_eq!(config.max_entry_age, Duration::from_secs(3));
        assert_eq!(config.max_entries, 10);

        let empty = CacheConfig::from_toml_str("").unwrap();
        assert_eq!(empty, CacheConfig::default());
    }

    #[test]
    fn test_from_toml_str_errors() {
        assert!(matches!(
            CacheConfig::from_toml_str("max_entries = \"many\""),
            Err(BucketCacheError::Config(ConfigError::Parse { .. }))
        ));
        assert!(matches!(
            CacheConfig::from_toml_str("unknown = 1"),
            Err(BucketCacheError::Config(ConfigError::Parse { .. }))
        ));
        assert!(matches!(
            CacheConfig::from_toml_str("max_entries = 0"),
            Err(BucketCacheError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
