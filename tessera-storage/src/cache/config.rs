//! Cache configuration.

use std::time::Duration;

use tessera_core::{SyncConfig, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL};

/// Configuration for [`super::Cache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub max_entries: usize,
    /// Lifetime of an entry, measured from insertion.
    pub ttl: Duration,
    /// Whether reads promote an entry to most-recently-used.
    pub update_age_on_get: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            ttl: DEFAULT_CACHE_TTL,
            update_age_on_get: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Enable or disable recency promotion on reads.
    pub fn with_update_age_on_get(mut self, enabled: bool) -> Self {
        self.update_age_on_get = enabled;
        self
    }
}

impl From<&SyncConfig> for CacheConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_entries: config.cache_max_entries,
            ttl: config.cache_ttl,
            update_age_on_get: config.cache_update_age_on_get,
        }
    }
}
