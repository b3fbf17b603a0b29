//! Bounded TTL + LRU store.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tessera_core::{CacheError, Clock, SystemClock, TesseraError, TesseraResult, Timestamp};
use tracing::debug;

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::traits::CacheStats;

/// Bounded key/value cache with per-entry expiration.
///
/// All operations take `&self`; the table is guarded by a single mutex that
/// is never held across an `.await`. Share it behind an `Arc`.
pub struct Cache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
{
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone,
{
    /// Create a cache reading time from the system clock.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidCapacity`] for a zero capacity and
    /// [`CacheError::InvalidTtl`] for a zero TTL.
    pub fn new(config: CacheConfig) -> TesseraResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> TesseraResult<Self> {
        let capacity = NonZeroUsize::new(config.max_entries).ok_or(CacheError::InvalidCapacity {
            max: config.max_entries,
        })?;
        if config.ttl.is_zero() {
            return Err(CacheError::InvalidTtl.into());
        }

        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            clock,
        })
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock(&self) -> TesseraResult<MutexGuard<'_, LruCache<K, CacheEntry<V>>>> {
        self.entries
            .lock()
            .map_err(|_| TesseraError::Cache(CacheError::LockPoisoned))
    }

    /// Get the live value for `key`.
    ///
    /// Expired entries are dropped and reported as absent. When
    /// `update_age_on_get` is set the entry becomes most-recently-used.
    pub fn get(&self, key: &K) -> TesseraResult<Option<V>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        if !Self::take_live(&mut entries, key, self.config.ttl, now) {
            return Ok(None);
        }

        if self.config.update_age_on_get {
            Ok(entries.get_mut(key).map(|entry| {
                entry.touch(now);
                entry.value().clone()
            }))
        } else {
            Ok(entries.peek(key).map(|entry| entry.value().clone()))
        }
    }

    /// Return the cached value if live, otherwise run `loader` once and cache
    /// its result.
    ///
    /// A loader error is returned as-is and leaves the cache untouched.
    /// Concurrent misses for the same key are not coalesced.
    pub async fn get_or_load<F, Fut, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<TesseraError>,
    {
        if let Some(value) = self.get(&key)? {
            return Ok(value);
        }

        match loader().await {
            Ok(value) => {
                self.set(key, value.clone())?;
                Ok(value)
            }
            Err(e) => {
                debug!(key = ?key, "Cache loader failed; result not cached");
                Err(e)
            }
        }
    }

    /// Insert or replace `key`.
    ///
    /// Inserting a new key into a full cache drops expired entries first and
    /// then evicts the least-recently-used entry if still needed.
    pub fn set(&self, key: K, value: V) -> TesseraResult<()> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            Self::purge_expired(&mut entries, self.config.ttl, now);
        }

        if let Some((evicted, _)) = entries.push(key.clone(), CacheEntry::new(value, now)) {
            if evicted != key {
                debug!(key = ?evicted, "Evicted least-recently-used cache entry");
            }
        }
        Ok(())
    }

    /// Remove `key`. Returns true if a live entry was removed.
    pub fn invalidate(&self, key: &K) -> TesseraResult<bool> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        Ok(entries
            .pop(key)
            .map(|entry| entry.is_live(self.config.ttl, now))
            .unwrap_or(false))
    }

    /// Remove every entry.
    pub fn clear(&self) -> TesseraResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Presence check that respects TTL. Does not change recency.
    pub fn has(&self, key: &K) -> TesseraResult<bool> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        Ok(Self::take_live(&mut entries, key, self.config.ttl, now))
    }

    /// Occupancy snapshot. `size` counts live entries only.
    pub fn stats(&self) -> TesseraResult<CacheStats> {
        let now = self.clock.now();
        let entries = self.lock()?;
        let size = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(self.config.ttl, now))
            .count();
        Ok(CacheStats {
            size,
            max_size: self.config.max_entries,
            ttl: self.config.ttl,
        })
    }

    /// True if `key` is present and live; drops it if present but expired.
    fn take_live(
        entries: &mut LruCache<K, CacheEntry<V>>,
        key: &K,
        ttl: Duration,
        now: Timestamp,
    ) -> bool {
        match entries.peek(key).map(|entry| entry.is_live(ttl, now)) {
            Some(true) => true,
            Some(false) => {
                entries.pop(key);
                debug!(key = ?key, "Dropped expired cache entry");
                false
            }
            None => false,
        }
    }

    fn purge_expired(entries: &mut LruCache<K, CacheEntry<V>>, ttl: Duration, now: Timestamp) {
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}
