//! Cache entry with insertion and access timestamps.

use std::time::Duration;

use tessera_core::{elapsed_since, Timestamp};

/// A cached value plus the timestamps that drive expiry and recency.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    inserted_at: Timestamp,
    last_accessed_at: Timestamp,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, now: Timestamp) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn inserted_at(&self) -> Timestamp {
        self.inserted_at
    }

    pub fn last_accessed_at(&self) -> Timestamp {
        self.last_accessed_at
    }

    /// Age of the entry, measured from insertion.
    pub fn age(&self, now: Timestamp) -> Duration {
        elapsed_since(self.inserted_at, now)
    }

    /// True while `now - inserted_at < ttl`.
    pub fn is_live(&self, ttl: Duration, now: Timestamp) -> bool {
        self.age(now) < ttl
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.last_accessed_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Clock, ManualClock};

    #[test]
    fn test_entry_liveness_boundary() {
        let clock = ManualClock::at_epoch_2024();
        let entry = CacheEntry::new("v", clock.now());
        let ttl = Duration::from_secs(10);

        clock.advance(Duration::from_millis(9_999));
        assert!(entry.is_live(ttl, clock.now()));

        // Exactly at the TTL the entry is already gone.
        clock.advance(Duration::from_millis(1));
        assert!(!entry.is_live(ttl, clock.now()));
    }

    #[test]
    fn test_touch_keeps_insertion_time() {
        let clock = ManualClock::at_epoch_2024();
        let mut entry = CacheEntry::new(1u32, clock.now());
        let inserted = entry.inserted_at();

        clock.advance(Duration::from_secs(3));
        entry.touch(clock.now());

        assert_eq!(entry.inserted_at(), inserted);
        assert_eq!(entry.last_accessed_at(), clock.now());
        assert_eq!(entry.age(clock.now()), Duration::from_secs(3));
        assert_eq!(entry.into_value(), 1);
    }
}
