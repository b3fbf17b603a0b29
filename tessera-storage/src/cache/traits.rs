//! Cache observability types.

use std::time::Duration;

/// Point-in-time view of cache occupancy.
///
/// Observability only. No hit/miss counters are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live (unexpired) entries.
    pub size: usize,
    /// Configured capacity.
    pub max_size: usize,
    /// Configured entry lifetime.
    pub ttl: Duration,
}

impl CacheStats {
    /// Fraction of capacity in use (0.0 to 1.0).
    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size as f64 / self.max_size as f64
        }
    }
}
