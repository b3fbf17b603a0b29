//! Bounded cache with per-entry expiration and fetch-on-miss.
//!
//! # Contract
//!
//! - An entry is visible only while `now - inserted_at < ttl`. Expired
//!   entries read as absent even if they are still physically stored.
//! - The cache never holds more than `max_entries` entries. Inserting a new
//!   key into a full cache first drops expired entries, then evicts the
//!   least-recently-used one.
//! - Reads promote an entry to most-recently-used when
//!   `update_age_on_get` is set. Its TTL still runs from insertion.
//! - [`Cache::get_or_load`] calls its loader at most once per call and never
//!   caches a loader error. Concurrent misses for the same key each run
//!   their own loader.
//!
//! # Example
//!
//! ```ignore
//! let cache: Cache<String, Post> = Cache::new(CacheConfig::default())?;
//!
//! let post = cache
//!     .get_or_load("posts/42".to_string(), || transport.get_once("posts/42"))
//!     .await?;
//! ```

pub mod config;
pub mod entry;
pub mod store;
pub mod traits;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use store::Cache;
pub use traits::CacheStats;
