//! TESSERA Storage - Client-Side Entity Cache
//!
//! Frequently-read documents are kept in a bounded, time-expiring cache so
//! one-shot lookups do not round-trip to the remote store on every render.
//! See [`cache`] for the contract.

pub mod cache;

pub use cache::{Cache, CacheConfig, CacheEntry, CacheStats};
