//! TESSERA Core - Shared Types
//!
//! Data types, errors, clock and configuration shared by every TESSERA crate.
//! This crate contains no synchronization or policy logic.

mod clock;
mod config;
mod enums;
mod error;
mod identity;

pub use clock::{elapsed_since, Clock, ManualClock, SystemClock};
pub use config::{SyncConfig, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL};
pub use enums::{AccessDecision, ActiveStatus, NetworkMode, NetworkToggle, Redirect, Role};
pub use error::{
    AccessError, CacheError, ConfigError, RegistryError, TeardownError, TesseraError,
    TesseraResult, TransportError,
};
pub use identity::{Identity, IdentityState, Timestamp};
