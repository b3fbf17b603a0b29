//! TESSERA Client - Composition Root
//!
//! Wires the cache, subscription registry, connectivity controller, live
//! queries and access control into one [`AppState`] that a host owns for the
//! lifetime of the process, plus the tracing setup hosts call at startup.

pub mod state;
pub mod telemetry;

pub use state::{AppState, Collaborators};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

// Re-export the pieces hosts touch most.
pub use tessera_access::{Guard, GuardOutcome, IdentityProvider, StaticIdentity};
pub use tessera_core::{
    AccessDecision, Identity, IdentityState, NetworkMode, Role, SyncConfig, TesseraError,
    TesseraResult, TransportError,
};
pub use tessera_sync::{
    InMemoryTransport, ManualConnectivity, Query, Snapshot, SubscriptionHandle, TeardownReport,
};
