//! TESSERA Sync - Live Subscriptions and Connectivity
//!
//! Everything that talks to the remote document store over time:
//!
//! - [`SubscriptionRegistry`]: at most one live subscription per logical key,
//!   with deterministic teardown.
//! - [`ConnectivityController`]: mirrors runtime connectivity into the
//!   transport's network toggle.
//! - [`LiveQueries`]: registry-managed watches plus cache-backed one-shot reads.
//!
//! The transport itself sits behind [`RemoteTransport`]; [`InMemoryTransport`]
//! and [`ManualConnectivity`] are process-local implementations for tests,
//! demos and offline tooling.

pub mod connectivity;
pub mod live;
pub mod memory;
pub mod registry;
pub mod transport;

pub use connectivity::{ConnectivityController, CONNECTIVITY_LISTENER_KEY};
pub use live::{DocumentCache, LiveQueries};
pub use memory::{InMemoryTransport, ManualConnectivity};
pub use registry::{
    validate_key, RegistrationId, SubscriptionHandle, SubscriptionRegistry, Teardown,
    TeardownReport,
};
pub use transport::{
    CancelFn, ConnectivityListener, ConnectivitySource, DataCallback, Document,
    DocumentSnapshot, ErrorCallback, FieldFilter, Query, QueryKind, RemoteTransport, Snapshot,
};
