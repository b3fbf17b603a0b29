//! TESSERA Test Utilities
//!
//! Shared test infrastructure for the TESSERA workspace:
//! - Recording doubles for the transport and for cancel callbacks
//! - Proptest generators for roles, identities and subscription keys
//! - Fixtures for common scenarios
//! - Assertions for TESSERA error shapes

pub use tessera_core::{
    AccessDecision, AccessError, ActiveStatus, Identity, IdentityState, ManualClock, NetworkMode,
    Role, SyncConfig, TeardownError, TesseraError, TesseraResult, TransportError,
};
pub use tessera_sync::{InMemoryTransport, ManualConnectivity};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tessera_sync::{CancelFn, DataCallback, Document, ErrorCallback, Query, RemoteTransport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// RECORDING TRANSPORT
// ============================================================================

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Subscribe(String),
    GetOnce(String),
    EnableNetwork,
    DisableNetwork,
}

/// Transport wrapper that records every call before forwarding it.
///
/// Reads of paths marked with [`fail_reads_of`](Self::fail_reads_of) fail
/// with `Unavailable` without reaching the inner transport.
#[derive(Clone)]
pub struct RecordingTransport {
    inner: Arc<dyn RemoteTransport>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
    failing_reads: Arc<Mutex<HashSet<String>>>,
}

impl RecordingTransport {
    pub fn new(inner: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner,
            calls: Arc::default(),
            failing_reads: Arc::default(),
        }
    }

    /// Recording wrapper over a fresh in-memory store. The store handle is
    /// returned for seeding documents.
    pub fn over_memory() -> (Self, InMemoryTransport) {
        let memory = InMemoryTransport::new();
        (Self::new(Arc::new(memory.clone())), memory)
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    pub fn get_once_count(&self, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, TransportCall::GetOnce(p) if p == path))
            .count()
    }

    /// Enable and disable calls, in order.
    pub fn toggle_calls(&self) -> Vec<TransportCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| {
                matches!(c, TransportCall::EnableNetwork | TransportCall::DisableNetwork)
            })
            .cloned()
            .collect()
    }

    pub fn fail_reads_of(&self, path: impl Into<String>) {
        lock(&self.failing_reads).insert(path.into());
    }

    pub fn restore_reads_of(&self, path: &str) {
        lock(&self.failing_reads).remove(path);
    }

    fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    fn subscribe(&self, query: &Query, on_data: DataCallback, on_error: ErrorCallback) -> CancelFn {
        self.record(TransportCall::Subscribe(query.key()));
        self.inner.subscribe(query, on_data, on_error)
    }

    async fn get_once(&self, path: &str) -> Result<Document, TransportError> {
        self.record(TransportCall::GetOnce(path.to_string()));
        if lock(&self.failing_reads).contains(path) {
            return Err(TransportError::Unavailable {
                reason: format!("reads of {} disabled by test", path),
            });
        }
        self.inner.get_once(path).await
    }

    async fn enable_network(&self) -> Result<(), TransportError> {
        self.record(TransportCall::EnableNetwork);
        self.inner.enable_network().await
    }

    async fn disable_network(&self) -> Result<(), TransportError> {
        self.record(TransportCall::DisableNetwork);
        self.inner.disable_network().await
    }
}

// ============================================================================
// CANCEL RECORDER
// ============================================================================

/// Hands out named cancel callbacks and records the order they ran in.
#[derive(Debug, Clone, Default)]
pub struct CancelRecorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl CancelRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cancel that records `name` and succeeds.
    pub fn cancel(&self, name: impl Into<String>) -> CancelFn {
        let log = Arc::clone(&self.log);
        let name = name.into();
        CancelFn::new(move || lock(&log).push(name))
    }

    /// A cancel that records `name` and then reports a transport error.
    pub fn failing(&self, name: impl Into<String>) -> CancelFn {
        let log = Arc::clone(&self.log);
        let name = name.into();
        CancelFn::fallible(move || {
            let reason = format!("{} refused to close", name);
            lock(&log).push(name);
            Err(TransportError::CancelFailed { reason })
        })
    }

    /// A cancel that records `name` and then panics.
    pub fn panicking(&self, name: impl Into<String>) -> CancelFn {
        let log = Arc::clone(&self.log);
        let name = name.into();
        CancelFn::new(move || {
            lock(&log).push(name.clone());
            panic!("{} panicked during teardown", name);
        })
    }

    /// Names of cancels that ran, in order.
    pub fn log(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    /// How many times the cancel named `name` ran.
    pub fn count(&self, name: &str) -> usize {
        lock(&self.log).iter().filter(|n| *n == name).count()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TESSERA types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    pub fn arb_status() -> impl Strategy<Value = ActiveStatus> {
        prop_oneof![
            Just(ActiveStatus::Active),
            Just(ActiveStatus::Pending),
            Just(ActiveStatus::Blocked),
            Just(ActiveStatus::Invited),
        ]
    }

    pub fn arb_uid() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{8,28}"
    }

    pub fn arb_identity() -> impl Strategy<Value = Identity> {
        (arb_uid(), arb_role(), arb_status())
            .prop_map(|(uid, role, status)| Identity::new(uid, role, status))
    }

    pub fn arb_identity_state() -> impl Strategy<Value = IdentityState> {
        prop_oneof![
            Just(IdentityState::Loading),
            Just(IdentityState::SignedOut),
            arb_identity().prop_map(IdentityState::SignedIn),
        ]
    }

    pub fn arb_network_mode() -> impl Strategy<Value = NetworkMode> {
        prop_oneof![Just(NetworkMode::Online), Just(NetworkMode::Offline)]
    }

    /// Keys shaped like the ones views use, e.g. `posts:list` or
    /// `users:profile:42`.
    pub fn arb_subscription_key() -> impl Strategy<Value = String> {
        "[a-z]{3,10}:[a-z]{3,8}(:[0-9]{1,4})?"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for common scenarios.

    use super::*;
    use std::time::Duration;

    /// Active identity with the given role.
    pub fn identity(role: Role) -> Identity {
        Identity::active(format!("uid-{}", role).to_lowercase(), role)
    }

    /// Pending identity with the given role.
    pub fn pending(role: Role) -> Identity {
        Identity::new(format!("pending-{}", role).to_lowercase(), role, ActiveStatus::Pending)
    }

    /// Clock pinned to 2024-01-01T00:00:00Z.
    pub fn clock() -> ManualClock {
        ManualClock::at_epoch_2024()
    }

    /// Config with a tiny cache so eviction is easy to trigger.
    pub fn small_cache_config(max_entries: usize, ttl: Duration) -> SyncConfig {
        SyncConfig {
            cache_max_entries: max_entries,
            cache_ttl: ttl,
            ..SyncConfig::default()
        }
    }

    /// A small post body.
    pub fn post(title: &str) -> Document {
        serde_json::json!({ "title": title, "status": "published" })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for TESSERA error shapes.

    use super::*;

    /// Assert that a result is an access denial carrying `decision`.
    #[track_caller]
    pub fn assert_denied<T: std::fmt::Debug>(result: &TesseraResult<T>, decision: AccessDecision) {
        match result {
            Err(TesseraError::Access(AccessError::Denied { decision: d, .. })) => {
                assert_eq!(*d, decision, "Wrong access decision");
            }
            other => panic!("Expected access denial ({}), got: {:?}", decision, other),
        }
    }

    /// Assert that a result is a transport NotFound.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &TesseraResult<T>) {
        assert!(
            matches!(result, Err(e) if e.is_not_found()),
            "Expected NotFound, got: {:?}",
            result
        );
    }

    /// Assert that a teardown error belongs to `key`.
    #[track_caller]
    pub fn assert_teardown_for(error: &TeardownError, key: &str) {
        assert_eq!(error.key(), key, "Teardown error for wrong key: {:?}", error);
    }
}
