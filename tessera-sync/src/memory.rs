//! Process-local transport and connectivity source.
//!
//! [`InMemoryTransport`] keeps documents in a sorted map and pushes snapshots
//! to matching live queries on every write. It follows the store's offline
//! behaviour closely enough for tests and demos: local writes still notify
//! listeners, while one-shot reads fail with `Unavailable` while the network
//! is disabled. [`ManualConnectivity`] is a connectivity signal driven by
//! hand.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tessera_core::{NetworkMode, NetworkToggle, TransportError};
use tracing::{debug, error};

use crate::transport::{
    CancelFn, ConnectivityListener, ConnectivitySource, DataCallback, Document,
    DocumentSnapshot, ErrorCallback, Query, QueryKind, RemoteTransport, Snapshot,
};

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Callbacks never run under these locks, so a poisoned lock can only
    // come from a panic between two plain field updates.
    mutex.lock().unwrap_or_else(|poisoned| {
        error!("In-memory lock poisoned; recovering");
        poisoned.into_inner()
    })
}

// ============================================================================
// TRANSPORT
// ============================================================================

struct Listener {
    query: Query,
    on_data: DataCallback,
    on_error: ErrorCallback,
}

struct TransportState {
    documents: BTreeMap<String, Document>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
    network_enabled: bool,
    enable_calls: usize,
    disable_calls: usize,
    toggle_failures: usize,
}

impl TransportState {
    fn snapshot(&self, query: &Query) -> Snapshot {
        let documents = match query.kind {
            QueryKind::Document => {
                let data = self
                    .documents
                    .get(&query.path)
                    .filter(|body| query.matches(&query.path, body))
                    .cloned();
                vec![DocumentSnapshot {
                    path: query.path.clone(),
                    data,
                }]
            }
            QueryKind::Collection => self
                .documents
                .iter()
                .filter(|(path, body)| query.matches(path, body))
                .map(|(path, body)| DocumentSnapshot {
                    path: path.clone(),
                    data: Some(body.clone()),
                })
                .collect(),
        };
        Snapshot {
            query: query.clone(),
            documents,
        }
    }

    /// Snapshots for every listener whose result set may include `path`.
    fn affected(&self, path: &str) -> Vec<(DataCallback, Snapshot)> {
        self.listeners
            .values()
            .filter(|l| affects(&l.query, path))
            .map(|l| (Arc::clone(&l.on_data), self.snapshot(&l.query)))
            .collect()
    }
}

fn affects(query: &Query, path: &str) -> bool {
    match query.kind {
        QueryKind::Document => query.path == path,
        QueryKind::Collection => path
            .rsplit_once('/')
            .is_some_and(|(parent, _)| parent == query.path),
    }
}

/// Document store held in process memory.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct InMemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TransportState {
                documents: BTreeMap::new(),
                listeners: HashMap::new(),
                next_listener: 1,
                network_enabled: true,
                enable_calls: 0,
                disable_calls: 0,
                toggle_failures: 0,
            })),
        }
    }

    /// Write a document and notify matching live queries.
    pub fn put(&self, path: impl Into<String>, body: Document) {
        let path = path.into();
        let deliveries = {
            let mut state = lock_or_recover(&self.state);
            state.documents.insert(path.clone(), body);
            state.affected(&path)
        };
        debug!(path = %path, listeners = deliveries.len(), "Document written");
        for (on_data, snapshot) in deliveries {
            on_data(snapshot);
        }
    }

    /// Delete a document and notify matching live queries. Returns whether
    /// the document existed.
    pub fn delete(&self, path: &str) -> bool {
        let (existed, deliveries) = {
            let mut state = lock_or_recover(&self.state);
            let existed = state.documents.remove(path).is_some();
            (existed, state.affected(path))
        };
        for (on_data, snapshot) in deliveries {
            on_data(snapshot);
        }
        existed
    }

    /// Report `error` to every live query that covers `path`.
    pub fn fail_listeners(&self, path: &str, error: TransportError) {
        let callbacks: Vec<ErrorCallback> = {
            let state = lock_or_recover(&self.state);
            state
                .listeners
                .values()
                .filter(|l| affects(&l.query, path))
                .map(|l| Arc::clone(&l.on_error))
                .collect()
        };
        for on_error in callbacks {
            on_error(error.clone());
        }
    }

    /// Make the next `n` network toggles fail.
    pub fn fail_next_toggles(&self, n: usize) {
        lock_or_recover(&self.state).toggle_failures = n;
    }

    pub fn listener_count(&self) -> usize {
        lock_or_recover(&self.state).listeners.len()
    }

    pub fn network_enabled(&self) -> bool {
        lock_or_recover(&self.state).network_enabled
    }

    /// `enable_network` attempts, including failed ones.
    pub fn enable_calls(&self) -> usize {
        lock_or_recover(&self.state).enable_calls
    }

    /// `disable_network` attempts, including failed ones.
    pub fn disable_calls(&self) -> usize {
        lock_or_recover(&self.state).disable_calls
    }

    fn toggle(&self, toggle: NetworkToggle) -> Result<(), TransportError> {
        let mut state = lock_or_recover(&self.state);
        match toggle {
            NetworkToggle::Enable => state.enable_calls += 1,
            NetworkToggle::Disable => state.disable_calls += 1,
        }
        if state.toggle_failures > 0 {
            state.toggle_failures -= 1;
            return Err(TransportError::ToggleFailed {
                toggle,
                reason: "injected failure".to_string(),
            });
        }
        state.network_enabled = matches!(toggle, NetworkToggle::Enable);
        Ok(())
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_or_recover(&self.state);
        f.debug_struct("InMemoryTransport")
            .field("documents", &state.documents.len())
            .field("listeners", &state.listeners.len())
            .field("network_enabled", &state.network_enabled)
            .finish()
    }
}

#[async_trait]
impl RemoteTransport for InMemoryTransport {
    fn subscribe(&self, query: &Query, on_data: DataCallback, on_error: ErrorCallback) -> CancelFn {
        let (id, initial) = {
            let mut state = lock_or_recover(&self.state);
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.insert(
                id,
                Listener {
                    query: query.clone(),
                    on_data: Arc::clone(&on_data),
                    on_error,
                },
            );
            (id, state.snapshot(query))
        };
        debug!(query = %query, listener_id = id, "Live query opened");
        on_data(initial);

        let state = Arc::clone(&self.state);
        CancelFn::new(move || {
            lock_or_recover(&state).listeners.remove(&id);
        })
    }

    async fn get_once(&self, path: &str) -> Result<Document, TransportError> {
        let state = lock_or_recover(&self.state);
        if !state.network_enabled {
            return Err(TransportError::Unavailable {
                reason: "network disabled".to_string(),
            });
        }
        state
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                path: path.to_string(),
            })
    }

    async fn enable_network(&self) -> Result<(), TransportError> {
        self.toggle(NetworkToggle::Enable)
    }

    async fn disable_network(&self) -> Result<(), TransportError> {
        self.toggle(NetworkToggle::Disable)
    }
}

// ============================================================================
// CONNECTIVITY
// ============================================================================

struct ConnectivityState {
    mode: Option<NetworkMode>,
    listeners: HashMap<u64, ConnectivityListener>,
    next_listener: u64,
}

/// Connectivity signal flipped by hand.
///
/// Listeners fire only on actual changes, like a browser's online/offline
/// events. Cloning yields another handle to the same signal.
#[derive(Clone)]
pub struct ManualConnectivity {
    state: Arc<Mutex<ConnectivityState>>,
}

impl ManualConnectivity {
    /// `initial` is what `current_mode` reports; `None` simulates a runtime
    /// that cannot tell.
    pub fn new(initial: Option<NetworkMode>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectivityState {
                mode: initial,
                listeners: HashMap::new(),
                next_listener: 1,
            })),
        }
    }

    pub fn set_mode(&self, mode: NetworkMode) {
        let listeners: Vec<ConnectivityListener> = {
            let mut state = lock_or_recover(&self.state);
            if state.mode == Some(mode) {
                return;
            }
            state.mode = Some(mode);
            state.listeners.values().cloned().collect()
        };
        debug!(mode = %mode, listeners = listeners.len(), "Connectivity changed");
        for listener in listeners {
            listener(mode);
        }
    }

    pub fn go_online(&self) {
        self.set_mode(NetworkMode::Online);
    }

    pub fn go_offline(&self) {
        self.set_mode(NetworkMode::Offline);
    }

    pub fn listener_count(&self) -> usize {
        lock_or_recover(&self.state).listeners.len()
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(Some(NetworkMode::Online))
    }
}

impl fmt::Debug for ManualConnectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_or_recover(&self.state);
        f.debug_struct("ManualConnectivity")
            .field("mode", &state.mode)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

#[async_trait]
impl ConnectivitySource for ManualConnectivity {
    async fn current_mode(&self) -> Option<NetworkMode> {
        lock_or_recover(&self.state).mode
    }

    fn listen(&self, listener: ConnectivityListener) -> CancelFn {
        let id = {
            let mut state = lock_or_recover(&self.state);
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.insert(id, listener);
            id
        };
        let state = Arc::clone(&self.state);
        CancelFn::new(move || {
            lock_or_recover(&state).listeners.remove(&id);
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collect() -> (DataCallback, Arc<Mutex<Vec<Snapshot>>>) {
        let seen: Arc<Mutex<Vec<Snapshot>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let cb: DataCallback = Arc::new(move |snap: Snapshot| sink.lock().unwrap().push(snap));
        (cb, seen)
    }

    fn ignore_errors() -> ErrorCallback {
        Arc::new(|_: TransportError| {})
    }

    #[test]
    fn test_subscribe_delivers_initial_snapshot() {
        let transport = InMemoryTransport::new();
        transport.put("posts/p1", json!({"title": "hello"}));
        let (cb, seen) = collect();

        let _cancel = transport.subscribe(&Query::collection("posts"), cb, ignore_errors());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].documents[0].id(), "p1");
    }

    #[test]
    fn test_writes_notify_matching_queries_only() {
        let transport = InMemoryTransport::new();
        let (posts_cb, posts) = collect();
        let (users_cb, users) = collect();
        let _a = transport.subscribe(&Query::collection("posts"), posts_cb, ignore_errors());
        let _b = transport.subscribe(&Query::collection("users"), users_cb, ignore_errors());

        transport.put("posts/p1", json!({"n": 1}));
        assert_eq!(posts.lock().unwrap().len(), 2);
        assert_eq!(users.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_filtered_collection_snapshot() {
        let transport = InMemoryTransport::new();
        transport.put("posts/p1", json!({"status": "draft"}));
        transport.put("posts/p2", json!({"status": "published"}));
        let (cb, seen) = collect();

        let query = Query::collection("posts").where_eq("status", "published");
        let _c = transport.subscribe(&query, cb, ignore_errors());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[0].documents[0].path, "posts/p2");
    }

    #[test]
    fn test_document_query_reports_deletion() {
        let transport = InMemoryTransport::new();
        transport.put("posts/p1", json!({"n": 1}));
        let (cb, seen) = collect();
        let _c = transport.subscribe(&Query::document("posts/p1"), cb, ignore_errors());

        assert!(transport.delete("posts/p1"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[1].documents[0].exists());
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let transport = InMemoryTransport::new();
        let (cb, seen) = collect();
        let cancel = transport.subscribe(&Query::collection("posts"), cb, ignore_errors());
        cancel.invoke("posts").unwrap();

        transport.put("posts/p1", json!({}));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(transport.listener_count(), 0);
    }

    #[test]
    fn test_fail_listeners_reaches_error_callback() {
        let transport = InMemoryTransport::new();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let on_error: ErrorCallback = Arc::new(move |_: TransportError| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let (cb, _seen) = collect();
        let _c = transport.subscribe(&Query::document("posts/p1"), cb, on_error);

        transport.fail_listeners(
            "posts/p1",
            TransportError::Rejected {
                reason: "permission denied".to_string(),
            },
        );
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_once_honours_network_state() {
        let transport = InMemoryTransport::new();
        transport.put("posts/p1", json!({"n": 1}));

        assert_eq!(transport.get_once("posts/p1").await.unwrap(), json!({"n": 1}));
        assert!(matches!(
            transport.get_once("posts/missing").await,
            Err(TransportError::NotFound { .. })
        ));

        transport.disable_network().await.unwrap();
        assert!(matches!(
            transport.get_once("posts/p1").await,
            Err(TransportError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_toggle_failure() {
        let transport = InMemoryTransport::new();
        transport.fail_next_toggles(1);
        assert!(transport.disable_network().await.is_err());
        assert!(transport.network_enabled());
        assert!(transport.disable_network().await.is_ok());
        assert!(!transport.network_enabled());
        assert_eq!(transport.disable_calls(), 2);
    }

    #[tokio::test]
    async fn test_manual_connectivity_fires_on_change_only() {
        let source = ManualConnectivity::new(Some(NetworkMode::Online));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let cancel = source.listen(Arc::new(move |_: NetworkMode| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        source.go_online();
        source.go_offline();
        source.go_offline();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(source.current_mode().await, Some(NetworkMode::Offline));

        cancel.invoke("connectivity").unwrap();
        assert_eq!(source.listener_count(), 0);
    }
}
