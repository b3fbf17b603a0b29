//! Remote store and connectivity seams.
//!
//! The vendor SDK is opaque to TESSERA. It is reached only through
//! [`RemoteTransport`] (queries, one-shot reads, network toggles) and
//! [`ConnectivitySource`] (the runtime's online/offline signal).

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::{NetworkMode, TeardownError, TransportError};

/// A document body as delivered by the remote store.
pub type Document = serde_json::Value;

/// Receives every snapshot a live query produces.
pub type DataCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Receives errors a live query reports after it was opened.
pub type ErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Receives runtime connectivity transitions.
pub type ConnectivityListener = Arc<dyn Fn(NetworkMode) + Send + Sync>;

// ============================================================================
// QUERIES
// ============================================================================

/// Whether a query targets one document or the members of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Document,
    Collection,
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: serde_json::Value,
}

/// A live or one-shot query against the remote store.
///
/// Paths are slash-separated: `posts` is a collection, `posts/p1` a document
/// inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub kind: QueryKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FieldFilter>,
}

impl Query {
    /// Query a single document.
    pub fn document(path: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Document,
            path: path.into(),
            filters: Vec::new(),
        }
    }

    /// Query every document directly inside a collection.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Collection,
            path: path.into(),
            filters: Vec::new(),
        }
    }

    /// Restrict the query to documents whose `field` equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Canonical subscription key for this query.
    ///
    /// Two queries with the same path and filters produce the same key, so
    /// watching either one replaces the other in the registry.
    pub fn key(&self) -> String {
        if self.filters.is_empty() {
            return self.path.clone();
        }
        let filters: Vec<String> = self
            .filters
            .iter()
            .map(|f| format!("{}=={}", f.field, f.value))
            .collect();
        format!("{}?{}", self.path, filters.join("&"))
    }

    /// Whether the document at `doc_path` with body `data` belongs to this
    /// query's result set.
    pub fn matches(&self, doc_path: &str, data: &Document) -> bool {
        let in_scope = match self.kind {
            QueryKind::Document => doc_path == self.path,
            QueryKind::Collection => doc_path
                .strip_prefix(self.path.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|id| !id.is_empty() && !id.contains('/')),
        };
        in_scope
            && self
                .filters
                .iter()
                .all(|f| data.get(&f.field) == Some(&f.value))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// One document inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub path: String,
    /// `None` when a watched document does not exist (or was deleted).
    pub data: Option<Document>,
}

impl DocumentSnapshot {
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Full result set of a query at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub query: Query,
    pub documents: Vec<DocumentSnapshot>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ============================================================================
// CANCEL CALLBACK
// ============================================================================

/// Tears down one live subscription.
///
/// Consumed on invocation, so a given cancel runs at most once.
pub struct CancelFn(Box<dyn FnOnce() -> Result<(), TransportError> + Send>);

impl CancelFn {
    /// Wrap a teardown that cannot fail.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::fallible(move || {
            f();
            Ok(())
        })
    }

    /// Wrap a teardown that may report a transport error.
    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), TransportError> + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// A teardown with nothing to release.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Run the teardown directly.
    ///
    /// Panics propagate; use this only to compose cancels inside another
    /// cancel.
    pub fn call(self) -> Result<(), TransportError> {
        (self.0)()
    }

    /// Run the teardown for the subscription `key`, converting both reported
    /// errors and panics into a [`TeardownError`].
    pub fn invoke(self, key: &str) -> Result<(), TeardownError> {
        match panic::catch_unwind(AssertUnwindSafe(self.0)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TeardownError::Failed {
                key: key.to_string(),
                source,
            }),
            Err(payload) => Err(TeardownError::Panicked {
                key: key.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl fmt::Debug for CancelFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelFn")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// The remote document store.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Open a live query.
    ///
    /// `on_data` fires with the current result set and again after every
    /// change. Callbacks may run on any thread and must not block. The
    /// returned cancel stops delivery.
    fn subscribe(&self, query: &Query, on_data: DataCallback, on_error: ErrorCallback) -> CancelFn;

    /// Read one document.
    ///
    /// # Errors
    /// [`TransportError::NotFound`] when the document does not exist,
    /// [`TransportError::Unavailable`] when the store cannot be reached.
    async fn get_once(&self, path: &str) -> Result<Document, TransportError>;

    /// Resume talking to the remote store.
    async fn enable_network(&self) -> Result<(), TransportError>;

    /// Stop talking to the remote store; reads fall back to local state.
    async fn disable_network(&self) -> Result<(), TransportError>;
}

/// The runtime's connectivity signal.
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    /// Current connectivity, or `None` when the runtime cannot tell.
    async fn current_mode(&self) -> Option<NetworkMode>;

    /// Register for transitions. The returned cancel deregisters.
    fn listen(&self, listener: ConnectivityListener) -> CancelFn;
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_query_key_without_filters_is_path() {
        assert_eq!(Query::collection("posts").key(), "posts");
        assert_eq!(Query::document("posts/p1").key(), "posts/p1");
    }

    #[test]
    fn test_query_key_includes_filters_in_order() {
        let query = Query::collection("posts")
            .where_eq("status", "published")
            .where_eq("pinned", true);
        assert_eq!(query.key(), "posts?status==\"published\"&pinned==true");
    }

    #[test]
    fn test_collection_query_matches_direct_children_only() {
        let query = Query::collection("posts");
        let body = json!({});
        assert!(query.matches("posts/p1", &body));
        assert!(!query.matches("posts", &body));
        assert!(!query.matches("posts/p1/comments/c1", &body));
        assert!(!query.matches("postsx/p1", &body));
    }

    #[test]
    fn test_filters_compare_field_values() {
        let query = Query::collection("posts").where_eq("status", "published");
        assert!(query.matches("posts/p1", &json!({"status": "published"})));
        assert!(!query.matches("posts/p1", &json!({"status": "draft"})));
        assert!(!query.matches("posts/p1", &json!({})));
    }

    #[test]
    fn test_document_snapshot_id_is_last_segment() {
        let snap = DocumentSnapshot {
            path: "posts/p1".to_string(),
            data: None,
        };
        assert_eq!(snap.id(), "p1");
        assert!(!snap.exists());
    }

    #[test]
    fn test_cancel_fn_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cancel = CancelFn::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(cancel.invoke("k").is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_fn_reports_transport_error() {
        let cancel = CancelFn::fallible(|| {
            Err(TransportError::CancelFailed {
                reason: "socket closed".to_string(),
            })
        });
        let err = cancel.invoke("posts").unwrap_err();
        assert_eq!(err.key(), "posts");
        assert!(matches!(err, TeardownError::Failed { .. }));
    }

    #[test]
    fn test_cancel_fn_catches_panic() {
        let cancel = CancelFn::new(|| panic!("listener already gone"));
        let err = cancel.invoke("posts").unwrap_err();
        match err {
            TeardownError::Panicked { key, message } => {
                assert_eq!(key, "posts");
                assert_eq!(message, "listener already gone");
            }
            other => panic!("expected Panicked, got {:?}", other),
        }
    }
}
