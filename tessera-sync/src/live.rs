//! Live queries backed by the registry and the entity cache.
//!
//! Watches go through the [`SubscriptionRegistry`], so re-watching a key
//! replaces the previous listener instead of stacking a second one. Every
//! snapshot a watch receives is written through to the cache; a document
//! that disappears, or a document watch that errors, is evicted so the next
//! one-shot read goes back to the store.
//!
//! Collection snapshots only list the documents currently in the result set,
//! so each collection watch remembers the paths it last saw and evicts the
//! ones that dropped out (deleted, or no longer matching a filter).

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use tessera_core::{TesseraError, TesseraResult, TransportError};
use tessera_storage::Cache;
use tracing::{debug, warn};

use crate::registry::{validate_key, SubscriptionHandle, SubscriptionRegistry};
use crate::transport::{
    DataCallback, Document, ErrorCallback, Query, QueryKind, RemoteTransport, Snapshot,
};

/// Cache of document bodies keyed by document path.
pub type DocumentCache = Cache<String, Document>;

/// Registry-managed live queries plus cache-backed reads.
#[derive(Clone)]
pub struct LiveQueries {
    transport: Arc<dyn RemoteTransport>,
    registry: SubscriptionRegistry,
    cache: Arc<DocumentCache>,
}

impl LiveQueries {
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        registry: SubscriptionRegistry,
        cache: Arc<DocumentCache>,
    ) -> Self {
        Self {
            transport,
            registry,
            cache,
        }
    }

    /// Open a live query under `key`, replacing any subscription that held it.
    pub fn watch(
        &self,
        key: impl Into<String>,
        query: &Query,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> TesseraResult<SubscriptionHandle> {
        let key = key.into();
        validate_key(&key)?;

        let cache = Arc::clone(&self.cache);
        let seen: Mutex<HashSet<String>> = Mutex::default();
        let data: DataCallback = Arc::new(move |snapshot: Snapshot| {
            write_through(&cache, &snapshot);
            if snapshot.query.kind == QueryKind::Collection {
                evict_departed(&cache, &seen, &snapshot);
            }
            on_data(snapshot);
        });

        let cache = Arc::clone(&self.cache);
        let error_query = query.clone();
        let error: ErrorCallback = Arc::new(move |e: TransportError| {
            warn!(query = %error_query, error = %e, "Live query failed");
            if error_query.kind == QueryKind::Document {
                if let Err(e) = cache.invalidate(&error_query.path) {
                    warn!(path = %error_query.path, error = %e, "Cache invalidation failed");
                }
            }
            on_error(e);
        });

        let cancel = self.transport.subscribe(query, data, error);
        let handle = self.registry.register(key, cancel)?;
        debug!(key = %handle.key(), query = %query, "Live query registered");
        Ok(handle)
    }

    /// Open a live query keyed by the query itself.
    pub fn watch_query(
        &self,
        query: &Query,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> TesseraResult<SubscriptionHandle> {
        self.watch(query.key(), query, on_data, on_error)
    }

    /// Read one document, serving it from the cache while fresh.
    ///
    /// # Errors
    /// Whatever the transport reports on a miss; failures are not cached.
    pub async fn fetch_once(&self, path: &str) -> TesseraResult<Document> {
        self.cache
            .get_or_load(path.to_string(), || async {
                self.transport
                    .get_once(path)
                    .await
                    .map_err(TesseraError::from)
            })
            .await
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}

impl fmt::Debug for LiveQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQueries")
            .field("registry", &self.registry)
            .finish()
    }
}

fn write_through(cache: &DocumentCache, snapshot: &Snapshot) {
    for doc in &snapshot.documents {
        let result = match &doc.data {
            Some(body) => cache.set(doc.path.clone(), body.clone()),
            None => cache.invalidate(&doc.path).map(|_| ()),
        };
        if let Err(e) = result {
            warn!(path = %doc.path, error = %e, "Cache write-through failed");
        }
    }
}

/// Evict every path the previous collection snapshot held that the current
/// one no longer does.
fn evict_departed(cache: &DocumentCache, seen: &Mutex<HashSet<String>>, snapshot: &Snapshot) {
    let current: HashSet<String> = snapshot
        .documents
        .iter()
        .filter(|doc| doc.exists())
        .map(|doc| doc.path.clone())
        .collect();
    let mut seen = seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for path in seen.difference(&current) {
        debug!(path = %path, query = %snapshot.query, "Document left live query");
        if let Err(e) = cache.invalidate(path) {
            warn!(path = %path, error = %e, "Cache invalidation failed");
        }
    }
    *seen = current;
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tessera_core::ManualClock;
    use tessera_storage::CacheConfig;

    struct Fixture {
        transport: InMemoryTransport,
        clock: ManualClock,
        live: LiveQueries,
    }

    fn fixture() -> Fixture {
        let transport = InMemoryTransport::new();
        let clock = ManualClock::at_epoch_2024();
        let cache = DocumentCache::with_clock(
            CacheConfig::default().with_ttl(Duration::from_secs(60)),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let live = LiveQueries::new(
            Arc::new(transport.clone()),
            SubscriptionRegistry::new(),
            Arc::new(cache),
        );
        Fixture {
            transport,
            clock,
            live,
        }
    }

    fn counting() -> (DataCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let cb: DataCallback = Arc::new(move |_: Snapshot| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (cb, count)
    }

    fn no_errors() -> ErrorCallback {
        Arc::new(|_: TransportError| {})
    }

    #[test]
    fn test_rewatching_key_keeps_one_listener() {
        let f = fixture();
        let (first, first_count) = counting();
        let (second, second_count) = counting();
        let query = Query::collection("posts");

        let _a = f.live.watch("feed", &query, first, no_errors()).unwrap();
        let _b = f.live.watch("feed", &query, second, no_errors()).unwrap();
        assert_eq!(f.transport.listener_count(), 1);

        f.transport.put("posts/p1", json!({"n": 1}));
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshots_write_through_to_cache() {
        let f = fixture();
        let (cb, _count) = counting();
        let _h = f
            .live
            .watch_query(&Query::collection("posts"), cb, no_errors())
            .unwrap();

        f.transport.put("posts/p1", json!({"title": "fresh"}));
        let cached = f.live.cache().get(&"posts/p1".to_string()).unwrap();
        assert_eq!(cached, Some(json!({"title": "fresh"})));
    }

    #[test]
    fn test_deleted_document_is_evicted() {
        let f = fixture();
        f.transport.put("posts/p1", json!({"n": 1}));
        let (cb, _count) = counting();
        let _h = f
            .live
            .watch_query(&Query::document("posts/p1"), cb, no_errors())
            .unwrap();
        assert!(f.live.cache().has(&"posts/p1".to_string()).unwrap());

        f.transport.delete("posts/p1");
        assert!(!f.live.cache().has(&"posts/p1".to_string()).unwrap());
    }

    #[test]
    fn test_collection_member_deleted_is_evicted() {
        let f = fixture();
        let (cb, _count) = counting();
        let _h = f
            .live
            .watch_query(&Query::collection("posts"), cb, no_errors())
            .unwrap();

        f.transport.put("posts/p1", json!({"n": 1}));
        f.transport.put("posts/p2", json!({"n": 2}));
        assert!(f.live.cache().has(&"posts/p1".to_string()).unwrap());

        f.transport.delete("posts/p1");
        assert!(!f.live.cache().has(&"posts/p1".to_string()).unwrap());
        assert!(f.live.cache().has(&"posts/p2".to_string()).unwrap());
    }

    #[tokio::test]
    async fn test_document_leaving_filter_is_evicted() {
        let f = fixture();
        let (cb, _count) = counting();
        let published = Query::collection("posts").where_eq("status", "published");
        let _h = f.live.watch_query(&published, cb, no_errors()).unwrap();

        f.transport.put("posts/p1", json!({"status": "published"}));
        assert!(f.live.cache().has(&"posts/p1".to_string()).unwrap());

        f.transport.put("posts/p1", json!({"status": "draft"}));
        assert!(!f.live.cache().has(&"posts/p1".to_string()).unwrap());
        assert_eq!(
            f.live.fetch_once("posts/p1").await.unwrap(),
            json!({"status": "draft"})
        );
    }

    #[test]
    fn test_rejected_watch_opens_no_listener() {
        let f = fixture();
        let (cb, _count) = counting();
        let result = f
            .live
            .watch("   ", &Query::collection("posts"), cb, no_errors());

        assert!(result.is_err());
        assert_eq!(f.transport.listener_count(), 0);
        assert_eq!(f.live.registry().count().unwrap(), 0);
    }

    #[test]
    fn test_document_watch_error_invalidates_and_forwards() {
        let f = fixture();
        f.transport.put("posts/p1", json!({"n": 1}));
        let (cb, _count) = counting();
        let seen: Arc<Mutex<Vec<TransportError>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let on_error: ErrorCallback =
            Arc::new(move |e: TransportError| sink.lock().unwrap().push(e));
        let _h = f
            .live
            .watch_query(&Query::document("posts/p1"), cb, on_error)
            .unwrap();

        f.transport.fail_listeners(
            "posts/p1",
            TransportError::Rejected {
                reason: "permission denied".to_string(),
            },
        );
        assert!(!f.live.cache().has(&"posts/p1".to_string()).unwrap());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_once_serves_from_cache_while_fresh() {
        let f = fixture();
        f.transport.put("posts/p1", json!({"v": 1}));
        assert_eq!(f.live.fetch_once("posts/p1").await.unwrap(), json!({"v": 1}));

        // The store changes without a live query; the cached copy still wins.
        f.transport.put("posts/p1", json!({"v": 2}));
        assert_eq!(f.live.fetch_once("posts/p1").await.unwrap(), json!({"v": 1}));

        f.clock.advance(Duration::from_secs(60));
        assert_eq!(f.live.fetch_once("posts/p1").await.unwrap(), json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_fetch_once_does_not_cache_failures() {
        let f = fixture();
        let err = f.live.fetch_once("posts/missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!f.live.cache().has(&"posts/missing".to_string()).unwrap());

        f.transport.put("posts/missing", json!({"found": true}));
        assert_eq!(
            f.live.fetch_once("posts/missing").await.unwrap(),
            json!({"found": true})
        );
    }

    #[tokio::test]
    async fn test_fetch_once_falls_back_to_cache_offline() {
        let f = fixture();
        f.transport.put("posts/p1", json!({"v": 1}));
        f.live.fetch_once("posts/p1").await.unwrap();

        f.transport.disable_network().await.unwrap();
        assert_eq!(f.live.fetch_once("posts/p1").await.unwrap(), json!({"v": 1}));
        assert!(f.live.fetch_once("posts/p2").await.is_err());
    }
}
