//! Subscription registry.
//!
//! Keeps at most one live subscription per logical key. Registering a key
//! that is already held tears down the previous subscription before the new
//! one is stored, so two listeners for the same key are never both live.
//!
//! Teardown failures (reported errors and panics alike) are logged and
//! returned as values. They never propagate out of [`register`] and never
//! leave a key registered.
//!
//! Cancel callbacks run while the registry lock is held. A cancel must not
//! call back into the same registry.
//!
//! [`register`]: SubscriptionRegistry::register

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tessera_core::{
    Clock, RegistryError, SystemClock, TeardownError, TesseraError, TesseraResult, Timestamp,
};
use tracing::{debug, warn};

use crate::transport::CancelFn;

/// Identifies one registration. Strictly increasing per registry.
pub type RegistrationId = u64;

struct Subscription {
    id: RegistrationId,
    cancel: CancelFn,
    registered_at: Timestamp,
}

struct RegistryInner {
    table: Mutex<HashMap<String, Subscription>>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl RegistryInner {
    fn lock(&self) -> TesseraResult<MutexGuard<'_, HashMap<String, Subscription>>> {
        self.table
            .lock()
            .map_err(|_| RegistryError::LockPoisoned.into())
    }
}

/// Outcome of removing a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    /// Nothing was registered under the key.
    NotRegistered,
    /// The subscription was removed and its cancel ran cleanly.
    Cancelled,
    /// The subscription was removed but its cancel failed.
    Failed(TeardownError),
}

impl Teardown {
    /// Whether a subscription was removed (cleanly or not).
    pub fn removed(&self) -> bool {
        !matches!(self, Teardown::NotRegistered)
    }
}

/// Outcome of a bulk teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Subscriptions whose cancel ran cleanly.
    pub cancelled: usize,
    /// Subscriptions removed despite a failing cancel.
    pub errors: Vec<TeardownError>,
}

impl TeardownReport {
    /// Total subscriptions removed.
    pub fn removed(&self) -> usize {
        self.cancelled + self.errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that `key` can name a subscription.
///
/// # Errors
/// [`RegistryError::InvalidKey`] for an empty or blank key.
pub fn validate_key(key: &str) -> TesseraResult<()> {
    if key.trim().is_empty() {
        return Err(RegistryError::InvalidKey {
            reason: "subscription key must not be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn reject(key: &str, cancel: CancelFn, error: TesseraError) -> TesseraError {
    warn!(key = %key, error = %error, "Registration rejected; cancelling subscription");
    if let Err(e) = cancel.invoke(key) {
        warn!(key = %key, error = %e, "Rejected subscription teardown failed");
    }
    error
}

/// Keyed table of live subscriptions.
///
/// Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                table: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                clock,
            }),
        }
    }

    /// Store `cancel` under `key`, cancelling whatever held the key before.
    ///
    /// # Errors
    /// [`RegistryError::InvalidKey`] for an empty key and
    /// [`RegistryError::LockPoisoned`] if the table lock is poisoned. A
    /// rejected `cancel` is run before the error is returned, so the caller's
    /// underlying listener never outlives a failed registration. A failing
    /// previous cancel is not an error: it is logged and the new subscription
    /// is stored regardless.
    pub fn register(
        &self,
        key: impl Into<String>,
        cancel: CancelFn,
    ) -> TesseraResult<SubscriptionHandle> {
        let key = key.into();
        if let Err(e) = validate_key(&key) {
            return Err(reject(&key, cancel, e));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let registered_at = self.inner.clock.now();

        let mut table = match self.inner.lock() {
            Ok(table) => table,
            Err(e) => return Err(reject(&key, cancel, e)),
        };
        if let Some(previous) = table.remove(&key) {
            debug!(key = %key, previous_id = previous.id, id, "Replacing subscription");
            if let Err(e) = previous.cancel.invoke(&key) {
                warn!(key = %key, error = %e, "Previous subscription teardown failed");
            }
        }
        table.insert(
            key.clone(),
            Subscription {
                id,
                cancel,
                registered_at,
            },
        );
        debug!(key = %key, id, active = table.len(), "Subscription registered");

        Ok(SubscriptionHandle {
            key,
            id,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Remove and cancel the subscription under `key`, if any.
    pub fn unregister(&self, key: &str) -> TesseraResult<Teardown> {
        let mut table = self.inner.lock()?;
        Ok(match table.remove(key) {
            Some(sub) => finish(key, sub),
            None => Teardown::NotRegistered,
        })
    }

    /// Remove and cancel every subscription, oldest registration first.
    pub fn unregister_all(&self) -> TesseraResult<TeardownReport> {
        self.unregister_where(|_| true)
    }

    /// Remove and cancel every subscription whose key satisfies `predicate`,
    /// oldest registration first.
    pub fn unregister_where<P>(&self, predicate: P) -> TesseraResult<TeardownReport>
    where
        P: Fn(&str) -> bool,
    {
        let mut table = self.inner.lock()?;
        let mut doomed: Vec<(String, Subscription)> = Vec::new();
        let keys: Vec<String> = table.keys().filter(|k| predicate(k)).cloned().collect();
        for key in keys {
            if let Some(sub) = table.remove(&key) {
                doomed.push((key, sub));
            }
        }
        doomed.sort_by_key(|(_, sub)| sub.id);

        let mut report = TeardownReport::default();
        for (key, sub) in doomed {
            match finish(&key, sub) {
                Teardown::Failed(e) => report.errors.push(e),
                _ => report.cancelled += 1,
            }
        }
        debug!(
            cancelled = report.cancelled,
            failed = report.errors.len(),
            remaining = table.len(),
            "Bulk unregister complete"
        );
        Ok(report)
    }

    /// Whether `key` currently holds a subscription.
    pub fn has(&self, key: &str) -> TesseraResult<bool> {
        Ok(self.inner.lock()?.contains_key(key))
    }

    /// Number of live subscriptions.
    pub fn count(&self) -> TesseraResult<usize> {
        Ok(self.inner.lock()?.len())
    }

    /// Keys of live subscriptions, oldest registration first.
    pub fn keys(&self) -> TesseraResult<Vec<String>> {
        let table = self.inner.lock()?;
        let mut entries: Vec<(&String, RegistrationId)> =
            table.iter().map(|(k, sub)| (k, sub.id)).collect();
        entries.sort_by_key(|(_, id)| *id);
        Ok(entries.into_iter().map(|(k, _)| k.clone()).collect())
    }

    /// When the subscription under `key` was registered.
    pub fn registered_at(&self, key: &str) -> TesseraResult<Option<Timestamp>> {
        Ok(self.inner.lock()?.get(key).map(|sub| sub.registered_at))
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.inner.table.lock().map(|t| t.len()).ok();
        f.debug_struct("SubscriptionRegistry")
            .field("count", &count)
            .finish()
    }
}

fn finish(key: &str, sub: Subscription) -> Teardown {
    match sub.cancel.invoke(key) {
        Ok(()) => {
            debug!(key = %key, id = sub.id, "Subscription cancelled");
            Teardown::Cancelled
        }
        Err(e) => {
            warn!(key = %key, id = sub.id, error = %e, "Subscription teardown failed");
            Teardown::Failed(e)
        }
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Returned by [`SubscriptionRegistry::register`].
///
/// Dropping the handle leaves the subscription running; call
/// [`unsubscribe`](Self::unsubscribe) or unregister by key to stop it.
#[must_use = "dropping the handle leaves the subscription registered"]
#[derive(Debug)]
pub struct SubscriptionHandle {
    key: String,
    id: RegistrationId,
    registry: Weak<RegistryInner>,
}

impl SubscriptionHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Whether this registration still holds its key.
    pub fn is_current(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        inner
            .table
            .lock()
            .map(|t| t.get(&self.key).is_some_and(|sub| sub.id == self.id))
            .unwrap_or(false)
    }

    /// Cancel this registration.
    ///
    /// A handle whose key was since re-registered by someone else leaves the
    /// newer subscription alone and reports [`Teardown::NotRegistered`].
    pub fn unsubscribe(self) -> TesseraResult<Teardown> {
        let Some(inner) = self.registry.upgrade() else {
            return Ok(Teardown::NotRegistered);
        };
        let mut table = inner.lock()?;
        if !table.get(&self.key).is_some_and(|sub| sub.id == self.id) {
            debug!(key = %self.key, id = self.id, "Handle superseded; nothing to cancel");
            return Ok(Teardown::NotRegistered);
        }
        Ok(match table.remove(&self.key) {
            Some(sub) => finish(&self.key, sub),
            None => Teardown::NotRegistered,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
