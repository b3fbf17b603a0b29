//! Shared application state.

use std::fmt;
use std::sync::Arc;

use tessera_access::{authorize, authorize_mutation, Guard, IdentityProvider};
use tessera_core::{AccessDecision, Clock, Role, SyncConfig, SystemClock, TesseraResult};
use tessera_storage::CacheConfig;
use tessera_sync::{
    ConnectivityController, ConnectivitySource, DocumentCache, LiveQueries, RemoteTransport,
    SubscriptionRegistry, TeardownReport, CONNECTIVITY_LISTENER_KEY,
};
use tracing::{info, warn};

/// External systems the state is built over.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn RemoteTransport>,
    pub connectivity: Arc<dyn ConnectivitySource>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Application-wide state shared by every view.
///
/// One instance per process. Cloning is cheap and every clone shares the same
/// cache, registry and connectivity controller.
#[derive(Clone)]
pub struct AppState {
    pub config: SyncConfig,
    /// Entity cache keyed by document path.
    pub cache: Arc<DocumentCache>,
    /// Every live subscription, the connectivity listener included.
    pub registry: SubscriptionRegistry,
    pub connectivity: Arc<ConnectivityController>,
    pub live: LiveQueries,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Build the state on the system clock.
    ///
    /// # Errors
    /// Config validation errors and invalid cache settings.
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> TesseraResult<Self> {
        Self::with_clock(config, collaborators, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: SyncConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> TesseraResult<Self> {
        config.validate()?;

        let cache = Arc::new(DocumentCache::with_clock(
            CacheConfig::from(&config),
            Arc::clone(&clock),
        )?);
        let registry = SubscriptionRegistry::with_clock(clock);
        let connectivity = ConnectivityController::new(
            Arc::clone(&collaborators.transport),
            collaborators.connectivity,
            registry.clone(),
            &config,
        );
        let live = LiveQueries::new(
            collaborators.transport,
            registry.clone(),
            Arc::clone(&cache),
        );

        Ok(Self {
            config,
            cache,
            registry,
            connectivity,
            live,
            identity: collaborators.identity,
        })
    }

    /// Start connectivity mirroring. Safe to call more than once.
    pub async fn start(&self) -> TesseraResult<()> {
        self.connectivity.start().await
    }

    /// Guard for a view that requires `required`.
    pub fn guard(&self, required: Role) -> Guard<'_> {
        Guard::new(self.identity.as_ref(), required)
    }

    /// Decision for the current identity. A still-loading identity counts as
    /// signed out.
    pub fn authorize(&self, required: Role) -> AccessDecision {
        let state = self.identity.identity_state();
        authorize(state.identity(), required)
    }

    /// Gate a write on the current identity.
    pub fn authorize_mutation(&self, required: Role) -> TesseraResult<()> {
        let state = self.identity.identity_state();
        authorize_mutation(state.identity(), required)
    }

    /// Tear down the session: every live query except the connectivity
    /// listener is cancelled and the cache is emptied.
    pub fn sign_out(&self) -> TesseraResult<TeardownReport> {
        let report = self
            .registry
            .unregister_where(|key| key != CONNECTIVITY_LISTENER_KEY)?;
        self.cache.clear()?;
        if !report.is_clean() {
            warn!(failed = report.errors.len(), "Some subscriptions failed to tear down");
        }
        info!(cancelled = report.cancelled, "Signed out; session state cleared");
        Ok(report)
    }

    /// Tear down everything, connectivity listener included.
    pub fn shutdown(&self) -> TesseraResult<TeardownReport> {
        let report = self.registry.unregister_all()?;
        info!(
            cancelled = report.cancelled,
            failed = report.errors.len(),
            "Shutdown complete"
        );
        Ok(report)
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("connectivity", &self.connectivity)
            .finish()
    }
}
