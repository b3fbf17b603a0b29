//! Connectivity controller.
//!
//! Mirrors the runtime's online/offline signal into the transport's network
//! toggle. Transitions are applied one at a time in arrival order; a
//! transition equal to the last applied mode is ignored, and the transport is
//! only toggled when its known state differs from the requested one.
//!
//! A failed toggle is logged and leaves the recorded transport state alone,
//! so the next transition retries the call.

use std::fmt;
use std::sync::{Arc, Weak};

use tessera_core::{NetworkMode, NetworkToggle, SyncConfig, TesseraResult};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::registry::{SubscriptionRegistry, Teardown};
use crate::transport::{CancelFn, ConnectivitySource, RemoteTransport};

/// Registry key reserved for the connectivity listener.
pub const CONNECTIVITY_LISTENER_KEY: &str = "tessera:connectivity";

#[derive(Debug, Default)]
struct ToggleState {
    /// Last mode handed to `apply`.
    observed: Option<NetworkMode>,
    /// Network state the transport last confirmed; `None` until the first
    /// toggle succeeds.
    transport_enabled: Option<bool>,
}

/// Keeps the transport's network state in line with runtime connectivity.
///
/// Construct once per process, behind an `Arc`.
pub struct ConnectivityController {
    transport: Arc<dyn RemoteTransport>,
    source: Arc<dyn ConnectivitySource>,
    registry: SubscriptionRegistry,
    state: Mutex<ToggleState>,
    mode_tx: watch::Sender<Option<NetworkMode>>,
    assume_online: bool,
}

impl ConnectivityController {
    pub fn new(
        transport: Arc<dyn RemoteTransport>,
        source: Arc<dyn ConnectivitySource>,
        registry: SubscriptionRegistry,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let (mode_tx, _mode_rx) = watch::channel(None);
        Arc::new(Self {
            transport,
            source,
            registry,
            state: Mutex::new(ToggleState::default()),
            mode_tx,
            assume_online: config.assume_online,
        })
    }

    /// Begin mirroring connectivity. Calling it again while started is a
    /// no-op.
    ///
    /// The runtime's current mode is applied before this returns. When the
    /// runtime cannot report one, `assume_online` from the config decides.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(self: &Arc<Self>) -> TesseraResult<()> {
        if self.registry.has(CONNECTIVITY_LISTENER_KEY)? {
            debug!("Connectivity controller already started");
            return Ok(());
        }

        // Listen before reading the initial mode so no transition is lost;
        // anything queued that matches the initial mode is dropped by apply.
        let (tx, mut rx) = mpsc::unbounded_channel::<NetworkMode>();
        let listener_cancel = self.source.listen(Arc::new(move |mode: NetworkMode| {
            if tx.send(mode).is_err() {
                debug!(mode = %mode, "Connectivity worker gone; dropping transition");
            }
        }));

        let initial = match self.source.current_mode().await {
            Some(mode) => mode,
            None => {
                let assumed = NetworkMode::from_online(self.assume_online);
                info!(assumed = %assumed, "Runtime did not report connectivity");
                assumed
            }
        };
        self.apply(initial).await;

        let weak: Weak<Self> = Arc::downgrade(self);
        let worker = tokio::spawn(async move {
            while let Some(mode) = rx.recv().await {
                match weak.upgrade() {
                    Some(controller) => controller.apply(mode).await,
                    None => break,
                }
            }
            debug!("Connectivity worker stopped");
        });
        let abort = worker.abort_handle();

        let cancel = CancelFn::fallible(move || {
            let result = listener_cancel.call();
            abort.abort();
            result
        });
        let _handle = self.registry.register(CONNECTIVITY_LISTENER_KEY, cancel)?;
        info!(mode = %initial, "Connectivity controller started");
        Ok(())
    }

    /// Stop mirroring connectivity. The transport keeps its current state.
    pub fn stop(&self) -> TesseraResult<Teardown> {
        let outcome = self.registry.unregister(CONNECTIVITY_LISTENER_KEY)?;
        if outcome.removed() {
            info!("Connectivity controller stopped");
        }
        Ok(outcome)
    }

    pub fn is_started(&self) -> TesseraResult<bool> {
        self.registry.has(CONNECTIVITY_LISTENER_KEY)
    }

    /// Apply one connectivity transition.
    ///
    /// Transitions are serialized: a second call waits for the first to
    /// finish its transport round-trip.
    pub async fn apply(&self, mode: NetworkMode) {
        let mut state = self.state.lock().await;
        if state.observed == Some(mode) {
            debug!(mode = %mode, "Connectivity unchanged; ignoring");
            return;
        }
        info!(from = ?state.observed, to = %mode, "Connectivity transition");
        state.observed = Some(mode);

        let want_enabled = mode.is_online();
        if state.transport_enabled == Some(want_enabled) {
            debug!(mode = %mode, "Transport already in requested state");
        } else {
            let toggle = mode.toggle();
            let result = match toggle {
                NetworkToggle::Enable => self.transport.enable_network().await,
                NetworkToggle::Disable => self.transport.disable_network().await,
            };
            match result {
                Ok(()) => {
                    state.transport_enabled = Some(want_enabled);
                    debug!(toggle = %toggle, "Transport network toggled");
                }
                Err(e) => {
                    warn!(
                        toggle = %toggle,
                        error = %e,
                        "Network toggle failed; will retry on next transition"
                    );
                }
            }
        }

        self.mode_tx.send_replace(Some(mode));
    }

    /// Last applied mode, `None` before the first transition.
    pub fn mode(&self) -> Option<NetworkMode> {
        *self.mode_tx.borrow()
    }

    /// Whether the last applied mode is online. Before the first transition
    /// this falls back to `assume_online`.
    pub fn is_online(&self) -> bool {
        self.mode()
            .map(NetworkMode::is_online)
            .unwrap_or(self.assume_online)
    }

    /// Observe applied modes.
    pub fn watch(&self) -> watch::Receiver<Option<NetworkMode>> {
        self.mode_tx.subscribe()
    }
}

impl fmt::Debug for ConnectivityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityController")
            .field("mode", &self.mode())
            .field("assume_online", &self.assume_online)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
