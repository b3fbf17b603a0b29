//! TESSERA demo host
//!
//! Runs the sync layer against the in-memory store: opens a live feed, reads
//! through the cache, flips connectivity, evaluates guarded views and signs
//! out. Everything it does is visible in the logs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tessera_client::telemetry::{init_tracing, TelemetryConfig};
use tessera_client::{
    AppState, Collaborators, GuardOutcome, Identity, IdentityState, InMemoryTransport,
    ManualConnectivity, NetworkMode, Query, Role, Snapshot, StaticIdentity, SyncConfig,
    TesseraResult, TransportError,
};

#[tokio::main]
async fn main() -> TesseraResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = SyncConfig::from_env()?;
    let store = InMemoryTransport::new();
    let network = ManualConnectivity::new(Some(NetworkMode::Online));
    let identity = StaticIdentity::default();

    let app = AppState::new(
        config,
        Collaborators {
            transport: Arc::new(store.clone()),
            connectivity: Arc::new(network.clone()),
            identity: Arc::new(identity.clone()),
        },
    )?;
    app.start().await?;

    store.put("posts/welcome", json!({"title": "Welcome", "status": "published"}));
    store.put("posts/draft", json!({"title": "Draft", "status": "draft"}));

    let feed = Query::collection("posts").where_eq("status", "published");
    let _feed = app.live.watch(
        "posts:list",
        &feed,
        Arc::new(|snapshot: Snapshot| {
            let ids: Vec<&str> = snapshot.documents.iter().map(|d| d.id()).collect();
            tracing::info!(query = %snapshot.query, ids = ?ids, "Feed updated");
        }),
        Arc::new(|e: TransportError| tracing::warn!(error = %e, "Feed failed")),
    )?;

    store.put("posts/launch", json!({"title": "Launch", "status": "published"}));

    let welcome = app.live.fetch_once("posts/welcome").await?;
    tracing::info!(document = %welcome, "Fetched once");

    network.go_offline();
    wait_for_mode(&app, NetworkMode::Offline).await;
    match app.live.fetch_once("posts/draft").await {
        Ok(doc) => tracing::info!(document = %doc, "Served while offline"),
        Err(e) => tracing::info!(error = %e, "Uncached read failed while offline"),
    }
    network.go_online();
    wait_for_mode(&app, NetworkMode::Online).await;

    let editor_page = app.guard(Role::Editor);
    log_outcome("editor page (loading)", editor_page.render(|id| id.uid.clone()));

    identity.set(IdentityState::SignedIn(Identity::active("ada", Role::Author)));
    log_outcome("editor page (author)", editor_page.render(|id| id.uid.clone()));

    identity.set(IdentityState::SignedIn(Identity::active("grace", Role::Admin)));
    log_outcome("editor page (admin)", editor_page.render(|id| id.uid.clone()));

    let report = app.sign_out()?;
    identity.set(IdentityState::SignedOut);
    tracing::info!(
        cancelled = report.cancelled,
        remaining = app.registry.count()?,
        "Session closed"
    );

    app.shutdown()?;
    Ok(())
}

async fn wait_for_mode(app: &AppState, mode: NetworkMode) {
    let mut rx = app.connectivity.watch();
    let waited = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|m| *m == Some(mode)));
    if waited.await.is_err() {
        tracing::warn!(mode = %mode, "Connectivity change not observed in time");
    }
}

fn log_outcome(view: &str, outcome: GuardOutcome<String>) {
    match outcome {
        GuardOutcome::Loading => tracing::info!(view, "Identity loading"),
        GuardOutcome::Render(uid) => tracing::info!(view, uid = %uid, "Rendered"),
        GuardOutcome::Redirect(target) => {
            tracing::info!(view, target = target.path(), "Redirected")
        }
    }
}
