//! Game settings sync binary entrypoint wiring the REST/SSE surface, remote store and fallback copy.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_settings_sync::{
    config::AppConfig,
    dao::fallback::FileFallbackStore,
    routes,
    services::change_listener,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let fallback = Arc::new(FileFallbackStore::new(config.fallback_directory()));
    info!(directory = %fallback.directory().display(), "using fallback store");
    let app_state = AppState::new(&config, fallback);

    spawn_storage_supervisor(&app_state);
    // Serve something right away; the supervisor refetches once the remote store connects.
    let outcome = app_state.settings().fetch().await;
    info!(?outcome, "initial game settings loaded");
    let subscription = change_listener::subscribe(app_state.settings().clone());

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    subscription.unsubscribe();
    Ok(())
}

/// Connect the CouchDB store in the background when it is configured.
#[cfg(feature = "couch-store")]
fn spawn_storage_supervisor(state: &SharedState) {
    use game_settings_sync::{
        dao::settings_store::{
            SettingsStore,
            couchdb::{CouchConfig, CouchSettingsStore},
        },
        dao::storage::StorageError,
        services::storage_supervisor,
    };

    let config = match CouchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "remote store not configured; serving from the fallback store only");
            return;
        }
    };

    info!(base_url = %config.base_url, database = %config.database, "connecting to CouchDB");
    tokio::spawn(storage_supervisor::run(state.settings().clone(), move || {
        let config = config.clone();
        async move {
            CouchSettingsStore::connect(config)
                .await
                .map(|store| Arc::new(store) as Arc<dyn SettingsStore>)
                .map_err(StorageError::from)
        }
    }));
}

#[cfg(not(feature = "couch-store"))]
fn spawn_storage_supervisor(_state: &SharedState) {
    warn!("built without a remote store backend; serving from the fallback store only");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
