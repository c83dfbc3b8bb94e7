//! volley-stats-back entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volley_stats_back::{
    config::AppConfig,
    dao::{
        match_store::{MatchStore, memory::MemoryMatchStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = storage_backend()?;
    let app_state = AppState::new(config);

    // An unreachable backend at boot is fatal; later outages only degrade the service.
    let store = connect(backend)
        .await
        .with_context(|| format!("connecting to the {backend:?} storage backend"))?;
    store
        .health_check()
        .await
        .context("initial storage health check")?;
    info!(?backend, "storage backend ready");

    let mut boot_store = Some(store);
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        let ready = boot_store.take();
        async move {
            match ready {
                Some(store) => Ok(store),
                None => connect(backend).await,
            }
        }
    }));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// `STORAGE_BACKEND`: `memory` or `mongo`.
fn storage_backend() -> anyhow::Result<Backend> {
    let value = env::var("STORAGE_BACKEND").ok();
    match value.as_deref().map(str::trim) {
        Some("memory") => Ok(Backend::Memory),
        #[cfg(feature = "mongo-store")]
        Some("mongo") | None => Ok(Backend::Mongo),
        #[cfg(not(feature = "mongo-store"))]
        None => Ok(Backend::Memory),
        Some(other) => bail!("unsupported STORAGE_BACKEND `{other}`"),
    }
}

async fn connect(backend: Backend) -> Result<Arc<dyn MatchStore>, StorageError> {
    match backend {
        Backend::Memory => Ok(Arc::new(MemoryMatchStore::new())),
        #[cfg(feature = "mongo-store")]
        Backend::Mongo => connect_mongo().await,
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn MatchStore>, StorageError> {
    use volley_stats_back::dao::match_store::mongodb::{MongoConfig, MongoMatchStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoMatchStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
