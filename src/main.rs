//! League tracker binary entrypoint wiring REST, SSE and the document storage backend.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::{AppConfig, StorageBackend};
use dao::document_store::{DocumentStore, memory::MemoryDocumentStore};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let documents = connect_storage(&config).await?;

    // The initial active year is the current calendar year.
    let year = OffsetDateTime::now_utc().year();
    let app_state = AppState::new(documents, config, year).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, year, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.shutdown().await;
    Ok(())
}

/// Instantiate the configured storage backend.
async fn connect_storage(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.storage() {
        StorageBackend::Memory => {
            warn!("using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        StorageBackend::Mongo => connect_mongo(config).await,
    }
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo(config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    use dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();

    let mongo_config = MongoConfig::from_uri(
        &mongo_uri,
        mongo_db.as_deref(),
        config.mongo_refresh_interval(),
    )
    .await
    .context("parsing MongoDB URI")?;
    let store = MongoDocumentStore::connect(mongo_config)
        .await
        .context("connecting to MongoDB")?;

    info!("connected to MongoDB");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongo-store"))]
async fn connect_mongo(_config: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    anyhow::bail!("storage `mongo` requested but the `mongo-store` feature is disabled")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
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
