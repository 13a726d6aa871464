use std::{future::Future, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use axum::{http::Method, Router};
use configs::{AppConfig, StorageConfig};
use models::{catalog::Catalog, fleet::Fleet};
use service::{runtime, RecordStore, ServiceError};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::routes;

/// The record stores shared by all request handlers.
#[derive(Clone)]
pub struct AppStores {
    pub fleet: Arc<RecordStore<Fleet>>,
    pub catalog: Arc<RecordStore<Catalog>>,
}

impl AppStores {
    pub async fn open(storage: &StorageConfig) -> Result<Self, ServiceError> {
        let fleet = RecordStore::<Fleet>::open(storage.fleet_path(), storage.delete_policy).await?;
        let catalog = RecordStore::<Catalog>::open(storage.catalog_path(), storage.delete_policy).await?;
        Ok(Self { fleet, catalog })
    }

    /// Let in-flight operations finish and refuse new ones.
    pub async fn close(&self) {
        self.fleet.close().await;
        self.catalog.close().await;
    }
}

/// Any origin, the four methods the API uses.
pub fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Read `CONFIG_PATH` (default `config.toml`) when it exists, otherwise
/// build the configuration from environment variables.
fn load_config() -> anyhow::Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        return AppConfig::load_and_validate().with_context(|| format!("invalid config file {path}"));
    }
    warn!(%path, "config file not found; using defaults and environment");
    AppConfig::from_env()
}

/// Build the router for already opened stores.
pub fn app(stores: &AppStores) -> Router {
    routes::build_router(stores, build_cors())
}

/// Public entry: open the stores, run the HTTP server until `shutdown`
/// resolves, then close the stores.
pub async fn run<F>(shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cfg = load_config()?;
    runtime::ensure_env(&cfg.storage.data_dir).await?;

    let stores = AppStores::open(&cfg.storage).await.context("cannot open record stores")?;
    let router = app(&stores);

    let addr: SocketAddr = cfg
        .server
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.server.bind_addr()))?;
    info!(%addr, data_dir = %cfg.storage.data_dir, delete_policy = %cfg.storage.delete_policy, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

    stores.close().await;
    info!("server stopped; stores closed");
    Ok(())
}
