use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use portal_api::config::{self, AppConfig, Environment};
use portal_api::database::{DatabaseManager, MemoryStore, PgStore, Store};
use portal_api::features::FeatureCatalog;
use portal_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("portal_api=info,tower_http=info")),
        )
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    tracing::info!("Starting portal API in {:?} mode", config.environment);
    if portal_api::is_production!() && !config.security.secure_cookies {
        tracing::warn!("SECURITY_SECURE_COOKIES is off in production; session cookies will be sent over plain HTTP");
    }

    let state = build_state(config).await?;
    let port = state.config.api.port;
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Portal API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Postgres when DATABASE_URL is set; an in-memory store only in development
async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    if config.database.url.is_some() {
        let pool = DatabaseManager::connect(&config.database).await?;
        DatabaseManager::migrate(&pool).await?;
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
        return Ok(AppState::new(store, config).with_pool(pool));
    }

    if config.environment != Environment::Development {
        bail!("DATABASE_URL is required outside development");
    }

    tracing::warn!("DATABASE_URL not set, using the in-memory store; nothing will persist");
    let store = MemoryStore::new();
    let catalog_path = Path::new(&config.features.catalog_path);
    if catalog_path.exists() {
        let catalog = FeatureCatalog::load(catalog_path)?;
        catalog.seed(&store).await?;
    }

    let store: Arc<dyn Store> = Arc::new(store);
    Ok(AppState::new(store, config))
}
