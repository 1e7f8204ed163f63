use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use mimi_media::{
    config::Config,
    db::{self, CatalogStore, MemoryCatalogStore, PgCatalogStore},
    routes::create_router,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mimi_media=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let store: Arc<dyn CatalogStore> = match config.database.url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(&config.database, url).await?;

            info!("Running database migrations...");
            db::run_migrations(&pool).await?;
            info!("Database migrations completed");

            Arc::new(PgCatalogStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory catalog (nothing is persisted)");
            let memory = MemoryCatalogStore::new();
            for product_id in &config.database.memory_product_ids {
                memory.register_product(*product_id).await;
            }
            Arc::new(memory)
        }
    };

    // Create shared state
    let state = AppState::new(config.clone(), store)?;
    info!(
        root = %state.catalog.assets().root().display(),
        avatars = %state.avatars.store.root().display(),
        "Asset stores ready"
    );

    // Create router
    let app = create_router(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
