use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use warp::Filter;

use index_dashboard::config::AppConfig;
use index_dashboard::routes;
use index_dashboard::services::db::{DbStore, MarketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = AppConfig::from_env()?;
    info!("Using PORT: {}", config.port);

    let db = DbStore::new(&config.database_url, config.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    if db.ping().await.is_err() {
        warn!("Database is not reachable yet; requests will fail until it is");
    }
    let store: Arc<dyn MarketStore> = Arc::new(db);

    // Bind to 0.0.0.0 for container deployments
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(store, Arc::new(config.analysis)).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api)
        .run(addr)
        .await;

    Ok(())
}
