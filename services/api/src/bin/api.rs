//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, ImageCrateCompressor, LocalObjectStorage},
    config::Config,
    error::ApiError,
    web::{build_router, AppState},
};
use bite_core::ports::DatabaseService;
use bite_core::InMemoryDatabase;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set; data lives in memory and is lost on shutdown");
            Arc::new(InMemoryDatabase::new())
        }
    };

    // --- 3. Initialize Storage & Image Adapters ---
    tokio::fs::create_dir_all(&config.storage_path).await?;
    let storage = Arc::new(LocalObjectStorage::new(
        config.storage_path.clone(),
        config.public_base_url.clone(),
    ));
    info!("Object storage rooted at {}", config.storage_path.display());
    let compressor = Arc::new(ImageCrateCompressor::new());

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState::new(db, config.clone(), storage, compressor));
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
