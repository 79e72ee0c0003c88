use dotenv::dotenv;
use retail_core::config::Config;
use retail_core::returns::ReturnService;
use retail_core::store::PgStore;
use retail_core::{create_router, db, AppState};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting Retail Core Server...");

    let config = Config::from_env()?;

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;
    if config.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let returns = ReturnService::new(Arc::new(PgStore::new(pool)));
    let app = create_router(AppState::new(returns, &config.jwt_secret));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
