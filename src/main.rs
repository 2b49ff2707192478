use anyhow::{Context, Result};
use parcel_valuation::api::{router, AppState};
use parcel_valuation::valuation::{AppConfig, Valuator};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("🏠 Starting parcel valuation API server...");

    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    info!(
        "Search radius {}..{} mi (+{}), min {} comparables, {:?}",
        config.search.initial_radius,
        config.search.max_radius,
        config.search.radius_increment,
        config.search.min_comparables,
        config.search.strictness
    );

    let valuator = Valuator::from_config(&config)?;
    let state = AppState {
        valuator: Arc::new(valuator),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🚀 Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
