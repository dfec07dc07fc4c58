use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use visitor_analytics::config::{Config, LoggingConfig};
use visitor_analytics::db::Database;
use visitor_analytics::geoip::IpApiLocator;
use visitor_analytics::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;
    init_logging(&config.logging);

    info!("Starting visitor analytics...");

    let db = if config.database.is_configured() {
        let db = Database::new(&config.database).await?;
        db.run_migrations().await?;
        info!("Database initialized");
        Some(db)
    } else {
        warn!("Database not configured; visitor routes will return errors");
        None
    };

    let geo = Arc::new(IpApiLocator::new(&config.geoip)?);
    info!("GeoIP lookups via {}", config.geoip.endpoint);

    let state = Arc::new(AppState::new(db.clone(), geo));
    web::start_server(&config, state).await?;

    if let Some(db) = db {
        db.close().await;
    }

    Ok(())
}

/// Use LOG_FORMAT=gcp (or logging.format) for structured GCP Cloud Logging.
/// RUST_LOG, when set, overrides the configured level.
fn init_logging(logging: &LoggingConfig) {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
