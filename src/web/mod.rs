//! Web server module

pub mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::geoip::SharedGeoLocator;

/// Shared, read-only handler state. Built once at start.
pub struct AppState {
    /// `None` when no datastore is configured
    pub db: Option<Database>,
    pub geo: SharedGeoLocator,
}

impl AppState {
    pub fn new(db: Option<Database>, geo: SharedGeoLocator) -> Self {
        Self { db, geo }
    }

    pub fn database(&self) -> Result<&Database, AppError> {
        self.db.as_ref().ok_or(AppError::NotConfigured)
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/visitors",
            get(routes::visitor_analytics).post(routes::track_visitor),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(config: &Config, state: Arc<AppState>) -> Result<()> {
    let app = build_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
