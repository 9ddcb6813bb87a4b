mod config;
mod error;
mod handlers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use reconciler::{EngineConfig, HttpFeedClient, Reconciler, TodoistClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::routes::create_app;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backend=debug,reconciler=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let engine = Arc::new(EngineConfig::from_env().context("Invalid engine configuration")?);

    tracing::info!(sources = engine.sources.len(), "Starting stay-ops backend server");

    let feed = HttpFeedClient::new(engine.fetch_timeout, engine.feed_cache_ttl)
        .context("Failed to build feed client")?;
    let store = TodoistClient::new(&engine.todoist_base_url, &engine.todoist_token);
    let reconciler = Reconciler::new(engine, Arc::new(feed), Arc::new(store));

    let app = create_app(AppState::new(reconciler), build_cors_layer(&config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build CORS layer from `CORS_ALLOWED_ORIGINS`. Permissive when unset.
fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    match config.cors_allowed_origins {
        Some(ref origins) => {
            let origins: Vec<_> = origins.iter().filter_map(|s| s.parse().ok()).collect();

            if origins.is_empty() {
                tracing::warn!("CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS");
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::warn!("CORS_ALLOWED_ORIGINS not set, using permissive CORS");
            CorsLayer::permissive()
        }
    }
}
