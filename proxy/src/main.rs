mod config;
mod middleware;
mod routes;

use std::net::SocketAddr;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::{ProxyConfig, UpstreamPolicy};
use crate::middleware::rate_limit::{run_sweeper, RateLimiter};

/// Shared application state passed to all route handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub upstreams: UpstreamPolicy,
    pub rate_limiter: RateLimiter,
}

pub(crate) fn router(state: AppState) -> Router {
    // Dashboards are served from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/proxy", get(routes::relay::relay))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignored in production where env vars are set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ProxyConfig::from_env()?;
    info!("Configuration loaded (port={})", config.port);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream_timeout_secs))
        .build()?;
    let rate_limiter = RateLimiter::new(config.max_requests_per_ip_per_minute);

    if config.upstreams.is_open() {
        info!("ALLOWED_UPSTREAMS not set: relaying to any http(s) upstream");
    } else {
        info!("Relaying to {} allowed upstream prefix(es)", config.upstreams.len());
    }

    let state = AppState {
        client,
        upstreams: config.upstreams.clone(),
        rate_limiter: rate_limiter.clone(),
    };

    tokio::spawn(run_sweeper(
        rate_limiter,
        Duration::from_secs(config.sweep_interval_secs.max(1)),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("ASPIRE proxy v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    info!("Routes:");
    info!("  GET  /api/health");
    info!("  GET  /proxy?url=<upstream>");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
