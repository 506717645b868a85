//! Marketplace Backend Server
//!
//! Serves the order lifecycle and payment callback API. Persistence falls
//! back to an in-memory store without `DATABASE_URL`, and the read cache to
//! an in-process map without `REDIS_URL`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use marketplace_server::app_state::{AppState, Collaborators};
use marketplace_server::cache::{MemoryCache, RedisCache, ResponseCache};
use marketplace_server::carrier::{CarrierClient, DisabledCarrier, GhnClient};
use marketplace_server::config::AppConfig;
use marketplace_server::payment::HttpTransport;
use marketplace_server::routes;
use marketplace_server::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %format!("{err:#}"), "Server failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url)
                .await
                .context("Failed to connect to PostgreSQL")?,
        ),
        None => {
            warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let cache: Arc<dyn ResponseCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisCache::connect(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            info!("REDIS_URL not set; using in-memory cache");
            Arc::new(MemoryCache::new())
        }
    };

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let carrier: Arc<dyn CarrierClient> = match &config.carrier {
        Some(carrier) => Arc::new(GhnClient::new(http.clone(), carrier.clone())),
        None => {
            info!("GHN credentials not set; carrier shipments disabled");
            Arc::new(DisabledCarrier)
        }
    };

    if config.momo.is_none() {
        info!("MoMo credentials not set; MoMo payments disabled");
    }
    if config.vnpay.is_none() {
        info!("VNPay credentials not set; VNPay payments disabled");
    }

    let state = AppState::assemble(
        &config,
        Collaborators {
            store,
            cache,
            carrier,
            transport: Arc::new(HttpTransport::new(http)),
        },
    );

    let app = routes::app(state).layer(build_cors_layer(&config.cors_allowed_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
