use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod clock;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod registry;
mod services;
mod websocket;

use config::Config;
use constants::API_VERSION;
use registry::AssetRegistry;
use services::{PriceCache, YieldCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yieldfeed_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting yieldfeed backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    // Static configuration data
    let registry = Arc::new(AssetRegistry::load(config.asset_registry_path.as_deref())?);
    let hints = registry::load_protocol_hints(config.protocol_hints_path.as_deref())?;
    if registry.is_empty() {
        tracing::warn!("Asset registry is empty; every price will resolve to zero");
    }
    tracing::info!(
        "Loaded {} assets and {} protocol hints",
        registry.len(),
        hints.len()
    );

    // Caches
    let clock = clock::system_clock();
    let price_chain = integrations::build_price_chain(&config, registry.clone())?;
    tracing::info!("Price providers: {:?}", price_chain.provider_names());
    let prices = PriceCache::new(price_chain, config.price_cache_ttl_secs, clock.clone());
    let yields = YieldCache::new(
        integrations::build_yield_chain(&config)?,
        hints,
        config.yield_cache_ttl_secs,
        clock,
    );

    if config.warm_caches_on_start {
        services::start_background_services(prices.clone(), yields.clone(), registry.symbols());
    }

    let app_state = api::AppState {
        prices,
        yields,
        config: config.clone(),
    };
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Prices
        .route("/api/v1/prices", get(api::prices::get_prices))
        .route(
            "/api/v1/prices/status",
            get(api::prices::get_price_cache_status),
        )
        .route(
            "/api/v1/prices/cache",
            delete(api::prices::clear_price_cache),
        )
        .route("/api/v1/prices/{symbol}", get(api::prices::get_price))
        .route(
            "/api/v1/prices/{symbol}/cached",
            get(api::prices::get_cached_price),
        )
        // Yields
        .route("/api/v1/yields/live", get(api::yields::get_live_yields))
        .route(
            "/api/v1/yields/status",
            get(api::yields::get_yield_cache_status),
        )
        .route(
            "/api/v1/yields/cache",
            delete(api::yields::clear_yield_cache),
        )
        // Wallet valuation
        .route("/api/v1/wallet/value", post(api::wallet::value_wallet))
        .route("/api/v1/wallet/total", post(api::wallet::wallet_total))
        // WebSocket endpoints
        .route("/ws/prices", get(websocket::prices::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
