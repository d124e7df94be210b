// Cache and provider-orchestration services
pub mod fallback_chain;
pub mod flight;
pub mod price_cache;
pub mod price_guard;
pub mod yield_cache;
pub mod yield_metrics;

// Re-export for convenience
pub use price_cache::{PriceCache, PriceChain};
pub use yield_cache::{YieldCache, YieldChain};

use crate::models::PriceQuery;

/// Fill both caches once so the first API callers hit warm data.
pub async fn warm_caches(prices: &PriceCache, yields: &YieldCache, symbols: &[String]) {
    let queries: Vec<PriceQuery> = symbols.iter().map(|s| PriceQuery::new(s, None)).collect();
    let (rows, bundle) = tokio::join!(prices.get_prices(&queries), yields.live_bundle());
    tracing::info!(
        "Caches warmed: {} prices, {} yield protocols",
        rows.len(),
        bundle.protocols.len()
    );
}

/// Start background services
pub fn start_background_services(prices: PriceCache, yields: YieldCache, symbols: Vec<String>) {
    tracing::info!("Starting background cache warm-up...");
    tokio::spawn(async move {
        warm_caches(&prices, &yields, &symbols).await;
    });
}
