pub mod coingecko;
pub mod defillama_prices;
pub mod defillama_yields;
pub mod mock_prices;

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    constants::PRICE_CONNECT_TIMEOUT_SECS,
    registry::AssetRegistry,
    services::{PriceChain, YieldChain},
};

pub use coingecko::CoinGeckoPriceProvider;
pub use defillama_prices::DefiLlamaPriceProvider;
pub use defillama_yields::DefiLlamaYieldProvider;
pub use mock_prices::MockPriceProvider;

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(PRICE_CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("HTTP client init failed: {}", e))
}

/// Price sources in priority order. With live prices disabled only the mock
/// table remains.
pub fn build_price_chain(config: &Config, registry: Arc<AssetRegistry>) -> anyhow::Result<PriceChain> {
    let timeout = config.provider_timeout();
    let mut chain = PriceChain::new(timeout);

    if config.live_prices_enabled {
        chain = chain
            .with_provider(CoinGeckoPriceProvider::new(
                http_client(timeout)?,
                registry.clone(),
                config.coingecko_api_url.clone(),
                config.coingecko_api_key.clone(),
                timeout,
            ))
            .with_provider(DefiLlamaPriceProvider::new(
                http_client(timeout)?,
                registry.clone(),
                config.defillama_price_api_url.clone(),
                timeout,
            ));
    } else {
        tracing::info!("Live prices disabled, serving the mock table only");
    }

    Ok(chain.with_provider(MockPriceProvider::new(registry)))
}

pub fn build_yield_chain(config: &Config) -> anyhow::Result<YieldChain> {
    let timeout = config.provider_timeout();
    Ok(YieldChain::new(timeout).with_provider(DefiLlamaYieldProvider::new(
        http_client(timeout)?,
        config.defillama_yields_api_url.clone(),
        timeout,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn disabled_live_prices_leave_only_mock() {
        let registry = Arc::new(AssetRegistry::bundled().unwrap());
        let chain = build_price_chain(&test_config(), registry).unwrap();
        assert_eq!(chain.provider_names(), vec!["mock"]);
    }

    #[test]
    fn live_chain_tries_coingecko_then_defillama_then_mock() {
        let mut config = test_config();
        config.live_prices_enabled = true;
        let registry = Arc::new(AssetRegistry::bundled().unwrap());

        let chain = build_price_chain(&config, registry).unwrap();

        assert_eq!(chain.provider_names(), vec!["coingecko", "defillama", "mock"]);
    }

    #[test]
    fn yield_chain_has_pool_listing_provider() {
        let chain = build_yield_chain(&test_config()).unwrap();
        assert_eq!(chain.provider_names(), vec!["defillama-yields"]);
    }
}
