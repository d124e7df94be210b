// src/api/mod.rs

pub mod health;
pub mod prices;
pub mod wallet;
pub mod yields;

use crate::{
    config::Config,
    services::{PriceCache, YieldCache},
};

#[derive(Clone)]
pub struct AppState {
    pub prices: PriceCache,
    pub yields: YieldCache,
    pub config: Config,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::config::test_config;
    use crate::integrations::MockPriceProvider;
    use crate::models::{ProtocolHint, RiskLevel, YieldRow};
    use crate::registry::AssetRegistry;
    use crate::services::fallback_chain::fakes::FakeProvider;
    use crate::services::{PriceChain, YieldChain};
    use std::sync::Arc;
    use std::time::Duration;

    /// Mock-table prices and a pool listing that answers every hint.
    pub fn test_state() -> AppState {
        let registry = Arc::new(AssetRegistry::bundled().unwrap());
        let clock = Arc::new(ManualClock::at(1_700_000_000_000));
        let hints = crate::registry::load_protocol_hints(None).unwrap();

        let prices = PriceCache::new(
            PriceChain::new(Duration::from_secs(1)).with_provider(MockPriceProvider::new(registry)),
            15,
            clock.clone(),
        );
        let listing = FakeProvider::<ProtocolHint, YieldRow>::new("pools", |hints: &[ProtocolHint]| {
            Ok(hints
                .iter()
                .map(|hint| YieldRow {
                    id: format!("{}-{}", hint.project, hint.chain),
                    protocol: hint.name.clone(),
                    chain: hint.chain,
                    asset: hint.asset.clone().unwrap_or_default(),
                    apy: 5.0,
                    tvl_usd: 200_000_000.0,
                    risk: RiskLevel::Medium,
                    url: hint.url.clone(),
                })
                .collect())
        });
        let yields = YieldCache::new(
            YieldChain::new(Duration::from_secs(1)).with_provider(listing),
            hints,
            60,
            clock,
        );

        AppState {
            prices,
            yields,
            config: test_config(),
        }
    }
}
