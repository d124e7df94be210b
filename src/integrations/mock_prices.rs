use std::sync::Arc;

use crate::{
    error::ProviderError,
    models::{PriceQuery, PriceRow, PriceSource},
    registry::AssetRegistry,
    services::fallback_chain::Provider,
};

/// Last-resort price source backed by the registry's static mock table.
/// Never fails. Only registered assets get a row; anything else stays
/// unresolved and is answered by the cache without being stored.
pub struct MockPriceProvider {
    registry: Arc<AssetRegistry>,
}

impl MockPriceProvider {
    pub fn new(registry: Arc<AssetRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait::async_trait]
impl Provider for MockPriceProvider {
    type Request = PriceQuery;
    type Row = PriceRow;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch(&self, batch: &[PriceQuery]) -> Result<Vec<PriceRow>, ProviderError> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(batch
            .iter()
            .filter_map(|query| {
                let price = self.registry.mock_quote(&query.symbol, query.chain.as_deref())?;
                Some(PriceRow {
                    symbol: query.symbol.clone(),
                    price,
                    source: PriceSource::Mock,
                    timestamp: now,
                    chain: query.chain.clone(),
                })
            })
            .collect())
    }
}
