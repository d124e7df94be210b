use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::{
    error::ProviderError,
    models::{PriceQuery, PriceRow, PriceSource},
    registry::AssetRegistry,
    services::{fallback_chain::Provider, price_guard::sanitize_price_usd},
};

const PROVIDER: &str = "defillama";

#[derive(Debug, Deserialize)]
struct CurrentPricesResponse {
    #[serde(default)]
    coins: HashMap<String, CoinPrice>,
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    price: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Secondary live source: `/prices/current/{chain:address,...}`.
pub struct DefiLlamaPriceProvider {
    client: Client,
    registry: Arc<AssetRegistry>,
    api_url: String,
    timeout: Duration,
}

impl DefiLlamaPriceProvider {
    pub fn new(client: Client, registry: Arc<AssetRegistry>, api_url: String, timeout: Duration) -> Self {
        Self {
            client,
            registry,
            api_url,
            timeout,
        }
    }

    fn coin_ids(&self, batch: &[PriceQuery]) -> Vec<Option<String>> {
        batch
            .iter()
            .map(|query| self.registry.llama_coin_id(&query.symbol, query.chain.as_deref()))
            .collect()
    }

    fn request_url(&self, ids: &BTreeSet<&str>) -> Result<Url, ProviderError> {
        let joined = ids.iter().copied().collect::<Vec<_>>().join(",");
        Url::parse(&format!(
            "{}/prices/current/{}",
            self.api_url.trim_end_matches('/'),
            joined
        ))
        .map_err(|e| ProviderError::parse(PROVIDER, format!("invalid base URL: {}", e)))
    }
}

/// `coin_ids[i]` is the `chain:address` id resolved for `batch[i]`.
pub fn parse_current_prices(
    body: &str,
    batch: &[PriceQuery],
    coin_ids: &[Option<String>],
    timestamp: i64,
) -> Result<Vec<PriceRow>, ProviderError> {
    let response: CurrentPricesResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(PROVIDER, e))?;

    Ok(batch
        .iter()
        .zip(coin_ids)
        .filter_map(|(query, id)| {
            let coin = response.coins.get(id.as_deref()?)?;
            if coin.confidence.is_some_and(|c| c <= 0.0) {
                tracing::debug!("Ignoring zero-confidence DefiLlama quote for {}", query.symbol);
                return None;
            }
            Some(PriceRow {
                symbol: query.symbol.clone(),
                price: sanitize_price_usd(coin.price)?,
                source: PriceSource::Fallback,
                timestamp,
                chain: query.chain.clone(),
            })
        })
        .collect())
}

#[async_trait::async_trait]
impl Provider for DefiLlamaPriceProvider {
    type Request = PriceQuery;
    type Row = PriceRow;

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, batch: &[PriceQuery]) -> Result<Vec<PriceRow>, ProviderError> {
        let coin_ids = self.coin_ids(batch);
        let unique: BTreeSet<&str> = coin_ids.iter().filter_map(|id| id.as_deref()).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(self.request_url(&unique)?)
            .send()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e, self.timeout))?;
        if !response.status().is_success() {
            return Err(ProviderError::Http {
                provider: PROVIDER,
                status: response.status().as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(PROVIDER, e, self.timeout))?;

        parse_current_prices(&body, batch, &coin_ids, chrono::Utc::now().timestamp_millis())
    }
}
