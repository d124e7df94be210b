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

const PROVIDER: &str = "coingecko";

#[derive(Debug, Deserialize)]
struct SimplePriceQuote {
    #[serde(default)]
    usd: Option<f64>,
}

/// Primary live source: `/simple/price`, keyed by the registry's CoinGecko ids.
pub struct CoinGeckoPriceProvider {
    client: Client,
    registry: Arc<AssetRegistry>,
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl CoinGeckoPriceProvider {
    pub fn new(
        client: Client,
        registry: Arc<AssetRegistry>,
        api_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            api_url,
            api_key,
            timeout,
        }
    }

    fn request_url(&self, ids: &BTreeSet<&str>) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!(
            "{}/simple/price",
            self.api_url.trim_end_matches('/')
        ))
        .map_err(|e| ProviderError::parse(PROVIDER, format!("invalid base URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("ids", &ids.iter().copied().collect::<Vec<_>>().join(","))
            .append_pair("vs_currencies", "usd");
        Ok(url)
    }
}

/// Maps a `/simple/price` body back onto the requested queries. Queries whose
/// id is unknown or whose quote is missing or non-positive are left out.
pub fn parse_simple_price(
    body: &str,
    batch: &[PriceQuery],
    registry: &AssetRegistry,
    timestamp: i64,
) -> Result<Vec<PriceRow>, ProviderError> {
    let quotes: HashMap<String, SimplePriceQuote> =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(PROVIDER, e))?;

    Ok(batch
        .iter()
        .filter_map(|query| {
            let id = registry.coingecko_id(&query.symbol)?;
            let price = sanitize_price_usd(quotes.get(id)?.usd?)?;
            Some(PriceRow {
                symbol: query.symbol.clone(),
                price,
                source: PriceSource::Live,
                timestamp,
                chain: query.chain.clone(),
            })
        })
        .collect())
}

#[async_trait::async_trait]
impl Provider for CoinGeckoPriceProvider {
    type Request = PriceQuery;
    type Row = PriceRow;

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, batch: &[PriceQuery]) -> Result<Vec<PriceRow>, ProviderError> {
        let ids: BTreeSet<&str> = batch
            .iter()
            .filter_map(|query| self.registry.coingecko_id(&query.symbol))
            .collect();
        // Nothing listed on CoinGecko; the chain passes these on unresolved.
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.get(self.request_url(&ids)?);
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            request = request.header("x-cg-demo-api-key", key.trim());
        }

        let response = request
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

        let rows = parse_simple_price(&body, batch, &self.registry, chrono::Utc::now().timestamp_millis())?;
        tracing::debug!("CoinGecko resolved {}/{} symbols", rows.len(), batch.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AssetRegistry {
        AssetRegistry::bundled().unwrap()
    }

    #[test]
    fn parses_quotes_in_request_order() {
        let body = r#"{"solana":{"usd":142.31},"ethereum":{"usd":3012.5}}"#;
        let batch = vec![PriceQuery::new("ETH", None), PriceQuery::new("SOL", None)];

        let rows = parse_simple_price(body, &batch, &registry(), 42).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "ETH");
        assert_eq!(rows[0].price, 3012.5);
        assert_eq!(rows[1].price, 142.31);
        assert!(rows.iter().all(|row| row.source == PriceSource::Live && row.timestamp == 42));
    }

    #[test]
    fn missing_and_zero_quotes_are_skipped() {
        let body = r#"{"ethereum":{"usd":0},"bitcoin":{}}"#;
        let batch = vec![
            PriceQuery::new("ETH", None),
            PriceQuery::new("BTC", None),
            PriceQuery::new("SOL", None),
            PriceQuery::new("UNLISTED", None),
        ];

        let rows = parse_simple_price(body, &batch, &registry(), 0).unwrap();

        assert!(rows.is_empty());
    }

    #[test]
    fn chain_qualifier_is_carried_through() {
        let body = r#"{"usd-coin":{"usd":0.9998}}"#;
        let batch = vec![PriceQuery::new("usdc", Some("base"))];

        let rows = parse_simple_price(body, &batch, &registry(), 0).unwrap();

        assert_eq!(rows[0].key(), "USDC:base");
    }

    #[test]
    fn malformed_body_is_parse_error() {
        let err = parse_simple_price("<html>", &[], &registry(), 0).unwrap_err();
        assert!(matches!(err, ProviderError::Parse { provider: "coingecko", .. }));
    }

    #[test]
    fn request_url_joins_ids() {
        let provider = CoinGeckoPriceProvider::new(
            Client::new(),
            Arc::new(registry()),
            "https://api.example.com/api/v3/".to_string(),
            None,
            Duration::from_secs(1),
        );
        let ids: BTreeSet<&str> = ["solana", "bitcoin"].into_iter().collect();

        let url = provider.request_url(&ids).unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v3/simple/price?ids=bitcoin%2Csolana&vs_currencies=usd"
        );
    }

    #[tokio::test]
    async fn unknown_symbols_skip_the_round_trip() {
        let provider = CoinGeckoPriceProvider::new(
            Client::new(),
            Arc::new(registry()),
            "http://127.0.0.1:9".to_string(),
            None,
            Duration::from_secs(1),
        );
        let rows = provider.fetch(&[PriceQuery::new("UNLISTED", None)]).await.unwrap();
        assert!(rows.is_empty());
    }
}
