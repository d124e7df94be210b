use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::{
    error::ProviderError,
    models::{Chain, ProtocolHint, YieldRow},
    services::{
        fallback_chain::Provider,
        yield_metrics::{classify_risk, normalize_apy, sanitize_tvl, upstream_apy, yield_row_id},
    },
};

const PROVIDER: &str = "defillama-yields";

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    #[serde(default)]
    status: Option<String>,
    data: Vec<LlamaPool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlamaPool {
    pub chain: String,
    pub project: String,
    pub symbol: String,
    #[serde(default)]
    pub tvl_usd: Option<f64>,
    #[serde(default)]
    pub apy: Option<f64>,
    #[serde(default)]
    pub apy_base: Option<f64>,
    #[serde(default)]
    pub apy_reward: Option<f64>,
    #[serde(default)]
    pub pool: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl LlamaPool {
    fn tvl(&self) -> f64 {
        sanitize_tvl(self.tvl_usd.unwrap_or(0.0))
    }
}

/// Pool listing source: one `/pools` call answers every hint.
pub struct DefiLlamaYieldProvider {
    client: Client,
    api_url: String,
    timeout: Duration,
}

impl DefiLlamaYieldProvider {
    pub fn new(client: Client, api_url: String, timeout: Duration) -> Self {
        Self {
            client,
            api_url,
            timeout,
        }
    }
}

pub fn parse_pools(body: &str) -> Result<Vec<LlamaPool>, ProviderError> {
    let response: PoolsResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(PROVIDER, e))?;
    match response.status.as_deref() {
        None | Some("success") => Ok(response.data),
        Some(other) => Err(ProviderError::parse(
            PROVIDER,
            format!("unexpected status {}", other),
        )),
    }
}

/// Picks the pool a hint refers to: project substring and exact chain, then
/// exact asset symbol, falling back to a partial symbol match. Ties go to the
/// largest TVL.
pub fn best_pool<'a>(hint: &ProtocolHint, pools: &'a [LlamaPool]) -> Option<&'a LlamaPool> {
    let project = hint.project.to_ascii_lowercase();
    let candidates: Vec<&LlamaPool> = pools
        .iter()
        .filter(|pool| pool.project.to_ascii_lowercase().contains(&project))
        .filter(|pool| pool.chain.parse::<Chain>().ok() == Some(hint.chain))
        .collect();

    let Some(asset) = hint.asset.as_deref() else {
        return largest(candidates.iter().copied());
    };

    let exact = candidates
        .iter()
        .copied()
        .filter(|pool| pool.symbol.eq_ignore_ascii_case(asset));
    largest(exact).or_else(|| {
        let asset = asset.to_ascii_uppercase();
        largest(
            candidates
                .iter()
                .copied()
                .filter(|pool| pool.symbol.to_ascii_uppercase().contains(&asset)),
        )
    })
}

fn largest<'a>(pools: impl Iterator<Item = &'a LlamaPool>) -> Option<&'a LlamaPool> {
    pools.max_by(|a, b| a.tvl().total_cmp(&b.tvl()))
}

/// One row per matched hint, in hint order. Duplicate ids keep the first row.
pub fn match_hints(hints: &[ProtocolHint], pools: &[LlamaPool]) -> Vec<YieldRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(hints.len());

    for hint in hints {
        let Some(pool) = best_pool(hint, pools) else {
            tracing::debug!("No pool matched {} on {}", hint.name, hint.chain);
            continue;
        };

        let asset = hint
            .asset
            .clone()
            .unwrap_or_else(|| pool.symbol.to_ascii_uppercase());
        let id = yield_row_id(&hint.name, hint.chain, &asset);
        if !seen.insert(id.clone()) {
            tracing::warn!("Duplicate yield row {}; keeping the first", id);
            continue;
        }

        let apy = normalize_apy(upstream_apy(pool.apy, pool.apy_base, pool.apy_reward));
        let tvl_usd = pool.tvl();
        rows.push(YieldRow {
            id,
            protocol: hint.name.clone(),
            chain: hint.chain,
            asset,
            apy,
            tvl_usd,
            risk: classify_risk(tvl_usd, apy),
            url: hint.url.clone().or_else(|| pool.url.clone()),
        });
    }

    rows
}

#[async_trait::async_trait]
impl Provider for DefiLlamaYieldProvider {
    type Request = ProtocolHint;
    type Row = YieldRow;

    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(&self, hints: &[ProtocolHint]) -> Result<Vec<YieldRow>, ProviderError> {
        let url = format!("{}/pools", self.api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
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

        let pools = parse_pools(&body)?;
        let rows = match_hints(hints, &pools);
        tracing::debug!(
            "Matched {}/{} protocol hints against {} pools",
            rows.len(),
            hints.len(),
            pools.len()
        );
        Ok(rows)
    }
}
