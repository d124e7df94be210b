//! Configuration data for the aggregation caches.
//!
//! The asset registry (symbol -> upstream ids, mock prices) and the protocol
//! hints are supplied by the embedding application as JSON files. The copies
//! under `config/` are compiled in as the default seed.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::{
    constants::{BUNDLED_ASSET_REGISTRY, BUNDLED_PROTOCOL_HINTS},
    models::ProtocolHint,
    services::price_guard::{normalize_chain, normalize_symbol},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSpec {
    pub symbol: String,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub default_chain: Option<String>,
    #[serde(default)]
    pub addresses: HashMap<String, String>,
    #[serde(default)]
    pub mock_price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<String, AssetSpec>,
}

impl AssetRegistry {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let specs: Vec<AssetSpec> = serde_json::from_str(raw).context("invalid asset registry")?;
        let mut assets = HashMap::with_capacity(specs.len());

        for mut spec in specs {
            spec.symbol = normalize_symbol(&spec.symbol);
            if spec.symbol.is_empty() {
                anyhow::bail!("asset registry entry without symbol");
            }
            if !spec.mock_price.is_finite() || spec.mock_price < 0.0 {
                anyhow::bail!("asset {} has an invalid mock price", spec.symbol);
            }
            spec.default_chain = spec.default_chain.as_deref().and_then(normalize_chain);
            spec.addresses = spec
                .addresses
                .into_iter()
                .filter_map(|(chain, address)| normalize_chain(&chain).map(|c| (c, address)))
                .collect();

            if assets.insert(spec.symbol.clone(), spec).is_some() {
                tracing::warn!("Duplicate asset registry entry; keeping the last one");
            }
        }

        Ok(Self { assets })
    }

    pub fn bundled() -> anyhow::Result<Self> {
        Self::from_json(BUNDLED_ASSET_REGISTRY)
    }

    /// Reads the registry from `path`, or the bundled default when unset.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("cannot read asset registry {}", path))?;
                Self::from_json(&raw)
            }
            None => Self::bundled(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&AssetSpec> {
        self.assets.get(symbol)
    }

    pub fn coingecko_id(&self, symbol: &str) -> Option<&str> {
        self.get(symbol)?.coingecko_id.as_deref()
    }

    /// DefiLlama coin id (`chain:address`) for the requested chain, or for the
    /// asset's default chain when none is requested.
    pub fn llama_coin_id(&self, symbol: &str, chain: Option<&str>) -> Option<String> {
        let spec = self.get(symbol)?;
        let chain = chain.or(spec.default_chain.as_deref())?;
        let address = spec.addresses.get(chain)?;
        Some(format!("{}:{}", chain, address))
    }

    /// Mock table price for a registered asset on a chain it lives on.
    /// `None` for unknown symbols or chains the asset has no address for.
    pub fn mock_quote(&self, symbol: &str, chain: Option<&str>) -> Option<f64> {
        let spec = self.get(symbol)?;
        match chain {
            None => Some(spec.mock_price),
            Some(chain)
                if spec.default_chain.as_deref() == Some(chain)
                    || spec.addresses.contains_key(chain) =>
            {
                Some(spec.mock_price)
            }
            Some(_) => None,
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.assets.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

pub fn parse_protocol_hints(raw: &str) -> anyhow::Result<Vec<ProtocolHint>> {
    let hints: Vec<ProtocolHint> = serde_json::from_str(raw).context("invalid protocol hints")?;
    if let Some(hint) = hints.iter().find(|hint| hint.project.trim().is_empty()) {
        anyhow::bail!("protocol hint {} has an empty project", hint.name);
    }
    Ok(hints)
}

pub fn load_protocol_hints(path: Option<&str>) -> anyhow::Result<Vec<ProtocolHint>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("cannot read protocol hints {}", path))?;
            parse_protocol_hints(&raw)
        }
        None => parse_protocol_hints(BUNDLED_PROTOCOL_HINTS),
    }
}
