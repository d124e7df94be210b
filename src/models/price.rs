use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::price_guard::{normalize_chain, normalize_symbol};

// ==================== PRICE ROWS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Live,
    Fallback,
    Mock,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriceSource::Live => "live",
            PriceSource::Fallback => "fallback",
            PriceSource::Mock => "mock",
        };
        f.write_str(label)
    }
}

/// Canonical USD price of one asset, optionally qualified by chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: String,
    pub price: f64,
    pub source: PriceSource,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

impl PriceRow {
    /// Zero-valued placeholder for a key nothing could resolve.
    pub fn unresolved(query: &PriceQuery, timestamp: i64) -> Self {
        Self {
            symbol: query.symbol.clone(),
            price: 0.0,
            source: PriceSource::Mock,
            timestamp,
            chain: query.chain.clone(),
        }
    }

    pub fn key(&self) -> String {
        price_key(&self.symbol, self.chain.as_deref())
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.timestamp <= ttl_ms
    }
}

/// Cache key: `SYMBOL` or `SYMBOL:chain`.
pub fn price_key(symbol: &str, chain: Option<&str>) -> String {
    match chain {
        Some(chain) => format!("{}:{}", symbol, chain),
        None => symbol.to_string(),
    }
}

/// A normalized lookup request. Constructing one uppercases the symbol and
/// lowercases the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceQuery {
    pub symbol: String,
    pub chain: Option<String>,
}

impl PriceQuery {
    pub fn new(symbol: &str, chain: Option<&str>) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            chain: chain.and_then(normalize_chain),
        }
    }

    pub fn key(&self) -> String {
        price_key(&self.symbol, self.chain.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub size: usize,
    pub last_fetch_timestamp: Option<i64>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletBalance {
    pub symbol: String,
    pub amount: f64,
    #[serde(default)]
    pub chain: Option<String>,
}
