use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ==================== CHAINS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Optimism,
    Base,
    Polygon,
    Solana,
    Avalanche,
    Bsc,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Solana => "solana",
            Chain::Avalanche => "avalanche",
            Chain::Bsc => "bsc",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Ok(Chain::Ethereum),
            "arbitrum" | "arbitrum one" => Ok(Chain::Arbitrum),
            "optimism" | "op mainnet" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            "polygon" | "matic" => Ok(Chain::Polygon),
            "solana" => Ok(Chain::Solana),
            "avalanche" | "avax" => Ok(Chain::Avalanche),
            "bsc" | "binance" | "bnb chain" => Ok(Chain::Bsc),
            other => Err(format!("unknown chain: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==================== YIELD ROWS ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldRow {
    pub id: String,
    pub protocol: String,
    pub chain: Chain,
    pub asset: String,
    pub apy: f64,
    #[serde(rename = "tvlUSD")]
    pub tvl_usd: f64,
    pub risk: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Immutable snapshot of every matched protocol; swapped whole on refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldBundle {
    pub updated_at: i64,
    pub protocols: Vec<YieldRow>,
}

impl YieldBundle {
    pub fn empty(updated_at: i64) -> Self {
        Self {
            updated_at,
            protocols: Vec::new(),
        }
    }
}

/// Static rule mapping a display protocol to upstream pool listings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProtocolHint {
    pub name: String,
    pub chain: Chain,
    pub project: String,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parses_upstream_spellings() {
        assert_eq!("Ethereum".parse::<Chain>(), Ok(Chain::Ethereum));
        assert_eq!("BSC".parse::<Chain>(), Ok(Chain::Bsc));
        assert_eq!("Avax".parse::<Chain>(), Ok(Chain::Avalanche));
        assert!("Fantom".parse::<Chain>().is_err());
    }

    #[test]
    fn yield_row_uses_wire_field_names() {
        let row = YieldRow {
            id: "aave-v3-ethereum-usdc".to_string(),
            protocol: "Aave V3".to_string(),
            chain: Chain::Ethereum,
            asset: "USDC".to_string(),
            apy: 4.2,
            tvl_usd: 1_000.0,
            risk: RiskLevel::High,
            url: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["tvlUSD"], 1_000.0);
        assert_eq!(json["chain"], "ethereum");
        assert_eq!(json["risk"], "high");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn hint_deserializes_with_optional_fields() {
        let hint: ProtocolHint =
            serde_json::from_str(r#"{"name":"GMX","chain":"Arbitrum","project":"gmx"}"#).unwrap();
        assert_eq!(hint.chain, Chain::Arbitrum);
        assert!(hint.asset.is_none());
    }

    #[test]
    fn bundle_serializes_camel_case() {
        let json = serde_json::to_value(YieldBundle::empty(7)).unwrap();
        assert_eq!(json["updatedAt"], 7);
        assert!(json["protocols"].as_array().unwrap().is_empty());
    }
}
