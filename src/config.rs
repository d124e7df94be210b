use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_COINGECKO_API_URL, DEFAULT_DEFILLAMA_PRICE_API_URL, DEFAULT_DEFILLAMA_YIELDS_API_URL,
    DEFAULT_PRICE_CACHE_TTL_SECS, DEFAULT_PRICE_STREAM_INTERVAL_SECS, DEFAULT_PROVIDER_TIMEOUT_MS,
    DEFAULT_YIELD_CACHE_TTL_SECS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Caches
    pub price_cache_ttl_secs: u64,
    pub yield_cache_ttl_secs: u64,
    pub provider_timeout_ms: u64,
    pub live_prices_enabled: bool,
    pub warm_caches_on_start: bool,

    // Upstream APIs
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub defillama_price_api_url: String,
    pub defillama_yields_api_url: String,

    // Configuration data
    pub asset_registry_path: Option<String>,
    pub protocol_hints_path: Option<String>,

    // Streaming
    pub price_stream_interval_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

// Internal helper that parses truthy env flags.
fn parse_flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

fn flag_from_env(name: &str, default: bool) -> bool {
    env::var(name).map(|v| parse_flag(&v)).unwrap_or(default)
}

fn optional_from_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            price_cache_ttl_secs: env::var("PRICE_CACHE_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_PRICE_CACHE_TTL_SECS.to_string())
                .parse()?,
            yield_cache_ttl_secs: env::var("YIELD_CACHE_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_YIELD_CACHE_TTL_SECS.to_string())
                .parse()?,
            provider_timeout_ms: env::var("PROVIDER_TIMEOUT_MS")
                .unwrap_or_else(|_| DEFAULT_PROVIDER_TIMEOUT_MS.to_string())
                .parse()?,
            live_prices_enabled: flag_from_env("LIVE_PRICES_ENABLED", true),
            warm_caches_on_start: flag_from_env("WARM_CACHES_ON_START", true),

            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_API_URL.to_string()),
            coingecko_api_key: optional_from_env("COINGECKO_API_KEY"),
            defillama_price_api_url: env::var("DEFILLAMA_PRICE_API_URL")
                .unwrap_or_else(|_| DEFAULT_DEFILLAMA_PRICE_API_URL.to_string()),
            defillama_yields_api_url: env::var("DEFILLAMA_YIELDS_API_URL")
                .unwrap_or_else(|_| DEFAULT_DEFILLAMA_YIELDS_API_URL.to_string()),

            asset_registry_path: optional_from_env("ASSET_REGISTRY_PATH"),
            protocol_hints_path: optional_from_env("PROTOCOL_HINTS_PATH"),

            price_stream_interval_secs: env::var("PRICE_STREAM_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_PRICE_STREAM_INTERVAL_SECS.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.price_cache_ttl_secs == 0 {
            anyhow::bail!("PRICE_CACHE_TTL_SECS must be > 0");
        }
        if self.yield_cache_ttl_secs == 0 {
            anyhow::bail!("YIELD_CACHE_TTL_SECS must be > 0");
        }
        if self.provider_timeout_ms == 0 {
            anyhow::bail!("PROVIDER_TIMEOUT_MS must be > 0");
        }
        if self.price_stream_interval_secs == 0 {
            anyhow::bail!("PRICE_STREAM_INTERVAL_SECS must be > 0");
        }
        if self.defillama_yields_api_url.trim().is_empty() {
            anyhow::bail!("DEFILLAMA_YIELDS_API_URL is empty");
        }

        if self.live_prices_enabled {
            if self.coingecko_api_url.trim().is_empty() {
                anyhow::bail!("COINGECKO_API_URL is empty");
            }
            if self.defillama_price_api_url.trim().is_empty() {
                anyhow::bail!("DEFILLAMA_PRICE_API_URL is empty");
            }
        } else {
            tracing::warn!("Live prices disabled; every price will be served from the mock table");
        }

        if self.coingecko_api_key.is_none() {
            tracing::debug!("COINGECKO_API_KEY not set; using the public rate limit");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        price_cache_ttl_secs: 15,
        yield_cache_ttl_secs: 60,
        provider_timeout_ms: 8_000,
        live_prices_enabled: false,
        warm_caches_on_start: false,
        coingecko_api_url: DEFAULT_COINGECKO_API_URL.to_string(),
        coingecko_api_key: None,
        defillama_price_api_url: DEFAULT_DEFILLAMA_PRICE_API_URL.to_string(),
        defillama_yields_api_url: DEFAULT_DEFILLAMA_YIELDS_API_URL.to_string(),
        asset_registry_path: None,
        protocol_hints_path: None,
        price_stream_interval_secs: 5,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_common_truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_flag(value), "{value} should be truthy");
        }
        for value in ["0", "false", "off", ""] {
            assert!(!parse_flag(value), "{value} should be falsy");
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let mut config = test_config();
        config.price_cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_price_urls_only_when_live() {
        let mut config = test_config();
        config.coingecko_api_url = String::new();
        assert!(config.validate().is_ok());

        config.live_prices_enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn provider_timeout_uses_millis() {
        let mut config = test_config();
        config.provider_timeout_ms = 250;
        assert_eq!(config.provider_timeout(), Duration::from_millis(250));
    }
}
