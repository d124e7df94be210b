/// Application constants

pub const API_VERSION: &str = "v1";

// Cache defaults
pub const DEFAULT_PRICE_CACHE_TTL_SECS: u64 = 15;
pub const DEFAULT_YIELD_CACHE_TTL_SECS: u64 = 60;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_PRICE_STREAM_INTERVAL_SECS: u64 = 5;

// Upstream endpoints
pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_DEFILLAMA_PRICE_API_URL: &str = "https://coins.llama.fi";
pub const DEFAULT_DEFILLAMA_YIELDS_API_URL: &str = "https://yields.llama.fi";

// Bundled configuration data
pub const BUNDLED_ASSET_REGISTRY: &str = include_str!("../config/assets.json");
pub const BUNDLED_PROTOCOL_HINTS: &str = include_str!("../config/protocol_hints.json");

// Yield sanity
pub const MAX_SANE_APY_PCT: f64 = 100.0;
pub const LOW_RISK_MIN_TVL_USD: f64 = 500_000_000.0;
pub const LOW_RISK_MAX_APY_PCT: f64 = 8.0;
pub const MEDIUM_RISK_MIN_TVL_USD: f64 = 100_000_000.0;
pub const MEDIUM_RISK_MAX_APY_PCT: f64 = 15.0;

// Request guards
pub const MAX_BATCH_SYMBOLS: usize = 50;
pub const PRICE_CONNECT_TIMEOUT_SECS: u64 = 4;
