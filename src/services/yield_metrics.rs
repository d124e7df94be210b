use crate::{
    constants::{
        LOW_RISK_MAX_APY_PCT, LOW_RISK_MIN_TVL_USD, MAX_SANE_APY_PCT, MEDIUM_RISK_MAX_APY_PCT,
        MEDIUM_RISK_MIN_TVL_USD,
    },
    models::{Chain, RiskLevel},
};

/// Normalizes an upstream APY into a percentage.
///
/// Values below 1 are read as fractions (`0.0644` -> `6.44`). Anything above
/// [`MAX_SANE_APY_PCT`] after scaling is treated as corrupt and zeroed.
pub fn normalize_apy(raw: f64) -> f64 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0.0;
    }
    let pct = if raw < 1.0 { raw * 100.0 } else { raw };
    let pct = (pct * 100.0).round() / 100.0;
    if pct > MAX_SANE_APY_PCT {
        return 0.0;
    }
    pct
}

/// Picks the APY reported by a pool listing: the total when present,
/// otherwise base + reward.
pub fn upstream_apy(apy: Option<f64>, apy_base: Option<f64>, apy_reward: Option<f64>) -> f64 {
    match apy {
        Some(value) if value.is_finite() => value,
        _ => apy_base.unwrap_or(0.0) + apy_reward.unwrap_or(0.0),
    }
}

pub fn classify_risk(tvl_usd: f64, apy: f64) -> RiskLevel {
    if tvl_usd > LOW_RISK_MIN_TVL_USD && apy <= LOW_RISK_MAX_APY_PCT {
        RiskLevel::Low
    } else if tvl_usd > MEDIUM_RISK_MIN_TVL_USD && apy <= MEDIUM_RISK_MAX_APY_PCT {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

pub fn sanitize_tvl(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}

// Internal helper that builds the stable `protocol-chain-asset` id.
pub fn yield_row_id(protocol: &str, chain: Chain, asset: &str) -> String {
    format!("{}-{}-{}", slugify(protocol), chain.as_str(), slugify(asset))
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_dash = true;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn fractional_apy_is_scaled_to_percent() {
        assert!((normalize_apy(0.0644) - 6.44).abs() < EPSILON);
    }

    #[test]
    fn mis_scaled_apy_is_zeroed() {
        assert_eq!(normalize_apy(644.0), 0.0);
    }

    #[test]
    fn percent_apy_passes_through() {
        assert!((normalize_apy(12.5) - 12.5).abs() < EPSILON);
        assert!((normalize_apy(100.0) - 100.0).abs() < EPSILON);
    }

    #[test]
    fn invalid_apy_is_zero() {
        assert_eq!(normalize_apy(-3.0), 0.0);
        assert_eq!(normalize_apy(f64::NAN), 0.0);
    }

    #[test]
    fn upstream_apy_falls_back_to_components() {
        assert_eq!(upstream_apy(Some(5.0), Some(1.0), Some(1.0)), 5.0);
        assert_eq!(upstream_apy(None, Some(3.0), Some(1.5)), 4.5);
        assert_eq!(upstream_apy(None, None, None), 0.0);
    }

    #[test]
    fn risk_buckets_match_thresholds() {
        assert_eq!(classify_risk(600_000_000.0, 5.0), RiskLevel::Low);
        assert_eq!(classify_risk(150_000_000.0, 10.0), RiskLevel::Medium);
        assert_eq!(classify_risk(1_000_000.0, 40.0), RiskLevel::High);
    }

    #[test]
    fn large_tvl_with_high_apy_is_not_low() {
        assert_eq!(classify_risk(600_000_000.0, 12.0), RiskLevel::Medium);
        assert_eq!(classify_risk(600_000_000.0, 20.0), RiskLevel::High);
        assert_eq!(classify_risk(500_000_000.0, 5.0), RiskLevel::Medium);
    }

    #[test]
    fn row_id_is_slugged() {
        assert_eq!(
            yield_row_id("Aave V3", Chain::Arbitrum, "USDC.e"),
            "aave-v3-arbitrum-usdc-e"
        );
    }
}
