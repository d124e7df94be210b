// Shared symbol and USD-sanity guards used by the price adapters and cache.

// Internal helper that normalizes ticker symbols to their cache form.
pub fn normalize_symbol(token: &str) -> String {
    token.trim().to_uppercase()
}

// Internal helper that normalizes a chain qualifier; blank means "no chain".
pub fn normalize_chain(chain: &str) -> Option<String> {
    let chain = chain.trim().to_ascii_lowercase();
    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

// Internal helper that validates a raw upstream USD price.
pub fn sanitize_price_usd(value: f64) -> Option<f64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value)
}

// Internal helper that values one wallet position, treating garbage as zero.
pub fn position_value_usd(amount: f64, price: f64) -> f64 {
    if !amount.is_finite() || amount <= 0.0 || !price.is_finite() || price <= 0.0 {
        return 0.0;
    }
    amount * price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_symbol_trims_and_uppercases() {
        assert_eq!(normalize_symbol("  usdc "), "USDC");
        assert_eq!(normalize_symbol("é"), "É");
        assert_eq!(normalize_symbol("straße"), "STRASSE");
    }

    #[test]
    fn normalize_chain_drops_blank() {
        assert_eq!(normalize_chain("Base"), Some("base".to_string()));
        assert_eq!(normalize_chain("   "), None);
    }

    #[test]
    fn sanitize_rejects_negative_and_nan() {
        assert_eq!(sanitize_price_usd(-1.0), None);
        assert_eq!(sanitize_price_usd(f64::NAN), None);
        assert_eq!(sanitize_price_usd(0.0), None);
        assert_eq!(sanitize_price_usd(95.5), Some(95.5));
    }

    #[test]
    fn position_value_ignores_invalid_amounts() {
        assert_eq!(position_value_usd(2.0, 1.5), 3.0);
        assert_eq!(position_value_usd(-2.0, 1.5), 0.0);
        assert_eq!(position_value_usd(f64::INFINITY, 1.5), 0.0);
        assert_eq!(position_value_usd(2.0, 0.0), 0.0);
    }
}
