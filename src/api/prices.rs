use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    constants::MAX_BATCH_SYMBOLS,
    error::{AppError, Result},
    models::{ApiResponse, CacheStatus, PriceQuery, PriceRow},
};

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    pub symbols: Option<String>,
    pub chain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChainQuery {
    pub chain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CacheCleared {
    pub removed: usize,
}

fn parse_symbols(raw: Option<&str>, chain: Option<&str>) -> Result<Vec<PriceQuery>> {
    let queries: Vec<PriceQuery> = raw
        .unwrap_or_default()
        .split(',')
        .filter(|symbol| !symbol.trim().is_empty())
        .map(|symbol| PriceQuery::new(symbol, chain))
        .collect();

    if queries.is_empty() {
        return Err(AppError::BadRequest(
            "symbols must list at least one ticker".to_string(),
        ));
    }
    if queries.len() > MAX_BATCH_SYMBOLS {
        return Err(AppError::BadRequest(format!(
            "at most {} symbols per request",
            MAX_BATCH_SYMBOLS
        )));
    }
    Ok(queries)
}

/// GET /api/v1/prices?symbols=ETH,SOL&chain=
pub async fn get_prices(
    State(state): State<AppState>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<ApiResponse<Vec<PriceRow>>>> {
    let queries = parse_symbols(query.symbols.as_deref(), query.chain.as_deref())?;
    let rows = state.prices.get_prices(&queries).await;
    Ok(Json(ApiResponse::success(rows)))
}

/// GET /api/v1/prices/{symbol}
pub async fn get_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<PriceRow>>> {
    if symbol.trim().is_empty() {
        return Err(AppError::BadRequest("symbol is required".to_string()));
    }
    let row = state.prices.get_price(&symbol, query.chain.as_deref()).await;
    Ok(Json(ApiResponse::success(row)))
}

/// GET /api/v1/prices/{symbol}/cached
pub async fn get_cached_price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<PriceRow>>> {
    let row = state
        .prices
        .get_cached_price(&symbol, query.chain.as_deref())
        .ok_or_else(|| AppError::NotFound(format!("no fresh cached price for {}", symbol)))?;
    Ok(Json(ApiResponse::success(row)))
}

/// GET /api/v1/prices/status
pub async fn get_price_cache_status(
    State(state): State<AppState>,
) -> Json<ApiResponse<CacheStatus>> {
    Json(ApiResponse::success(state.prices.cache_status()))
}

/// DELETE /api/v1/prices/cache
pub async fn clear_price_cache(State(state): State<AppState>) -> Json<ApiResponse<CacheCleared>> {
    let removed = state.prices.cache_status().size;
    state.prices.clear();
    Json(ApiResponse::success(CacheCleared { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_state;
    use crate::models::PriceSource;

    #[test]
    fn parse_symbols_skips_blanks() {
        let queries = parse_symbols(Some("eth, ,sol,"), Some("Base")).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].key(), "SOL:base");
    }

    #[test]
    fn parse_symbols_rejects_empty_and_oversized() {
        assert!(matches!(parse_symbols(None, None), Err(AppError::BadRequest(_))));
        let many = vec!["X"; MAX_BATCH_SYMBOLS + 1].join(",");
        assert!(matches!(parse_symbols(Some(&many), None), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn batch_endpoint_returns_rows_in_order() {
        let Json(response) = get_prices(
            State(test_state()),
            Query(PricesQuery {
                symbols: Some("usdc,sol".to_string()),
                chain: None,
            }),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.data[0].symbol, "USDC");
        assert_eq!(response.data[0].price, 1.0);
        assert_eq!(response.data[1].price, 95.5);
        assert_eq!(response.data[1].source, PriceSource::Mock);
    }

    #[tokio::test]
    async fn cached_endpoint_is_404_until_fetched() {
        let state = test_state();
        let missing = get_cached_price(
            State(state.clone()),
            Path("eth".to_string()),
            Query(ChainQuery { chain: None }),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        get_price(
            State(state.clone()),
            Path("eth".to_string()),
            Query(ChainQuery { chain: None }),
        )
        .await
        .unwrap();
        let Json(hit) = get_cached_price(
            State(state),
            Path("eth".to_string()),
            Query(ChainQuery { chain: None }),
        )
        .await
        .unwrap();
        assert_eq!(hit.data.price, 2280.0);
    }

    #[tokio::test]
    async fn clear_reports_removed_rows() {
        let state = test_state();
        state.prices.get_price("BTC", None).await;

        let Json(cleared) = clear_price_cache(State(state.clone())).await;
        assert_eq!(cleared.data.removed, 1);

        let Json(status) = get_price_cache_status(State(state)).await;
        assert_eq!(status.data.size, 0);
    }
}
