use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    constants::MAX_BATCH_SYMBOLS,
    error::{AppError, Result},
    models::{ApiResponse, WalletBalance},
    services::price_cache::WalletValuation,
};

#[derive(Debug, Deserialize)]
pub struct WalletValueRequest {
    pub balances: Vec<WalletBalance>,
}

fn validate_balances(balances: &[WalletBalance]) -> Result<()> {
    if balances.len() > MAX_BATCH_SYMBOLS {
        return Err(AppError::BadRequest(format!(
            "at most {} balances per request",
            MAX_BATCH_SYMBOLS
        )));
    }
    if let Some(bad) = balances.iter().find(|b| b.symbol.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "balance with amount {} has no symbol",
            bad.amount
        )));
    }
    Ok(())
}

/// POST /api/v1/wallet/value
pub async fn value_wallet(
    State(state): State<AppState>,
    Json(req): Json<WalletValueRequest>,
) -> Result<Json<ApiResponse<WalletValuation>>> {
    validate_balances(&req.balances)?;
    let valuation = state.prices.value_wallet(&req.balances).await;
    tracing::debug!(
        "Valued {} balances at ${:.2}",
        valuation.balances.len(),
        valuation.total_value_usd
    );
    Ok(Json(ApiResponse::success(valuation)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTotal {
    pub total_value_usd: f64,
}

/// POST /api/v1/wallet/total
pub async fn wallet_total(
    State(state): State<AppState>,
    Json(req): Json<WalletValueRequest>,
) -> Result<Json<ApiResponse<WalletTotal>>> {
    validate_balances(&req.balances)?;
    let total_value_usd = state.prices.wallet_value(&req.balances).await;
    Ok(Json(ApiResponse::success(WalletTotal { total_value_usd })))
}
