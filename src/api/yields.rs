use axum::{extract::State, Json};

use super::{prices::CacheCleared, AppState};
use crate::models::{ApiResponse, CacheStatus, YieldBundle};

/// GET /api/v1/yields/live
pub async fn get_live_yields(State(state): State<AppState>) -> Json<ApiResponse<YieldBundle>> {
    let bundle = state.yields.live_bundle().await;
    Json(ApiResponse::success(YieldBundle::clone(&bundle)))
}

/// GET /api/v1/yields/status
pub async fn get_yield_cache_status(State(state): State<AppState>) -> Json<ApiResponse<CacheStatus>> {
    Json(ApiResponse::success(state.yields.status()))
}

/// DELETE /api/v1/yields/cache
pub async fn clear_yield_cache(State(state): State<AppState>) -> Json<ApiResponse<CacheCleared>> {
    let removed = state.yields.status().size;
    state.yields.clear();
    Json(ApiResponse::success(CacheCleared { removed }))
}
