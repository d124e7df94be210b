use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::models::CacheStatus;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub price_providers: Vec<&'static str>,
    pub price_cache: CacheStatus,
    pub yield_cache: CacheStatus,
    pub protocol_hints: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        price_providers: state.prices.provider_names(),
        price_cache: state.prices.cache_status(),
        yield_cache: state.yields.status(),
        protocol_hints: state.yields.hint_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::test_state;

    #[tokio::test]
    async fn health_reports_empty_caches_at_start() {
        let Json(health) = health_check(State(test_state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.price_providers, vec!["mock"]);
        assert_eq!(health.price_cache.size, 0);
        assert!(health.yield_cache.last_fetch_timestamp.is_none());
        assert_eq!(health.protocol_hints, 8);
    }
}
