// src/models/mod.rs
pub mod price;
pub mod yields;

use serde::Serialize;

pub use price::{CacheStatus, PriceQuery, PriceRow, PriceSource, WalletBalance};
pub use yields::{Chain, ProtocolHint, RiskLevel, YieldBundle, YieldRow};

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
