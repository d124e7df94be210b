use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Failure of a single upstream data source. Never leaves the fallback chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider}: upstream returned HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    #[error("{provider}: no response within {after_ms}ms")]
    Timeout { provider: &'static str, after_ms: u64 },

    #[error("{provider}: malformed payload: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: request failed: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Http { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Parse { provider, .. }
            | ProviderError::Transport { provider, .. } => provider,
        }
    }

    pub fn parse(provider: &'static str, err: impl std::fmt::Display) -> Self {
        ProviderError::Parse {
            provider,
            message: err.to_string(),
        }
    }

    pub fn transport(provider: &'static str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return ProviderError::Timeout {
                provider,
                after_ms: timeout.as_millis() as u64,
            };
        }
        ProviderError::Transport {
            provider,
            message: err.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
