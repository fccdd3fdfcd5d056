//! Gateway error types

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use airwave_core::Provider;

/// Seconds a client should wait before retrying when no upstream is available
pub const UPSTREAM_RETRY_AFTER_SECS: u64 = 30;

/// Errors raised by the identity and session stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// A bounded table is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(Provider),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No upstream directory server available")]
    NoUpstreamAvailable,

    #[error("Upstream directory error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Core error: {0}")]
    Core(#[from] airwave_core::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::UnknownProvider(_) => (StatusCode::NOT_FOUND, "Unknown provider"),
            GatewayError::ProviderNotConfigured(_) => {
                (StatusCode::NOT_FOUND, "Provider not configured")
            }
            GatewayError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated"),
            GatewayError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            GatewayError::NoUpstreamAvailable => {
                tracing::warn!("No upstream directory server available");
                let body = json!({
                    "success": false,
                    "reason": "No directory server available, please try again later",
                    "retryable": true,
                });
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, UPSTREAM_RETRY_AFTER_SECS.to_string())],
                    axum::Json(body),
                )
                    .into_response();
            }
            GatewayError::Upstream(msg) => {
                tracing::warn!("Upstream directory error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Directory server error")
            }
            GatewayError::Store(e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            GatewayError::Core(e) => {
                tracing::error!("Core error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "success": false, "reason": message });
        (status, axum::Json(body)).into_response()
    }
}
