use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Generic message for any failure reaching the proxied API.
const UPSTREAM_FAILURE_MSG: &str = "Upstream request failed.";

/// Gateway errors, mapped onto the client-visible status taxonomy.
///
/// Internal detail is logged, never returned in the body.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing/invalid parameter or rejected login payload (400).
    #[error("Malformed request: {0}")]
    MalformedRequest(&'static str),

    /// Session or identity check failed (401, empty body).
    #[error("Unauthorized")]
    Unauthorized,

    /// Transport failure talking to the proxied API (502).
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::MalformedRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "msg": msg }))).into_response()
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::UpstreamUnavailable(ref detail) => {
                tracing::error!(error = %detail, "Upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "msg": UPSTREAM_FAILURE_MSG })),
                )
                    .into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Gateway internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for GatewayError {
    fn from(e: crate::error::Error) -> Self {
        Self::UpstreamUnavailable(e.to_string())
    }
}
