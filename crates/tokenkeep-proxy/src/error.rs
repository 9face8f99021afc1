//! Error types for the auth proxy.
//!
//! Request-path errors render as the same `{"err": true, "result": "..."}`
//! envelope the upstream uses, so clients handle proxy and upstream failures
//! alike.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::server::cors_headers;

/// Errors that can occur in the proxy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProxyError {
    /// A request arrived without the tenant or token routing headers.
    #[error("app, token-key or token-path header is missing")]
    MissingHeaders,

    /// The inbound request body could not be read.
    #[error("Failed to read request body: {0}")]
    ReadBody(String),

    /// The upstream could not be reached or its response could not be read.
    #[error("Upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    /// The upstream answered with a body that is not JSON.
    #[error("Upstream returned invalid JSON: {0}")]
    InvalidUpstreamBody(#[source] serde_json::Error),

    /// I/O error (socket binding, config file reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Status code the error is reported with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeaders | Self::ReadBody(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) | Self::InvalidUpstreamBody(_) => StatusCode::BAD_GATEWAY,
            Self::Io(_) | Self::Toml(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Proxy error");
        } else {
            tracing::warn!(error = %self, "Rejected request");
        }

        let body = json!({ "err": true, "result": self.to_string() });
        (status, cors_headers(), Json(body)).into_response()
    }
}
