//! Error types for the client library.

use thiserror::Error;
use tokenkeep_common::StoreError;

/// Errors that can occur when calling the upstream service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP transport failure.
    ///
    /// DNS resolution, connection refused (for example the proxy is not
    /// running), timeouts and socket errors all land here.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be decoded into the requested type.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The upstream (or the proxy relaying it) answered with a non-success status.
    #[error("Upstream returned {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The token store could not be consulted.
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    /// Client configuration issue.
    ///
    /// Missing tenant name or unparsable base URLs.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request could not be assembled, e.g. a header value with control
    /// characters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A blocking store lookup task failed to complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// HTTP status of an upstream failure.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the upstream rejected the request's credentials.
    ///
    /// A cached token that the upstream no longer accepts surfaces this way;
    /// invalidating its fingerprint sends the next call back through the proxy.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Upstream { status: 401 | 403, .. })
    }
}

/// Result type alias using `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;
