//! Client configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Production base URL of the upstream service.
pub const DEFAULT_PRODUCTION_URL: &str = "https://v6.frontql.dev";

/// Base URL of a locally running auth proxy.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:4466";

/// File name of the token store inside the working directory.
pub const TOKEN_FILE_NAME: &str = "tokens.json";

/// Settings for an [`ApiClient`](crate::ApiClient).
///
/// # Examples
///
/// ```
/// use tokenkeep_client::ClientConfig;
///
/// let config = ClientConfig::new("trendingcut")
///     .with_proxy_url("http://127.0.0.1:5000")
///     .with_token_path("/tmp/tokens.json")
///     .with_timeout(30);
///
/// assert_eq!(config.production_url, "https://v6.frontql.dev");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Tenant name sent as the `app` header on every request.
    pub app: String,
    /// Base URL used for direct calls.
    #[serde(default = "default_production_url")]
    pub production_url: String,
    /// Base URL of the auth proxy used when no token is cached.
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,
    /// Token store file, sent to the proxy as `token-path`.
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    /// Request timeout in seconds. `None` means no timeout.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_production_url() -> String {
    DEFAULT_PRODUCTION_URL.to_string()
}

fn default_proxy_url() -> String {
    DEFAULT_PROXY_URL.to_string()
}

/// `tokens.json` in the current working directory, or a bare relative
/// `tokens.json` when the working directory is unavailable.
#[must_use]
pub fn default_token_path() -> PathBuf {
    std::env::current_dir().map_or_else(
        |_| PathBuf::from(TOKEN_FILE_NAME),
        |cwd| cwd.join(TOKEN_FILE_NAME),
    )
}

impl ClientConfig {
    /// Creates a configuration for `app` with every other field defaulted.
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            production_url: default_production_url(),
            proxy_url: default_proxy_url(),
            token_path: default_token_path(),
            timeout_seconds: None,
        }
    }

    /// Sets the base URL for direct calls.
    #[must_use]
    pub fn with_production_url(mut self, url: impl Into<String>) -> Self {
        self.production_url = url.into();
        self
    }

    /// Sets the base URL of the auth proxy.
    #[must_use]
    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = url.into();
        self
    }

    /// Sets the token store file.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Checks the tenant name and both base URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if `app` is blank or either base
    /// URL does not parse as an absolute URL.
    pub fn validate(&self) -> Result<()> {
        if self.app.trim().is_empty() {
            return Err(ClientError::Configuration(
                "app (tenant name) must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("production_url", &self.production_url),
            ("proxy_url", &self.proxy_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                ClientError::Configuration(format!("Invalid {name} '{value}': {e}"))
            })?;
        }

        Ok(())
    }
}
