//! Proxy configuration.
//!
//! Configuration is loaded from `~/.config/tokenkeep/proxy.toml` (or the file
//! named by `TOKENKEEP_PROXY_CONFIG`). A missing file means defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! listen_addr = "127.0.0.1:4466"
//! upstream_url = "https://v6.frontql.dev:443"
//! identity_url = "https://auth.frontql.dev"
//! login_retry_secs = 60
//! request_timeout_secs = 30
//!
//! # Write every token into one file regardless of the token-path callers send
//! store_path = "/srv/app/tokens.json"
//!
//! [operator]
//! username = "ops"
//! password_env = "TOKENKEEP_OPERATOR_PASSWORD"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProxyError, Result};
use crate::identity::OperatorCredentials;
use crate::paths;

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "TOKENKEEP_PROXY_CONFIG";

/// Environment variable overriding `listen_addr`.
pub const LISTEN_ADDR_ENV: &str = "TOKENKEEP_LISTEN_ADDR";

/// Proxy configuration loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address the proxy listens on (default: 127.0.0.1:4466)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Upstream service requests are forwarded to
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Identity service tenants are logged in with
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Operator account used for tenant logins.
    ///
    /// Without it, requests are forwarded with no `Authorization` header.
    #[serde(default)]
    pub operator: Option<OperatorConfig>,

    /// Pins every token write to this file, ignoring `token-path`
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Seconds a failed tenant login is remembered before retrying (default: 60)
    #[serde(default = "default_login_retry_secs")]
    pub login_retry_secs: u64,

    /// Upstream and identity request timeout in seconds (default: none)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Operator account settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Operator username
    pub username: String,

    /// Environment variable holding the operator password
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4466))
}

fn default_upstream_url() -> String {
    "https://v6.frontql.dev:443".to_string()
}

fn default_identity_url() -> String {
    "https://auth.frontql.dev".to_string()
}

fn default_password_env() -> String {
    "TOKENKEEP_OPERATOR_PASSWORD".to_string()
}

const fn default_login_retry_secs() -> u64 {
    60
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            identity_url: default_identity_url(),
            operator: None,
            store_path: None,
            login_retry_secs: default_login_retry_secs(),
            request_timeout_secs: None,
        }
    }
}

impl ProxyConfig {
    /// Loads configuration from the default location, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file exists but cannot be read or deserialized
    /// - An override or the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;

        if let Ok(addr) = std::env::var(LISTEN_ADDR_ENV) {
            config.listen_addr = addr.parse().map_err(|e| {
                ProxyError::Config(format!("Invalid {LISTEN_ADDR_ENV} '{addr}': {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialized, or fails
    /// validation.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No proxy config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Returns the configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        paths::proxy_config_path().ok_or_else(|| {
            ProxyError::Config("Failed to determine config directory".to_string())
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL does not parse or the operator username is empty.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("upstream_url", &self.upstream_url),
            ("identity_url", &self.identity_url),
        ] {
            reqwest::Url::parse(value)
                .map_err(|e| ProxyError::Config(format!("Invalid {name} '{value}': {e}")))?;
        }

        if let Some(operator) = &self.operator
            && operator.username.trim().is_empty()
        {
            return Err(ProxyError::Config(
                "operator.username must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// How long a failed tenant login is remembered.
    #[must_use]
    pub const fn login_retry(&self) -> Duration {
        Duration::from_secs(self.login_retry_secs)
    }

    /// Resolves the operator password from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an operator is configured but its password variable
    /// is unset.
    pub fn operator_credentials(&self) -> Result<Option<OperatorCredentials>> {
        let Some(operator) = &self.operator else {
            return Ok(None);
        };

        let password = std::env::var(&operator.password_env).map_err(|_| {
            ProxyError::Config(format!(
                "Operator password variable {} is not set",
                operator.password_env
            ))
        })?;

        Ok(Some(OperatorCredentials::new(
            operator.username.clone(),
            SecretString::new(password.into()),
        )))
    }
}
