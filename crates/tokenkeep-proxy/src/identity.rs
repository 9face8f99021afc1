//! Tenant login against the identity service.
//!
//! `POST {identity_url}/login` with `{app, username, password}` answers with
//! `{err, result}`; on success `result` is the tenant's basic-auth payload.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

/// Operator account used to log tenants in.
#[derive(Debug, Clone)]
pub struct OperatorCredentials {
    username: String,
    password: SecretString,
}

impl OperatorCredentials {
    /// Creates operator credentials.
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Operator username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    app: &'a str,
    username: &'a str,
    password: &'a str,
}

/// Reasons a tenant login did not produce a credential.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The identity service could not be reached or read.
    #[error("Identity service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The identity service answered with something other than JSON.
    #[error("Identity service returned invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The identity service rejected the operator credentials.
    #[error("Login rejected: {0}")]
    Rejected(String),

    /// The identity service reported success without a credential.
    #[error("Login response has no credential")]
    MissingCredential,
}

/// Logs `app` in and returns its `Authorization` value (`Basic ...`).
///
/// # Errors
///
/// Returns a [`LoginError`] when the service is unreachable, answers with
/// non-JSON, sets a truthy `err`, or omits `result`.
#[instrument(skip(http, operator), fields(username = %operator.username))]
pub async fn login(
    http: &reqwest::Client,
    identity_url: &str,
    app: &str,
    operator: &OperatorCredentials,
) -> Result<SecretString, LoginError> {
    let url = format!("{}/login", identity_url.trim_end_matches('/'));
    let request = LoginRequest {
        app,
        username: &operator.username,
        password: operator.password.expose_secret(),
    };

    let bytes = http.post(&url).json(&request).send().await?.bytes().await?;
    let body: Value = serde_json::from_slice(&bytes)?;

    if body.get("err").is_some_and(is_truthy) {
        let reason = body
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("no reason given");
        return Err(LoginError::Rejected(reason.to_string()));
    }

    let credential = match body.get("result") {
        Some(Value::String(result)) if !result.is_empty() => result.clone(),
        Some(Value::Number(result)) => result.to_string(),
        _ => return Err(LoginError::MissingCredential),
    };

    debug!("Tenant login succeeded");
    Ok(SecretString::new(format!("Basic {credential}").into()))
}

/// Loose truthiness of a JSON flag: `false`, `null`, `0` and `""` are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
