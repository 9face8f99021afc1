//! Axum HTTP proxy server.
//!
//! Receives calls from clients that hold no token for their request shape,
//! logs the calling tenant in (once), forwards the call upstream with the
//! tenant's credential and records any token the upstream issues under the
//! caller's fingerprint.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use typed_builder::TypedBuilder;

use tokenkeep_common::{StoreLocator, TokenStore, headers};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::identity::{self, OperatorCredentials};
use crate::session::TenantSessions;

/// Permissive CORS headers attached to every response.
#[must_use]
pub const fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "*"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
    ]
}

/// Body of the preflight response.
pub const PREFLIGHT_BODY: &str = "Departed";

/// Inbound headers that are never forwarded upstream.
static STRIPPED_HEADERS: [HeaderName; 11] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    HeaderName::from_static("keep-alive"),
];

/// Shared state for the proxy handler.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ProxyState {
    /// Client for upstream and identity calls
    #[builder(default)]
    http: reqwest::Client,

    /// Upstream base URL
    #[builder(setter(into))]
    upstream_url: String,

    /// Identity service base URL
    #[builder(setter(into))]
    identity_url: String,

    /// Operator account; without it tenants are never logged in
    #[builder(default, setter(strip_option, into))]
    operator: Option<Arc<OperatorCredentials>>,

    /// Tenant login state
    #[builder(default = Arc::new(TenantSessions::new(Duration::from_secs(60))))]
    sessions: Arc<TenantSessions>,

    /// Resolves `token-path` to a token store
    stores: Arc<dyn StoreLocator>,
}

impl ProxyState {
    /// Builds the state described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operator password is missing or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout_secs {
            http = http.timeout(Duration::from_secs(timeout));
        }
        let http = http
            .build()
            .map_err(|e| ProxyError::Config(format!("Failed to build HTTP client: {e}")))?;

        let stores: Arc<dyn StoreLocator> = match &config.store_path {
            Some(path) => Arc::new(tokenkeep_common::FileStoreLocator::pinned(path)),
            None => Arc::new(tokenkeep_common::FileStoreLocator::new()),
        };

        let operator = config.operator_credentials()?.map(Arc::new);
        if operator.is_none() {
            warn!("No operator configured; requests are forwarded without Authorization");
        }

        Ok(Self {
            http,
            upstream_url: config.upstream_url.clone(),
            identity_url: config.identity_url.clone(),
            operator,
            sessions: Arc::new(TenantSessions::new(config.login_retry())),
            stores,
        })
    }

    /// Tenant login state.
    #[must_use]
    pub fn sessions(&self) -> &Arc<TenantSessions> {
        &self.sessions
    }
}

/// Build the axum router for the proxy. Every method and path is handled.
pub fn router(state: ProxyState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

/// Routing headers every proxied call must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantHeaders {
    /// Tenant name
    pub app: String,
    /// Fingerprint the issued token is stored under
    pub token_key: String,
    /// Store location the token is written to
    pub token_path: String,
}

impl TenantHeaders {
    /// Extracts the routing headers, or `None` if any is missing or blank.
    #[must_use]
    pub fn from_headers(map: &HeaderMap) -> Option<Self> {
        let value = |name: &str| {
            map.get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            app: value(headers::APP)?,
            token_key: value(headers::TOKEN_KEY)?,
            token_path: value(headers::TOKEN_PATH)?,
        })
    }
}

async fn handle_request(State(state): State<ProxyState>, req: Request) -> Result<Response> {
    if req.method() == Method::OPTIONS {
        return Ok(preflight());
    }

    let (parts, body) = req.into_parts();
    let tenant = TenantHeaders::from_headers(&parts.headers).ok_or(ProxyError::MissingHeaders)?;

    forward(&state, &tenant, parts, body).await
}

#[instrument(
    skip_all,
    fields(app = %tenant.app, method = %parts.method, path = %parts.uri.path())
)]
async fn forward(
    state: &ProxyState,
    tenant: &TenantHeaders,
    parts: Parts,
    body: Body,
) -> Result<Response> {
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::ReadBody(e.to_string()))?;

    let credential = tenant_credential(state, &tenant.app).await;
    let store = state.stores.locate(&tenant.token_path);

    let mut forward_headers = forwarded_headers(&parts.headers);
    if let Some(credential) = &credential {
        match HeaderValue::from_str(credential.expose_secret()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                forward_headers.insert(header::AUTHORIZATION, value);
            }
            Err(e) => warn!("Tenant credential is not a valid header value: {e}"),
        }
    }

    let url = upstream_url(&state.upstream_url, &parts.uri);
    debug!(%url, authorized = credential.is_some(), "Forwarding upstream");

    let response = state
        .http
        .request(parts.method, url)
        .headers(forward_headers)
        .body(body)
        .send()
        .await
        .map_err(ProxyError::Upstream)?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(ProxyError::Upstream)?;
    let payload: Value = serde_json::from_slice(&bytes).map_err(ProxyError::InvalidUpstreamBody)?;

    if let Some(token) = issued_token(&payload) {
        persist_token(store, tenant.token_key.clone(), token.to_string()).await;
    }

    info!(status = status.as_u16(), "Relayed upstream response");
    Ok(relay(status, payload))
}

fn preflight() -> Response {
    (StatusCode::OK, cors_headers(), PREFLIGHT_BODY).into_response()
}

fn relay(status: StatusCode, payload: Value) -> Response {
    (status, cors_headers(), Json(payload)).into_response()
}

/// Returns the tenant's `Authorization` value, logging the tenant in first
/// when it has no session or its last failure is old enough to retry.
async fn tenant_credential(state: &ProxyState, app: &str) -> Option<SecretString> {
    if let Some(operator) = &state.operator
        && state.sessions.needs_login(app)
    {
        match identity::login(&state.http, &state.identity_url, app, operator).await {
            Ok(credential) => {
                info!("Tenant logged in");
                state.sessions.record_success(app, credential);
            }
            Err(e) => {
                error!(error = %e, "Tenant login failed");
                state.sessions.record_failure(app);
            }
        }
    }

    state.sessions.credential(app)
}

/// Token the upstream issued for this request shape, if any.
fn issued_token(payload: &Value) -> Option<&str> {
    payload
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
}

/// Writes the token on the blocking pool. Failures are logged, never surfaced.
async fn persist_token(store: Arc<dyn TokenStore>, fingerprint: String, token: String) {
    let location = store.location();
    let outcome =
        tokio::task::spawn_blocking(move || store.set(&fingerprint, &token).map(|()| fingerprint))
            .await;

    match outcome {
        Ok(Ok(fingerprint)) => info!(%location, %fingerprint, "Stored issued token"),
        Ok(Err(e)) => error!(%location, error = %e, "Failed to store issued token"),
        Err(e) => error!(%location, error = %e, "Token store task failed"),
    }
}

fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = inbound.clone();
    for name in &STRIPPED_HEADERS {
        forwarded.remove(name);
    }
    forwarded
}

fn upstream_url(base: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{}{path_and_query}", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_headers_require_all_three() {
        let mut headers = HeaderMap::new();
        headers.insert("app", HeaderValue::from_static("demo"));
        headers.insert("token-key", HeaderValue::from_static("get:/users>icNfi78w"));
        assert!(TenantHeaders::from_headers(&headers).is_none());

        headers.insert("token-path", HeaderValue::from_static("/tmp/tokens.json"));
        let tenant = TenantHeaders::from_headers(&headers).unwrap();
        assert_eq!(tenant.app, "demo");
        assert_eq!(tenant.token_path, "/tmp/tokens.json");

        headers.insert("app", HeaderValue::from_static("  "));
        assert!(TenantHeaders::from_headers(&headers).is_none());
    }

    #[test]
    fn test_forwarded_headers_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:4466"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("fields", HeaderValue::from_static("id,name"));
        headers.insert("app", HeaderValue::from_static("demo"));

        let forwarded = forwarded_headers(&headers);

        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded["fields"], "id,name");
        assert_eq!(forwarded["app"], "demo");
    }

    #[test]
    fn test_upstream_url_keeps_path_and_query() {
        let uri: Uri = "/users/42?page=2&sort=name".parse().unwrap();
        assert_eq!(
            upstream_url("https://v6.frontql.dev:443/", &uri),
            "https://v6.frontql.dev:443/users/42?page=2&sort=name"
        );
    }

    #[test]
    fn test_issued_token() {
        assert_eq!(issued_token(&json!({ "token": "abc123" })), Some("abc123"));
        assert_eq!(issued_token(&json!({ "token": "" })), None);
        assert_eq!(issued_token(&json!({ "token": false })), None);
        assert_eq!(issued_token(&json!([{ "token": "abc" }])), None);
    }
}
