//! Dual-mode API client.
//!
//! Every call is fingerprinted and looked up in the token store. A cached token
//! means the call goes straight to production carrying that token; a miss sends
//! the call through the auth proxy together with the fingerprint and the store
//! location, so the proxy can record the token the upstream issues. The next
//! identical call then finds it and skips the proxy.
//!
//! The client only ever reads the store.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use tokenkeep_common::{FileTokenStore, Fingerprint, HttpMethod, RequestOptions, TokenStore, headers};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::route::Route;

/// Client for the upstream service.
///
/// Cheap to clone; clones share the HTTP connection pool and the store.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Creates a client reading tokens from the file at `config.token_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
        Self::with_store(config, store)
    }

    /// Creates a client reading tokens from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;

        // None means no timeout
        let http = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            None => reqwest::Client::builder().build()?,
        };

        Ok(Self {
            http,
            config: Arc::new(config),
            store,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the token store this client reads.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Decides how a call would be routed right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store cannot be read.
    pub async fn route_for(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<Route> {
        let fingerprint = Fingerprint::compute(method, endpoint, options);

        let store = Arc::clone(&self.store);
        let key = fingerprint.clone();
        let cached = tokio::task::spawn_blocking(move || store.get(key.as_str()))
            .await
            .map_err(|e| ClientError::Internal(format!("Token lookup task failed: {e}")))??;

        Ok(Route::decide(fingerprint, cached, self.store.location()))
    }

    /// Assembles the HTTP request for a call without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or a header value is invalid, or the body
    /// cannot be serialized.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &RequestOptions,
        route: &Route,
    ) -> Result<reqwest::Request> {
        let base = if route.is_direct() {
            &self.config.production_url
        } else {
            &self.config.proxy_url
        };
        let url = request_url(base, endpoint, options)?;

        let mut builder = self
            .http
            .request(reqwest_method(method), url)
            .header(CONTENT_TYPE, "application/json")
            .header(headers::APP, &self.config.app);

        for (name, value) in shape_headers(options) {
            builder = builder.header(name, value);
        }

        builder = match route {
            Route::Direct { token } => builder.header(headers::TOKEN, token),
            Route::Proxied {
                fingerprint,
                store_location,
            } => builder
                .header(headers::TOKEN_KEY, fingerprint.as_str())
                .header(headers::TOKEN_PATH, store_location),
        };

        if let Some(body) = options.body.as_ref().filter(|body| !body.is_null()) {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        builder
            .build()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))
    }

    /// Sends a call and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Upstream`] for a non-success status
    /// - [`ClientError::Network`] if the target cannot be reached
    /// - [`ClientError::Serialization`] if the body does not decode into `T`
    /// - [`ClientError::Store`] if the token store cannot be read
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let route = self.route_for(method, endpoint, options).await?;
        self.send(method, endpoint, options, &route).await
    }

    /// Sends a call along an already decided route, without consulting the
    /// token store again.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request), except that the store is never read.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        options: &RequestOptions,
        route: &Route,
    ) -> Result<T> {
        let request = self.build_request(method, endpoint, options, route)?;

        debug!(
            "{} {} ({})",
            method.wire_name(),
            request.url(),
            if route.is_direct() { "direct" } else { "proxied" }
        );

        let outcome = self.execute(request).await;

        if let Err(e) = &outcome {
            error!("{} Error: {e}", method.wire_name());
        }
        if options.loading {
            debug!("Loading completed.");
        }

        outcome
    }

    /// `GET` shorthand for [`request`](Self::request).
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, options: &RequestOptions) -> Result<T> {
        self.request(HttpMethod::Get, endpoint, options).await
    }

    /// `POST` shorthand for [`request`](Self::request).
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<T: DeserializeOwned>(&self, endpoint: &str, options: &RequestOptions) -> Result<T> {
        self.request(HttpMethod::Post, endpoint, options).await
    }

    /// `PUT` shorthand for [`request`](Self::request).
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put<T: DeserializeOwned>(&self, endpoint: &str, options: &RequestOptions) -> Result<T> {
        self.request(HttpMethod::Put, endpoint, options).await
    }

    /// `DELETE` shorthand for [`request`](Self::request).
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str, options: &RequestOptions) -> Result<T> {
        self.request(HttpMethod::Delete, endpoint, options).await
    }

    /// Runs a named raw query. The query text goes in `options.body.sql`.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn sql<T: DeserializeOwned>(&self, name: &str, options: &RequestOptions) -> Result<T> {
        self.request(HttpMethod::Post, &sql_endpoint(name), options)
            .await
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<T> {
        let response = self.http.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            // An unreadable error body still yields a status-based message
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Endpoint for a named raw query: `reports` and `/reports` both map to `/sql-reports`.
#[must_use]
pub fn sql_endpoint(name: &str) -> String {
    format!("/sql-{}", name.replacen('/', "", 1))
}

const fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Shape headers carried by the call; empty values are not sent.
fn shape_headers(options: &RequestOptions) -> impl Iterator<Item = (&'static str, &str)> {
    [
        (headers::HIDDEN, options.hidden.as_deref()),
        (headers::FILTER, options.filter.as_deref()),
        (headers::FIELDS, options.fields.as_deref()),
        (headers::SESSION, options.session.as_deref()),
        (headers::NEARBY, options.nearby.as_deref()),
        (headers::COLLECTIONS, options.joins.as_deref()),
        (headers::VALIDATION, options.validation.as_deref()),
        (headers::PERMISSIONS, options.permissions.as_deref()),
    ]
    .into_iter()
    .filter_map(|(name, value)| non_empty(value).map(|value| (name, value)))
}

fn request_url(base: &str, endpoint: &str, options: &RequestOptions) -> Result<Url> {
    let base = base.trim_end_matches('/');
    let raw = if endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    };

    let mut url = Url::parse(&raw)
        .map_err(|e| ClientError::Configuration(format!("Invalid URL '{raw}': {e}")))?;

    let mut params = Vec::with_capacity(3);
    if let Some(page) = options.page.as_deref() {
        params.push(("page", page));
    }
    if let Some(sort) = non_empty(options.sort.as_deref()) {
        params.push(("sort", sort));
    }
    if let Some(search) = non_empty(options.search.as_deref()) {
        params.push(("search", search));
    }
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url)
}

/// Message for a failed call: the body's `message`, else its `result`, else
/// the status reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|value| value.get(name))
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
    };

    field("message").or_else(|| field("result")).unwrap_or_else(|| {
        format!(
            "Error: {}",
            status.canonical_reason().unwrap_or("Unknown Status")
        )
    })
}
