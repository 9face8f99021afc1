//! A client and the proxy sharing one store file over real sockets: the
//! first call is proxied and teaches the store a token, the second goes
//! straight to production with it.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tokenkeep_client::{ApiClient, ClientConfig, Route};
use tokenkeep_common::{FileStoreLocator, Fingerprint, HttpMethod, RequestOptions};
use tokenkeep_proxy::{OperatorCredentials, ProxyState, TenantSessions, router};

async fn serve_proxy(upstream: &MockServer, identity: &MockServer) -> String {
    let state = ProxyState::builder()
        .upstream_url(upstream.uri())
        .identity_url(identity.uri())
        .operator(OperatorCredentials::new(
            "operator",
            SecretString::new("s3cret".into()),
        ))
        .sessions(Arc::new(TenantSessions::new(Duration::from_secs(60))))
        .stores(Arc::new(FileStoreLocator::new()))
        .build();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_miss_through_proxy_then_hit_goes_direct() {
    let upstream = MockServer::start().await;
    let identity = MockServer::start().await;
    let production = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let token_path = temp.path().join("tokens.json");

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "err": false, "result": "b3A6cHc=" })),
        )
        .expect(1)
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/otp-verifications"))
        .and(header("authorization", "Basic b3A6cHc="))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123", "via": "upstream" })),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/otp-verifications"))
        .and(header("token", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "via": "production" })))
        .expect(1)
        .mount(&production)
        .await;

    let proxy_url = serve_proxy(&upstream, &identity).await;
    let config = ClientConfig::new("demo")
        .with_production_url(production.uri())
        .with_proxy_url(proxy_url)
        .with_token_path(&token_path);
    let client = ApiClient::new(config).unwrap();
    let options = RequestOptions::default();

    let first: Value = client.get("/otp-verifications", &options).await.unwrap();
    assert_eq!(first["via"], "upstream");

    let fingerprint = Fingerprint::compute(HttpMethod::Get, "/otp-verifications", &options);
    let stored: Value =
        serde_json::from_str(&std::fs::read_to_string(&token_path).unwrap()).unwrap();
    assert_eq!(stored, json!({ fingerprint.as_str(): "abc123" }));

    let route = client
        .route_for(HttpMethod::Get, "/otp-verifications", &options)
        .await
        .unwrap();
    assert_eq!(route, Route::Direct { token: "abc123".into() });

    let second: Value = client.get("/otp-verifications", &options).await.unwrap();
    assert_eq!(second["via"], "production");
}
