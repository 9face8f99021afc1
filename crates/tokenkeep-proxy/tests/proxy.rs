//! End-to-end tests driving the proxy router with `tower::ServiceExt::oneshot`
//! against mock upstream and identity services.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use secrecy::SecretString;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt as _;
use wiremock::matchers::{any, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tokenkeep_common::{
    FileStoreLocator, Fingerprint, HttpMethod, RequestOptions, StoreLocator, TokenStore,
};
use tokenkeep_proxy::{OperatorCredentials, ProxyState, TenantSession, TenantSessions, router};

const CREDENTIAL: &str = "ZGVtbzpvcGVyYXRvcg==";

struct Harness {
    upstream: MockServer,
    identity: MockServer,
    temp: TempDir,
}

impl Harness {
    async fn start() -> Self {
        Self {
            upstream: MockServer::start().await,
            identity: MockServer::start().await,
            temp: TempDir::new().unwrap(),
        }
    }

    fn store_path(&self) -> String {
        self.temp
            .path()
            .join("tokens.json")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn state(&self, login_retry: Duration) -> ProxyState {
        self.state_with_stores(login_retry, Arc::new(FileStoreLocator::new()))
    }

    fn state_with_stores(&self, login_retry: Duration, stores: Arc<dyn StoreLocator>) -> ProxyState {
        ProxyState::builder()
            .upstream_url(self.upstream.uri())
            .identity_url(self.identity.uri())
            .operator(OperatorCredentials::new(
                "operator",
                SecretString::new("s3cret".into()),
            ))
            .sessions(Arc::new(TenantSessions::new(login_retry)))
            .stores(stores)
            .build()
    }

    async fn identity_accepts(&self, expected_logins: u64) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(json!({
                "app": "demo",
                "username": "operator",
                "password": "s3cret",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "err": false, "result": CREDENTIAL })),
            )
            .expect(expected_logins)
            .mount(&self.identity)
            .await;
    }

    async fn identity_rejects(&self, expected_logins: u64) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "err": true, "result": "Invalid credential" })),
            )
            .expect(expected_logins)
            .mount(&self.identity)
            .await;
    }
}

fn proxied_request(method: &str, uri: &str, token_key: &str, token_path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("app", "demo")
        .header("token-key", token_key)
        .header("token-path", token_path)
        .header("content-type", "application/json")
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn read_store(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_issued_token_is_written_to_store() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    let fingerprint =
        Fingerprint::compute(HttpMethod::Get, "/otp-verifications", &RequestOptions::default());

    Mock::given(method("GET"))
        .and(path("/otp-verifications"))
        .and(header("authorization", format!("Basic {CREDENTIAL}").as_str()))
        .and(header("app", "demo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123", "result": "sent" })),
        )
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let request = proxied_request(
        "GET",
        "/otp-verifications",
        fingerprint.as_str(),
        &harness.store_path(),
    );
    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        json_body(response).await,
        json!({ "token": "abc123", "result": "sent" })
    );

    let stored = read_store(&harness.temp.path().join("tokens.json"));
    assert_eq!(stored, json!({ fingerprint.as_str(): "abc123" }));
}

#[tokio::test]
async fn test_tenant_logs_in_once_across_requests() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(any())
        .and(header("authorization", format!("Basic {CREDENTIAL}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": [] })))
        .expect(3)
        .mount(&harness.upstream)
        .await;

    let state = harness.state(Duration::from_secs(60));
    let store_path = harness.store_path();

    for uri in ["/users", "/orders", "/users?page=2"] {
        let response = router(state.clone())
            .oneshot(proxied_request("GET", uri, "get:/users>icNfi78w", &store_path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(matches!(
        state.sessions().get("demo"),
        Some(TenantSession::Authenticated(_))
    ));
}

#[tokio::test]
async fn test_failed_login_forwards_without_authorization() {
    let harness = Harness::start().await;
    harness.identity_rejects(1).await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(|req: &wiremock::Request| !req.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .expect(2)
        .mount(&harness.upstream)
        .await;

    let state = harness.state(Duration::from_secs(60));
    let store_path = harness.store_path();

    for _ in 0..2 {
        let response = router(state.clone())
            .oneshot(proxied_request("GET", "/users", "get:/users>icNfi78w", &store_path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "result": "ok" }));
    }

    assert!(matches!(
        state.sessions().get("demo"),
        Some(TenantSession::Failed { .. })
    ));
}

#[tokio::test]
async fn test_failed_login_is_retried_after_window() {
    let harness = Harness::start().await;
    harness.identity_rejects(2).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&harness.upstream)
        .await;

    let state = harness.state(Duration::ZERO);
    let store_path = harness.store_path();

    for _ in 0..2 {
        let response = router(state.clone())
            .oneshot(proxied_request("GET", "/users", "get:/users>icNfi78w", &store_path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_options_is_answered_locally() {
    let harness = Harness::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&harness.upstream)
        .await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/users")
        .body(Body::empty())
        .unwrap();
    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-methods"], "*");
    assert_eq!(response.headers()["access-control-allow-headers"], "*");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Departed");
}

#[tokio::test]
async fn test_missing_headers_are_rejected() {
    let harness = Harness::start().await;
    harness.identity_accepts(0).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&harness.upstream)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/users")
        .header("app", "demo")
        .header("token-key", "get:/users>icNfi78w")
        .body(Body::empty())
        .unwrap();
    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        json_body(response).await,
        json!({ "err": true, "result": "app, token-key or token-path header is missing" })
    );
}

#[tokio::test]
async fn test_request_is_forwarded_intact() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .and(header("fields", "id,name"))
        .and(body_json(json!({ "name": "Ada" })))
        .and(|req: &wiremock::Request| {
            req.headers
                .get("accept-encoding")
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value.contains("br"))
        })
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&harness.upstream)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/users?page=2")
        .header("app", "demo")
        .header("token-key", "post:/users>abcdefgh")
        .header("token-path", harness.store_path())
        .header("fields", "id,name")
        .header("accept-encoding", "identity")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"Ada"}"#))
        .unwrap();
    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await, json!({ "id": 7 }));
    assert!(!harness.temp.path().join("tokens.json").exists());
}

#[tokio::test]
async fn test_upstream_error_status_is_relayed() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "err": true, "result": "Not found" })),
        )
        .mount(&harness.upstream)
        .await;

    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(proxied_request(
            "GET",
            "/nowhere",
            "get:/nowhere>abcdefgh",
            &harness.store_path(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "err": true, "result": "Not found" })
    );
}

#[tokio::test]
async fn test_non_json_upstream_is_bad_gateway() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&harness.upstream)
        .await;

    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(proxied_request(
            "GET",
            "/users",
            "get:/users>icNfi78w",
            &harness.store_path(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["err"], json!(true));
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let identity = MockServer::start().await;
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "err": false, "result": CREDENTIAL })),
        )
        .mount(&identity)
        .await;

    let state = ProxyState::builder()
        .upstream_url("http://127.0.0.1:1")
        .identity_url(identity.uri())
        .operator(OperatorCredentials::new(
            "operator",
            SecretString::new("s3cret".into()),
        ))
        .stores(Arc::new(FileStoreLocator::new()))
        .build();

    let response = router(state)
        .oneshot(proxied_request(
            "GET",
            "/users",
            "get:/users>icNfi78w",
            "/tmp/tokenkeep-unused.json",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_store_write_failure_still_relays_response() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123" })))
        .mount(&harness.upstream)
        .await;

    // A regular file where the store's parent directory should be
    let blocker = harness.temp.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let token_path = blocker.join("tokens.json");

    let response = router(harness.state(Duration::from_secs(60)))
        .oneshot(proxied_request(
            "GET",
            "/users",
            "get:/users>icNfi78w",
            token_path.to_str().unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "token": "abc123" }));
}

#[tokio::test]
async fn test_pinned_store_ignores_token_path() {
    let harness = Harness::start().await;
    harness.identity_accepts(1).await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc123" })))
        .mount(&harness.upstream)
        .await;

    let pinned = harness.temp.path().join("pinned.json");
    let locator = Arc::new(FileStoreLocator::pinned(&pinned));
    let state = harness.state_with_stores(Duration::from_secs(60), locator.clone());

    let response = router(state)
        .oneshot(proxied_request(
            "GET",
            "/users",
            "get:/users>icNfi78w",
            &harness.store_path(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!harness.temp.path().join("tokens.json").exists());
    assert_eq!(
        locator
            .locate("ignored")
            .get("get:/users>icNfi78w")
            .unwrap()
            .as_deref(),
        Some("abc123")
    );
}
