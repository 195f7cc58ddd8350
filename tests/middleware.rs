//! Integration tests for the HTTP admission filter.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    routing::get,
    Extension, Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gatelimit::middleware::RateLimitLayer;
use gatelimit::store::{BatchOp, BatchReply, MemoryStore, Store};
use gatelimit::{
    QuotaProfile, RateLimitExt, RateLimiter, StorageError, TokenProfiles,
};

async fn handler(rate_limit: Option<Extension<RateLimitExt>>) -> String {
    match rate_limit {
        Some(Extension(ext)) => format!("remaining={}", ext.remaining()),
        None => "no-verdict".to_string(),
    }
}

fn app<S: Store>(limiter: RateLimiter<S>) -> Router {
    Router::new()
        .route("/api/v1/resource", get(handler))
        .layer(RateLimitLayer::new(limiter).with_check_timeout(Duration::from_millis(500)))
}

fn memory_app() -> Router {
    let ip_profile = QuotaProfile::new(
        10,
        Duration::from_secs(1),
        Duration::from_secs(300),
    );
    let tokens = TokenProfiles::from_json(
        r#"{"test": {"limit": 100, "window_seconds": 1, "block_duration_seconds": 300}}"#,
    )
    .unwrap();
    app(RateLimiter::new(MemoryStore::new(), ip_profile, tokens))
}

fn get_request(peer: &str) -> Request<Body> {
    let mut request = Request::builder()
        .uri("/api/v1/resource")
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo::<SocketAddr>(peer.parse().unwrap()));
    request
}

fn header<'a>(response: &'a axum::http::Response<Body>, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_admitted_request_carries_headers() {
    let app = memory_app();

    let response = app.oneshot(get_request("1.1.1.1:40000")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "X-RateLimit-Limit"), Some("10"));
    assert_eq!(header(&response, "X-RateLimit-Remaining"), Some("9"));

    let reset = header(&response, "X-RateLimit-Reset").unwrap();
    let reset = chrono::DateTime::parse_from_rfc3339(reset).unwrap();
    assert!(reset.to_utc() >= chrono::Utc::now() - chrono::Duration::seconds(1));
}

#[tokio::test]
async fn test_limit_breach_returns_429_with_json_body() {
    let app = memory_app();

    for i in 1..=10u32 {
        let response = app
            .clone()
            .oneshot(get_request("2.2.2.2:40000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i);
        if i == 10 {
            assert_eq!(header(&response, "X-RateLimit-Remaining"), Some("0"));
        }
    }

    let response = app
        .clone()
        .oneshot(get_request("2.2.2.2:40000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "X-RateLimit-Remaining"), Some("0"));
    assert_eq!(header(&response, "content-type"), Some("application/json"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(
        body["message"],
        "you have reached the maximum number of requests or actions allowed within a certain time frame"
    );
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_token_header_selects_token_profile() {
    let app = memory_app();

    let mut request = get_request("3.3.3.3:40000");
    request
        .headers_mut()
        .insert("API_KEY", "test".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "X-RateLimit-Limit"), Some("100"));
    assert_eq!(header(&response, "X-RateLimit-Remaining"), Some("99"));
}

#[tokio::test]
async fn test_unknown_token_still_keyed_by_token() {
    let app = memory_app();

    // Exhaust the unknown token's IP-sized allowance.
    for _ in 0..10 {
        let mut request = get_request("4.4.4.4:40000");
        request
            .headers_mut()
            .insert("API_KEY", "absent_token".parse().unwrap());
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "X-RateLimit-Limit"), Some("10"));
    }

    let mut request = get_request("4.4.4.4:40000");
    request
        .headers_mut()
        .insert("API_KEY", "absent_token".parse().unwrap());
    let denied = app.clone().oneshot(request).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    // The bare IP was never charged for the token traffic.
    let response = app.clone().oneshot(get_request("4.4.4.4:40000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "X-RateLimit-Remaining"), Some("9"));
}

#[tokio::test]
async fn test_forwarded_for_keys_the_bucket() {
    let app = memory_app();

    // Same peer, distinct forwarded clients: independent buckets.
    for client in ["5.5.5.1", "5.5.5.2"] {
        for _ in 0..10 {
            let mut request = get_request("10.0.0.1:40000");
            request
                .headers_mut()
                .insert("X-Forwarded-For", client.parse().unwrap());
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    let mut request = get_request("10.0.0.1:40000");
    request
        .headers_mut()
        .insert("X-Forwarded-For", "5.5.5.1".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // The peer address itself was never charged.
    let response = app.clone().oneshot(get_request("10.0.0.1:40000")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_handler_sees_the_verdict() {
    let app = memory_app();

    let response = app.oneshot(get_request("6.6.6.6:40000")).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    assert_eq!(&bytes[..], b"remaining=9");
}

/// A store that refuses every operation, standing in for an unreachable
/// backend.
#[derive(Debug, Clone, Default)]
struct OfflineStore;

impl OfflineStore {
    fn err() -> StorageError {
        StorageError::unavailable("store offline")
    }
}

impl Store for OfflineStore {
    async fn exists(&self, _key: &str) -> Result<bool, StorageError> {
        Err(Self::err())
    }

    async fn ttl(&self, _key: &str) -> Result<Option<Duration>, StorageError> {
        Err(Self::err())
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<(), StorageError> {
        Err(Self::err())
    }

    async fn ordered_add(
        &self,
        _key: &str,
        _score: i64,
        _member: i64,
    ) -> Result<(), StorageError> {
        Err(Self::err())
    }

    async fn ordered_prune_before(&self, _key: &str, _bound: i64) -> Result<u64, StorageError> {
        Err(Self::err())
    }

    async fn ordered_count(&self, _key: &str) -> Result<u64, StorageError> {
        Err(Self::err())
    }

    async fn ordered_min(&self, _key: &str) -> Result<Option<i64>, StorageError> {
        Err(Self::err())
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, StorageError> {
        Err(Self::err())
    }

    async fn delete(&self, _keys: &[&str]) -> Result<(), StorageError> {
        Err(Self::err())
    }

    async fn batch(&self, _ops: &[BatchOp<'_>]) -> Result<Vec<BatchReply>, StorageError> {
        Err(Self::err())
    }

    async fn close(&self) {}
}

#[tokio::test]
async fn test_store_failure_fails_open_without_headers() {
    let ip_profile = QuotaProfile::new(
        10,
        Duration::from_secs(1),
        Duration::from_secs(300),
    );
    let app = app(RateLimiter::new(
        OfflineStore,
        ip_profile,
        TokenProfiles::new(),
    ));

    let response = app.oneshot(get_request("7.7.7.7:40000")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "X-RateLimit-Limit").is_none());
    assert!(header(&response, "X-RateLimit-Remaining").is_none());
    assert!(header(&response, "X-RateLimit-Reset").is_none());

    // No verdict was stashed for the handler either.
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"no-verdict");
}

#[tokio::test]
async fn test_missing_peer_uses_shared_empty_bucket() {
    let app = memory_app();

    // No ConnectInfo, no proxy headers: evaluated as the empty-IP bucket.
    let request = Request::builder()
        .uri("/api/v1/resource")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "X-RateLimit-Limit"), Some("10"));
}
