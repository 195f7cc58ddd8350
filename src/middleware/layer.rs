//! Tower layer applying the rate limiter at the request boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{
    header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode,
};
use tower::{Layer, Service};
use tracing::warn;

use crate::extensions::RateLimitExt;
use crate::limiter::RateLimiter;
use crate::middleware::extract;
use crate::response::ErrorBody;
use crate::store::Store;
use crate::verdict::{IdentifierClass, Verdict};

/// Default deadline for one rate limit check against the backing store.
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tower layer for rate limiting.
///
/// Attaches `X-RateLimit-*` headers to every evaluated request, denies with
/// a 429 JSON body, and fails open when the backing store is unreachable.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get};
/// use gatelimit::{middleware::RateLimitLayer, QuotaProfile, RateLimiter, TokenProfiles};
/// use gatelimit::store::MemoryStore;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(
///     MemoryStore::new(),
///     QuotaProfile::new(10, Duration::from_secs(1), Duration::from_secs(300)),
///     TokenProfiles::new(),
/// );
///
/// let app = Router::new()
///     .route("/api/v1/resource", get(handler))
///     .layer(RateLimitLayer::new(limiter));
/// ```
pub struct RateLimitLayer<S> {
    limiter: Arc<RateLimiter<S>>,
    token_header: HeaderName,
    check_timeout: Duration,
}

impl<S> RateLimitLayer<S> {
    /// Create a new rate limit layer owning the limiter.
    pub fn new(limiter: RateLimiter<S>) -> Self {
        Self::from_arc(Arc::new(limiter))
    }

    /// Create a new rate limit layer sharing an existing limiter.
    pub fn from_arc(limiter: Arc<RateLimiter<S>>) -> Self {
        Self {
            limiter,
            token_header: extract::default_token_header(),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    /// Override the request header consulted for the API token.
    pub fn with_token_header(mut self, header: HeaderName) -> Self {
        self.token_header = header;
        self
    }

    /// Override the per-check deadline. Expiry counts as a storage failure
    /// and the request fails open.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }
}

impl<S> Clone for RateLimitLayer<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            token_header: self.token_header.clone(),
            check_timeout: self.check_timeout,
        }
    }
}

impl<S, Inner> Layer<Inner> for RateLimitLayer<S> {
    type Service = RateLimitService<S, Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            token_header: self.token_header.clone(),
            check_timeout: self.check_timeout,
        }
    }
}

/// The rate limiting service.
pub struct RateLimitService<S, Inner> {
    inner: Inner,
    limiter: Arc<RateLimiter<S>>,
    token_header: HeaderName,
    check_timeout: Duration,
}

impl<S, Inner: Clone> Clone for RateLimitService<S, Inner> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: self.limiter.clone(),
            token_header: self.token_header.clone(),
            check_timeout: self.check_timeout,
        }
    }
}

impl<S, Inner> Service<Request<Body>> for RateLimitService<S, Inner>
where
    S: Store,
    Inner: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    Inner::Future: Send,
{
    type Response = Response<Body>;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let token_header = self.token_header.clone();
        let check_timeout = self.check_timeout;
        // Take the service that was driven to readiness; leave the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (identifier, class) = match extract::identify(&request, &token_header) {
                Some(id) => id,
                None => {
                    warn!("no client identifier on request; using shared empty bucket");
                    (String::new(), IdentifierClass::Ip)
                }
            };

            let checked =
                tokio::time::timeout(check_timeout, limiter.check(&identifier, class)).await;
            let verdict = match checked {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(err)) => {
                    warn!(%identifier, error = %err, "rate limiter unavailable; failing open");
                    return inner.call(request).await;
                }
                Err(_) => {
                    warn!(
                        %identifier,
                        timeout = ?check_timeout,
                        "rate limit check timed out; failing open"
                    );
                    return inner.call(request).await;
                }
            };

            if !verdict.admitted {
                return Ok(too_many_requests(&verdict));
            }

            let mut request = request;
            request
                .extensions_mut()
                .insert(RateLimitExt::new(verdict.clone()));

            let mut response = inner.call(request).await?;
            apply_headers(response.headers_mut(), &verdict);
            Ok(response)
        })
    }
}

/// Attach the rate-limit headers for a verdict.
fn apply_headers(headers: &mut HeaderMap, verdict: &Verdict) {
    for (name, value) in verdict.header_pairs() {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// Build the 429 denial response.
fn too_many_requests(verdict: &Verdict) -> Response<Body> {
    let body = serde_json::to_vec(&ErrorBody::too_many_requests())
        .expect("error body always serializes");

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_headers(response.headers_mut(), verdict);
    response
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::profile::{QuotaProfile, TokenProfiles};
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[test]
    fn test_layer_creation() {
        let limiter = RateLimiter::new(
            MemoryStore::new(),
            QuotaProfile::new(10, Duration::from_secs(1), Duration::from_secs(300)),
            TokenProfiles::new(),
        );

        let layer = RateLimitLayer::new(limiter)
            .with_check_timeout(Duration::from_secs(1))
            .with_token_header(HeaderName::from_static("x-api-key"));

        assert_eq!(layer.check_timeout, Duration::from_secs(1));
        assert_eq!(layer.token_header.as_str(), "x-api-key");
    }

    #[test]
    fn test_denial_response_shape() {
        let verdict = Verdict::from_decision(
            "1.1.1.1",
            IdentifierClass::Ip,
            10,
            crate::verdict::Decision::denied(Utc::now()),
        );

        let response = too_many_requests(&verdict);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "10");
        assert!(response.headers().contains_key("X-RateLimit-Reset"));
    }
}
