//! Client identifier extraction.
//!
//! A request is keyed by its API token when the token header carries a
//! non-empty value, and by client IP otherwise. IP resolution is
//! proxy-aware: the first `X-Forwarded-For` element wins, then `X-Real-IP`,
//! then the peer address with its port stripped.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderName, Request};

use crate::headers::request as request_headers;
use crate::verdict::IdentifierClass;

/// The default token header name. Lookup is case-insensitive.
pub fn default_token_header() -> HeaderName {
    HeaderName::from_static("api_key")
}

/// Extract the identifier the request should be keyed on.
///
/// Returns `None` only when there is no token, no proxy header, and no peer
/// address on the request.
pub fn identify<B>(
    request: &Request<B>,
    token_header: &HeaderName,
) -> Option<(String, IdentifierClass)> {
    let token = request
        .headers()
        .get(token_header)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    if let Some(token) = token {
        return Some((token.to_string(), IdentifierClass::Token));
    }

    client_ip(request).map(|ip| (ip, IdentifierClass::Ip))
}

/// Resolve the client IP address for a request.
pub fn client_ip<B>(request: &Request<B>) -> Option<String> {
    if let Some(forwarded) = header_str(request, request_headers::X_FORWARDED_FOR) {
        // May hold a chain of addresses; the first is the original client.
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = header_str(request, request_headers::X_REAL_IP) {
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

fn header_str<'a, B>(request: &'a Request<B>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/api/v1/resource")
    }

    fn with_peer(builder: axum::http::request::Builder, addr: &str) -> Request<Body> {
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>(addr.parse().unwrap()));
        req
    }

    #[test]
    fn test_forwarded_for_takes_precedence() {
        let req = with_peer(
            request()
                .header("X-Forwarded-For", "203.0.113.50, 70.41.3.18")
                .header("X-Real-IP", "10.0.0.2"),
            "10.0.0.1:54321",
        );

        assert_eq!(client_ip(&req), Some("203.0.113.50".to_string()));
    }

    #[test]
    fn test_real_ip_beats_peer_address() {
        let req = with_peer(request().header("X-Real-IP", "10.0.0.2"), "10.0.0.1:54321");
        assert_eq!(client_ip(&req), Some("10.0.0.2".to_string()));
    }

    #[test]
    fn test_peer_address_is_port_stripped() {
        let req = with_peer(request(), "192.168.1.7:54321");
        assert_eq!(client_ip(&req), Some("192.168.1.7".to_string()));
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        let req = with_peer(
            request()
                .header("X-Forwarded-For", "  ")
                .header("X-Real-IP", "10.0.0.2"),
            "10.0.0.1:54321",
        );
        assert_eq!(client_ip(&req), Some("10.0.0.2".to_string()));
    }

    #[test]
    fn test_token_wins_over_ip() {
        let req = with_peer(request().header("API_KEY", "secret"), "10.0.0.1:54321");
        let (identifier, class) = identify(&req, &default_token_header()).unwrap();

        assert_eq!(identifier, "secret");
        assert!(class.is_token());
    }

    #[test]
    fn test_token_header_is_case_insensitive() {
        let req = with_peer(request().header("api_key", "secret"), "10.0.0.1:54321");
        let (identifier, class) = identify(&req, &default_token_header()).unwrap();

        assert_eq!(identifier, "secret");
        assert!(class.is_token());
    }

    #[test]
    fn test_empty_token_falls_back_to_ip() {
        let req = with_peer(request().header("API_KEY", ""), "10.0.0.1:54321");
        let (identifier, class) = identify(&req, &default_token_header()).unwrap();

        assert_eq!(identifier, "10.0.0.1");
        assert!(!class.is_token());
    }

    #[test]
    fn test_no_identifier_at_all() {
        let req = request().body(Body::empty()).unwrap();
        assert!(identify(&req, &default_token_header()).is_none());
    }
}
