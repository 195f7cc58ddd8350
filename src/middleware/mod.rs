//! Axum middleware applying the rate limiter at the request boundary.
//!
//! The layer extracts the client identifier (API token header, else
//! proxy-aware client IP), consults the limiter, attaches `X-RateLimit-*`
//! headers, and short-circuits denied requests with a 429 JSON body. When
//! the backing store cannot answer, the request proceeds without headers:
//! availability over strictness.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use gatelimit::middleware::RateLimitLayer;
//!
//! let app = Router::new()
//!     .route("/api/v1/resource", get(handler))
//!     .layer(RateLimitLayer::new(limiter));
//! ```

pub mod extract;
mod layer;

pub use layer::{RateLimitLayer, RateLimitService};
