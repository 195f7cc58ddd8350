//! Distributed HTTP request rate limiting for Rust.
//!
//! `gatelimit` decides, for each incoming request, whether to admit or
//! reject it against per-identifier quotas held in a shared backing store:
//!
//! - **Sliding window + penalty box**: requests are counted over a rolling
//!   window; breaching the limit starts a fixed cool-off that dominates
//!   window recovery
//! - **Two quota classes**: per client IP by default, per API token when one
//!   accompanies the request
//! - **Pluggable storage**: Redis with connection pooling for fleets, an
//!   in-memory store for tests and single-process use
//! - **Axum integration**: a tower layer that attaches rate-limit headers,
//!   answers denials with a 429 JSON body, and fails open when the store is
//!   unreachable
//!
//! # Quick Start
//!
//! ```ignore
//! use gatelimit::{IdentifierClass, QuotaProfile, RateLimiter, TokenProfiles};
//! use gatelimit::store::MemoryStore;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ip_profile = QuotaProfile::new(10, Duration::from_secs(1), Duration::from_secs(300));
//!     let limiter = RateLimiter::new(MemoryStore::new(), ip_profile, TokenProfiles::new());
//!
//!     let verdict = limiter.check("1.1.1.1", IdentifierClass::Ip).await.unwrap();
//!     if verdict.admitted {
//!         println!("admitted, {} remaining", verdict.remaining);
//!     } else {
//!         println!("denied until {}", verdict.reset_rfc3339());
//!     }
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `memory` (default): in-memory storage
//! - `redis`: Redis storage backend
//! - `axum`: axum/tower middleware integration
//! - `server`: the `gatelimit-server` binary

pub mod error;
pub mod extensions;
pub mod headers;
pub mod limiter;
pub mod profile;
pub mod response;
pub mod store;
pub mod strategy;
pub mod verdict;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-export main types
pub use error::{ConfigError, RateLimitError, Result, StorageError};
pub use extensions::RateLimitExt;
pub use limiter::RateLimiter;
pub use profile::{QuotaProfile, TokenProfiles};
pub use store::Store;
pub use strategy::SlidingWindow;
pub use verdict::{Decision, IdentifierClass, Verdict};

#[cfg(feature = "memory")]
pub use store::MemoryStore;

#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{RateLimitError, Result, StorageError};
    pub use crate::limiter::RateLimiter;
    pub use crate::profile::{QuotaProfile, TokenProfiles};
    pub use crate::store::Store;
    pub use crate::strategy::SlidingWindow;
    pub use crate::verdict::{IdentifierClass, Verdict};

    #[cfg(feature = "memory")]
    pub use crate::store::MemoryStore;

    #[cfg(feature = "redis")]
    pub use crate::store::{RedisConfig, RedisStore};
}
