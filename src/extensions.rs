//! Request extensions for accessing the verdict in handlers.
//!
//! The admission filter stashes the verdict of an admitted request into the
//! request's extensions, so downstream handlers can inspect it without
//! reparsing response headers.
//!
//! # Example
//!
//! ```ignore
//! use axum::Extension;
//! use gatelimit::RateLimitExt;
//!
//! async fn handler(Extension(rate_limit): Extension<RateLimitExt>) {
//!     println!("Remaining: {}", rate_limit.remaining());
//! }
//! ```

use crate::verdict::Verdict;

/// Verdict of the admission filter, available via request extensions.
#[derive(Debug, Clone)]
pub struct RateLimitExt {
    verdict: Verdict,
}

impl RateLimitExt {
    /// Wrap a verdict for extension storage.
    pub fn new(verdict: Verdict) -> Self {
        Self { verdict }
    }

    /// The full verdict.
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Whether the request was admitted. Always true for extensions seen by
    /// handlers, since denied requests short-circuit before them.
    pub fn is_admitted(&self) -> bool {
        self.verdict.admitted
    }

    /// Remaining quota in the current window.
    pub fn remaining(&self) -> u32 {
        self.verdict.remaining
    }

    /// The effective limit applied to this request.
    pub fn limit(&self) -> u32 {
        self.verdict.limit
    }
}
