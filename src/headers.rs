//! Rate-limit header names.
//!
//! Emitted on every evaluated request, admitted or denied. Requests that
//! fail open (store unreachable) carry none of these.

/// Standard rate limit header names.
pub mod names {
    /// Maximum requests allowed per window.
    pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";

    /// Remaining requests in the current window.
    pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

    /// When the rate limit resets, RFC 3339.
    pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
}

/// Request headers consulted by the admission filter.
pub mod request {
    /// Default header carrying the API token.
    pub const API_KEY: &str = "API_KEY";

    /// Proxy-forwarded client address chain; the first element wins.
    pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

    /// Single proxy-forwarded client address.
    pub const X_REAL_IP: &str = "X-Real-IP";
}
