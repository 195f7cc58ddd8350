//! Decision and verdict types.
//!
//! The decision strategy answers with a [`Decision`]: admitted or not, how
//! much quota is left, and when the window resets. The resolver enriches that
//! into a [`Verdict`] carrying the identifier, its class, and the effective
//! limit, so the HTTP layer can emit headers without re-deriving anything.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::headers::names;

/// The class of an identifier: client IP address or API token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierClass {
    /// Requests keyed by client IP address.
    Ip,
    /// Requests keyed by API token.
    Token,
}

impl IdentifierClass {
    /// Check if this is the token class.
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token)
    }

    /// Build the namespaced storage key for an identifier of this class.
    ///
    /// The layout is fixed for compatibility with existing deployments:
    /// `ip:<addr>` or `token:<string>`.
    pub fn storage_key(&self, identifier: &str) -> String {
        match self {
            Self::Ip => format!("ip:{identifier}"),
            Self::Token => format!("token:{identifier}"),
        }
    }
}

/// The outcome of one strategy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    admitted: bool,
    remaining: u32,
    reset_at: DateTime<Utc>,
}

impl Decision {
    /// Create an admitted decision.
    pub fn admitted(remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            admitted: true,
            remaining,
            reset_at,
        }
    }

    /// Create a denied decision. Denials always carry zero remaining quota.
    pub fn denied(reset_at: DateTime<Utc>) -> Self {
        Self {
            admitted: false,
            remaining: 0,
            reset_at,
        }
    }

    /// Whether the request was admitted.
    pub fn is_admitted(&self) -> bool {
        self.admitted
    }

    /// Whether the request was denied.
    pub fn is_denied(&self) -> bool {
        !self.admitted
    }

    /// Remaining quota in the current window.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// When the quota resets: the oldest window entry's expiry for admitted
    /// requests, the penalty expiry for denied ones.
    pub fn reset_at(&self) -> DateTime<Utc> {
        self.reset_at
    }
}

/// A complete admission verdict, as emitted by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the request was admitted.
    pub admitted: bool,
    /// The effective limit applied to this identifier.
    pub limit: u32,
    /// Remaining quota in the current window.
    pub remaining: u32,
    /// When the quota resets.
    pub reset_at: DateTime<Utc>,
    /// The identifier the request was keyed on, as presented.
    pub identifier: String,
    /// The class of the identifier.
    pub class: IdentifierClass,
}

impl Verdict {
    /// Build a verdict from a strategy decision plus resolver context.
    pub fn from_decision(
        identifier: impl Into<String>,
        class: IdentifierClass,
        limit: u32,
        decision: Decision,
    ) -> Self {
        Self {
            admitted: decision.is_admitted(),
            limit,
            remaining: decision.remaining(),
            reset_at: decision.reset_at(),
            identifier: identifier.into(),
            class,
        }
    }

    /// The reset instant formatted as RFC 3339 with seconds precision,
    /// matching what existing clients parse from `X-RateLimit-Reset`.
    pub fn reset_rfc3339(&self) -> String {
        self.reset_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// The rate-limit headers for this verdict as (name, value) pairs.
    pub fn header_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (names::RATE_LIMIT_LIMIT, self.limit.to_string()),
            (names::RATE_LIMIT_REMAINING, self.remaining.to_string()),
            (names::RATE_LIMIT_RESET, self.reset_rfc3339()),
        ]
    }
}
