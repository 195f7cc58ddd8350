//! JSON response envelopes.
//!
//! The wire shapes match what existing clients of the service already parse:
//! success bodies carry `{message, data, timestamp}`, error bodies carry
//! `{error, message, timestamp}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message sent with every 429 denial.
pub const RATE_LIMITED_MESSAGE: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";

/// Success response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessBody {
    /// Human-readable outcome.
    pub message: String,
    /// Optional payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

impl SuccessBody {
    /// Create a success body with a payload.
    pub fn new(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
        }
    }

    /// Create a success body without a payload.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            timestamp: Utc::now(),
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short error class, e.g. the HTTP status text.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    /// Create an error body.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// The body sent with every rate-limit denial.
    pub fn too_many_requests() -> Self {
        Self::new("Too Many Requests", RATE_LIMITED_MESSAGE)
    }
}
