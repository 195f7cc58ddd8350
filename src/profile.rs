//! Quota profiles and the token profile file.
//!
//! A [`QuotaProfile`] is the immutable triple driving one identifier's
//! admission: how many requests per window, and how long a penalty lasts
//! once the limit is breached. One default IP profile always exists; named
//! token profiles are loaded once at startup from a JSON file mapping token
//! string to `{limit, window_seconds, block_duration_seconds}`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Rate limiting quota profile.
///
/// # Examples
///
/// ```ignore
/// use gatelimit::QuotaProfile;
/// use std::time::Duration;
///
/// // 10 requests per second, 5 minute penalty on breach
/// let profile = QuotaProfile::new(10, Duration::from_secs(1), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct QuotaProfile {
    limit: u32,
    window: Duration,
    penalty: Duration,
}

/// Wire form of a profile, durations in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProfile {
    limit: u32,
    window_seconds: u64,
    block_duration_seconds: u64,
}

impl TryFrom<RawProfile> for QuotaProfile {
    type Error = ConfigError;

    fn try_from(raw: RawProfile) -> std::result::Result<Self, ConfigError> {
        Self::try_new(
            raw.limit,
            Duration::from_secs(raw.window_seconds),
            Duration::from_secs(raw.block_duration_seconds),
        )
        .map_err(|e| match e {
            crate::error::RateLimitError::Config(c) => c,
            other => ConfigError::InvalidProfile(other.to_string()),
        })
    }
}

impl From<QuotaProfile> for RawProfile {
    fn from(profile: QuotaProfile) -> Self {
        Self {
            limit: profile.limit,
            window_seconds: profile.window.as_secs(),
            block_duration_seconds: profile.penalty.as_secs(),
        }
    }
}

impl QuotaProfile {
    /// Create a new profile.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0 or `window` is zero duration. Use
    /// [`QuotaProfile::try_new`] for fallible construction.
    pub fn new(limit: u32, window: Duration, penalty: Duration) -> Self {
        assert!(limit > 0, "limit must be greater than 0");
        assert!(!window.is_zero(), "window must be non-zero");

        Self {
            limit,
            window,
            penalty,
        }
    }

    /// Try to create a new profile, returning an error if invalid.
    pub fn try_new(limit: u32, window: Duration, penalty: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(ConfigError::InvalidProfile("limit must be greater than 0".into()).into());
        }
        if window.is_zero() {
            return Err(ConfigError::InvalidProfile("window must be non-zero".into()).into());
        }
        Ok(Self {
            limit,
            window,
            penalty,
        })
    }

    /// Maximum requests admitted per rolling window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rolling window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Penalty duration applied after a breach.
    pub fn penalty(&self) -> Duration {
        self.penalty
    }
}

/// Named token profiles, indexed by exact token string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenProfiles(HashMap<String, QuotaProfile>);

impl TokenProfiles {
    /// Create an empty profile set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load token profiles from a JSON file.
    ///
    /// A missing or malformed file is a configuration error; the caller is
    /// expected to treat it as fatal at startup.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&contents)
            .map_err(|e| {
                ConfigError::ProfileMalformed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    /// Parse token profiles from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConfigError::ProfileMalformed {
                path: "<inline>".into(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Look up the profile for a token. `None` means the caller falls back
    /// to the IP default.
    pub fn get(&self, token: &str) -> Option<&QuotaProfile> {
        self.0.get(token)
    }

    /// Insert or replace a token profile.
    pub fn insert(&mut self, token: impl Into<String>, profile: QuotaProfile) {
        self.0.insert(token.into(), profile);
    }

    /// Number of configured tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no tokens are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, QuotaProfile)> for TokenProfiles {
    fn from_iter<I: IntoIterator<Item = (String, QuotaProfile)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
