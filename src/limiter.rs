//! The rate limiter: resolves an identifier to a quota and a verdict.
//!
//! Token profiles supersede the IP default whenever a token accompanies the
//! request. An unknown token still falls back to the IP default limits, but
//! keeps its `token:` storage key, so the key always reflects the identifier
//! as presented.

use std::sync::Arc;

use crate::error::Result;
use crate::profile::{QuotaProfile, TokenProfiles};
use crate::store::Store;
use crate::strategy::SlidingWindow;
use crate::verdict::{IdentifierClass, Verdict};

/// Per-identifier admission control over a shared backing store.
///
/// # Example
///
/// ```ignore
/// use gatelimit::{IdentifierClass, QuotaProfile, RateLimiter, TokenProfiles};
/// use gatelimit::store::MemoryStore;
/// use std::time::Duration;
///
/// let ip_profile = QuotaProfile::new(10, Duration::from_secs(1), Duration::from_secs(300));
/// let limiter = RateLimiter::new(MemoryStore::new(), ip_profile, TokenProfiles::new());
///
/// let verdict = limiter.check("1.1.1.1", IdentifierClass::Ip).await?;
/// ```
pub struct RateLimiter<S> {
    store: Arc<S>,
    strategy: SlidingWindow,
    ip_profile: QuotaProfile,
    token_profiles: TokenProfiles,
}

impl<S: std::fmt::Debug> std::fmt::Debug for RateLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store)
            .field("ip_profile", &self.ip_profile)
            .field("token_profiles", &self.token_profiles.len())
            .finish()
    }
}

impl<S: Store> RateLimiter<S> {
    /// Create a new limiter.
    pub fn new(store: S, ip_profile: QuotaProfile, token_profiles: TokenProfiles) -> Self {
        Self {
            store: Arc::new(store),
            strategy: SlidingWindow::new(),
            ip_profile,
            token_profiles,
        }
    }

    /// The default profile applied to IP identifiers and unknown tokens.
    pub fn ip_profile(&self) -> &QuotaProfile {
        &self.ip_profile
    }

    /// The configured token profiles.
    pub fn token_profiles(&self) -> &TokenProfiles {
        &self.token_profiles
    }

    /// Evaluate one request for `identifier` and emit a verdict.
    ///
    /// Storage errors are wrapped into [`crate::RateLimitError::Storage`];
    /// callers that prefer availability over strictness treat those as a
    /// fail-open signal.
    pub async fn check(&self, identifier: &str, class: IdentifierClass) -> Result<Verdict> {
        let profile = self.profile_for(identifier, class);
        let key = class.storage_key(identifier);

        let decision = self
            .strategy
            .evaluate(
                &*self.store,
                &key,
                profile.limit(),
                profile.window(),
                profile.penalty(),
            )
            .await?;

        Ok(Verdict::from_decision(
            identifier,
            class,
            profile.limit(),
            decision,
        ))
    }

    /// Purge all stored state for `identifier`.
    pub async fn reset(&self, identifier: &str, class: IdentifierClass) -> Result<()> {
        let key = class.storage_key(identifier);
        self.strategy.reset(&*self.store, &key).await?;
        Ok(())
    }

    fn profile_for(&self, identifier: &str, class: IdentifierClass) -> &QuotaProfile {
        if class.is_token() {
            self.token_profiles
                .get(identifier)
                .unwrap_or(&self.ip_profile)
        } else {
            &self.ip_profile
        }
    }
}
