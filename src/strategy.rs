//! Sliding-window decision strategy with a penalty box.
//!
//! Requests are counted in a per-identifier ordered set scored by arrival
//! time. Once the count reaches the limit, a penalty key is written and the
//! identifier is denied until that key's TTL elapses, no matter how far the
//! window has aged in the meantime.
//!
//! The steps of one evaluation are individually atomic against the store but
//! not globally transactional: two concurrent evaluators that both observe a
//! sub-limit count may both admit, so a fleet of `n` evaluators can overshoot
//! by at most `n - 1` requests per window.

use std::time::Duration;

use chrono::DateTime;

use crate::error::StorageError;
use crate::store::{now_unix_nanos, BatchOp, BatchReply, Store};
use crate::verdict::Decision;

/// Suffix appended to the window key to form the penalty key.
const PENALTY_SUFFIX: &str = ":block";

/// Slack added to the window key's expiration so idle entries self-reap
/// without racing the pruning bound.
const IDLE_GRACE: Duration = Duration::from_secs(60);

/// Sliding-window counter fused with a fixed-duration penalty box.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlidingWindow;

impl SlidingWindow {
    /// Create a new strategy instance.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one request against `key`.
    ///
    /// The count is taken before the current request is recorded, so exactly
    /// `limit` requests are admitted per rolling window under serial load;
    /// the request that finds the window full triggers the penalty and is
    /// not recorded.
    pub async fn evaluate<S: Store>(
        &self,
        store: &S,
        key: &str,
        limit: u32,
        window: Duration,
        penalty: Duration,
    ) -> Result<Decision, StorageError> {
        let now_ns = now_unix_nanos();
        let now = DateTime::from_timestamp_nanos(now_ns);
        let penalty_key = format!("{key}{PENALTY_SUFFIX}");

        // Penalty fence: an existing penalty key denies outright, and this
        // path performs no writes.
        if store.exists(&penalty_key).await? {
            let remaining_ttl = store.ttl(&penalty_key).await?.unwrap_or(Duration::ZERO);
            return Ok(Decision::denied(now + remaining_ttl));
        }

        // Age out entries older than the window and read what is left, in
        // one round-trip.
        let bound = now_ns - window.as_nanos() as i64;
        let replies = store
            .batch(&[
                BatchOp::PruneBefore { key, bound },
                BatchOp::Count { key },
            ])
            .await?;
        let count = replies
            .get(1)
            .and_then(BatchReply::as_count)
            .ok_or_else(|| StorageError::protocol("missing count reply in window batch"))?;

        // Limit test before recording the current request. A full window
        // starts the penalty; the denied request never enters the window.
        if count >= u64::from(limit) {
            store.set_with_ttl(&penalty_key, "1", penalty).await?;
            return Ok(Decision::denied(now + penalty));
        }

        store
            .batch(&[
                BatchOp::Add {
                    key,
                    score: now_ns,
                    member: now_ns,
                },
                BatchOp::Expire {
                    key,
                    ttl: window + IDLE_GRACE,
                },
            ])
            .await?;

        // The quota replenishes when the oldest recorded entry leaves the
        // window. This read trails the batch above; a concurrent prune can
        // skew it slightly, which only moves the advisory reset instant.
        let reset_at = if count > 0 {
            match store.ordered_min(key).await? {
                Some(oldest_ns) => DateTime::from_timestamp_nanos(oldest_ns) + window,
                None => now + window,
            }
        } else {
            now + window
        };

        let remaining = u64::from(limit).saturating_sub(count + 1) as u32;
        Ok(Decision::admitted(remaining, reset_at))
    }

    /// Purge all state for `key`: the window and any active penalty.
    ///
    /// Succeeds whether or not either key exists.
    pub async fn reset<S: Store>(&self, store: &S, key: &str) -> Result<(), StorageError> {
        let penalty_key = format!("{key}{PENALTY_SUFFIX}");
        store
            .batch(&[
                BatchOp::Delete { key },
                BatchOp::Delete { key: &penalty_key },
            ])
            .await?;
        Ok(())
    }
}
