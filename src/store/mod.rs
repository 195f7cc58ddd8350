//! Backing store trait and implementations.
//!
//! The decision strategy consumes a deliberately narrow capability set: keyed
//! values with TTL, ordered sets scored by timestamp, and pipelined batches.
//! Anything that can provide those atomically can back the limiter; Redis is
//! the production implementation, the in-memory store the test double.

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

use std::future::Future;
use std::time::Duration;

use crate::error::StorageError;

/// One operation inside a pipelined batch.
#[derive(Debug, Clone, Copy)]
pub enum BatchOp<'a> {
    /// Remove ordered-set members with score at or below `bound`.
    PruneBefore {
        /// Target key.
        key: &'a str,
        /// Inclusive score bound.
        bound: i64,
    },
    /// Read the cardinality of an ordered set.
    Count {
        /// Target key.
        key: &'a str,
    },
    /// Insert a member into an ordered set. An existing member is re-scored.
    Add {
        /// Target key.
        key: &'a str,
        /// Member score.
        score: i64,
        /// Member value.
        member: i64,
    },
    /// Attach or refresh a key's expiration.
    Expire {
        /// Target key.
        key: &'a str,
        /// New time to live.
        ttl: Duration,
    },
    /// Remove a key unconditionally.
    Delete {
        /// Target key.
        key: &'a str,
    },
}

/// Per-operation reply from a pipelined batch, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchReply {
    /// Members removed by a prune.
    Pruned(u64),
    /// Ordered-set cardinality.
    Count(u64),
    /// Members newly added.
    Added(u64),
    /// Whether the expiration was applied (false when the key is absent).
    Expired(bool),
    /// Keys removed.
    Deleted(u64),
}

impl BatchReply {
    /// The reply as a cardinality, if it is one.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }
}

/// Storage backend trait for rate limiting state.
///
/// All operations are async and surface [`StorageError`] verbatim; the
/// adapter performs no retries. Individual operations are atomic on the
/// store side, but a [`Store::batch`] is a single network round-trip, not a
/// transaction.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait Store: Send + Sync + 'static {
    /// Whether the key is present.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remaining lifetime of a key. `None` when the key is absent or carries
    /// no expiration.
    fn ttl(&self, key: &str)
        -> impl Future<Output = Result<Option<Duration>, StorageError>> + Send;

    /// Unconditional write with expiration.
    fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Insert a member into an ordered set.
    fn ordered_add(
        &self,
        key: &str,
        score: i64,
        member: i64,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Remove ordered-set members with score at or below `bound`. Returns
    /// the number removed.
    fn ordered_prune_before(
        &self,
        key: &str,
        bound: i64,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Cardinality of an ordered set. Zero for an absent key.
    fn ordered_count(&self, key: &str) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Smallest score in an ordered set, or `None` when empty or absent.
    fn ordered_min(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<i64>, StorageError>> + Send;

    /// Attach or refresh a key's expiration. Returns false when the key is
    /// absent.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Remove keys unconditionally. Succeeds on absent keys.
    fn delete(&self, keys: &[&str]) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Submit a pipelined sequence in one network round-trip.
    ///
    /// Replies come back in submission order. The pipeline is not required
    /// to be a transaction.
    fn batch(
        &self,
        ops: &[BatchOp<'_>],
    ) -> impl Future<Output = Result<Vec<BatchReply>, StorageError>> + Send;

    /// Release underlying resources.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl<S: Store> Store for std::sync::Arc<S> {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        (**self).ttl(key).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn ordered_add(&self, key: &str, score: i64, member: i64) -> Result<(), StorageError> {
        (**self).ordered_add(key, score, member).await
    }

    async fn ordered_prune_before(&self, key: &str, bound: i64) -> Result<u64, StorageError> {
        (**self).ordered_prune_before(key, bound).await
    }

    async fn ordered_count(&self, key: &str) -> Result<u64, StorageError> {
        (**self).ordered_count(key).await
    }

    async fn ordered_min(&self, key: &str) -> Result<Option<i64>, StorageError> {
        (**self).ordered_min(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        (**self).expire(key, ttl).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).delete(keys).await
    }

    async fn batch(&self, ops: &[BatchOp<'_>]) -> Result<Vec<BatchReply>, StorageError> {
        (**self).batch(ops).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Current wall-clock time as Unix nanoseconds.
///
/// Window scores interoperate with data already in the store, so this is the
/// system clock, not a monotonic source.
pub fn now_unix_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_nanos() as i64
}
