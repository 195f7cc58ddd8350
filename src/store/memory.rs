//! In-memory store with TTL expiry.
//!
//! Backs tests and single-process deployments. Uses `DashMap` for
//! thread-safe concurrent access; expired entries are dropped lazily on
//! access, with a periodic sweep to keep idle keys from accumulating.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::store::{BatchOp, BatchReply, Store};

/// Sweep the whole map for expired entries every this many operations.
const SWEEP_EVERY: u64 = 4096;

#[derive(Debug, Clone)]
enum Slot {
    Value(#[allow(dead_code)] String),
    Sorted(BTreeMap<i64, i64>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }
}

/// In-memory implementation of [`Store`].
///
/// # Example
///
/// ```ignore
/// use gatelimit::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// ```
pub struct MemoryStore {
    data: DashMap<String, Entry>,
    op_count: AtomicU64,
    sweep_lock: Mutex<()>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.data.len())
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            op_count: AtomicU64::new(0),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Number of live keys. Expired-but-unswept entries are counted.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no keys at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop every expired entry now.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| !entry.is_expired(now));
    }

    fn touch(&self) {
        let count = self.op_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % SWEEP_EVERY == 0 {
            if let Some(_guard) = self.sweep_lock.try_lock() {
                self.sweep();
            }
        }
    }

    fn drop_if_expired(&self, key: &str) {
        let now = Instant::now();
        self.data.remove_if(key, |_, entry| entry.is_expired(now));
    }

    fn add_inner(&self, key: &str, score: i64, member: i64) -> Result<u64, StorageError> {
        self.drop_if_expired(key);
        let mut entry = self.data.entry(key.to_string()).or_insert_with(|| Entry {
            slot: Slot::Sorted(BTreeMap::new()),
            expires_at: None,
        });
        match &mut entry.slot {
            Slot::Sorted(members) => Ok(u64::from(members.insert(member, score).is_none())),
            Slot::Value(_) => Err(StorageError::protocol(format!(
                "key {key} does not hold an ordered set"
            ))),
        }
    }

    fn prune_inner(&self, key: &str, bound: i64) -> Result<u64, StorageError> {
        self.drop_if_expired(key);
        let Some(mut entry) = self.data.get_mut(key) else {
            return Ok(0);
        };
        let removed = match &mut entry.slot {
            Slot::Sorted(members) => {
                let before = members.len();
                members.retain(|_, score| *score > bound);
                (before - members.len()) as u64
            }
            Slot::Value(_) => {
                return Err(StorageError::protocol(format!(
                    "key {key} does not hold an ordered set"
                )))
            }
        };
        let now_empty = matches!(&entry.slot, Slot::Sorted(m) if m.is_empty());
        drop(entry);
        if now_empty {
            self.data.remove(key);
        }
        Ok(removed)
    }

    fn count_inner(&self, key: &str) -> Result<u64, StorageError> {
        self.drop_if_expired(key);
        match self.data.get(key).map(|e| match &e.slot {
            Slot::Sorted(members) => Ok(members.len() as u64),
            Slot::Value(_) => Err(StorageError::protocol(format!(
                "key {key} does not hold an ordered set"
            ))),
        }) {
            Some(result) => result,
            None => Ok(0),
        }
    }

    fn expire_inner(&self, key: &str, ttl: Duration) -> bool {
        self.drop_if_expired(key);
        match self.data.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }
    }

    fn delete_inner(&self, key: &str) -> u64 {
        u64::from(self.data.remove(key).is_some())
    }
}

impl Store for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.touch();
        self.drop_if_expired(key);
        Ok(self.data.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        self.touch();
        self.drop_if_expired(key);
        let now = Instant::now();
        Ok(self
            .data
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        self.touch();
        self.data.insert(
            key.to_string(),
            Entry {
                slot: Slot::Value(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn ordered_add(&self, key: &str, score: i64, member: i64) -> Result<(), StorageError> {
        self.touch();
        self.add_inner(key, score, member)?;
        Ok(())
    }

    async fn ordered_prune_before(&self, key: &str, bound: i64) -> Result<u64, StorageError> {
        self.touch();
        self.prune_inner(key, bound)
    }

    async fn ordered_count(&self, key: &str) -> Result<u64, StorageError> {
        self.touch();
        self.count_inner(key)
    }

    async fn ordered_min(&self, key: &str) -> Result<Option<i64>, StorageError> {
        self.touch();
        self.drop_if_expired(key);
        match self.data.get(key) {
            Some(entry) => match &entry.slot {
                Slot::Sorted(members) => Ok(members.values().min().copied()),
                Slot::Value(_) => Err(StorageError::protocol(format!(
                    "key {key} does not hold an ordered set"
                ))),
            },
            None => Ok(None),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        self.touch();
        Ok(self.expire_inner(key, ttl))
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.touch();
        for key in keys {
            self.delete_inner(key);
        }
        Ok(())
    }

    async fn batch(&self, ops: &[BatchOp<'_>]) -> Result<Vec<BatchReply>, StorageError> {
        self.touch();
        let mut replies = Vec::with_capacity(ops.len());
        for op in ops {
            let reply = match *op {
                BatchOp::PruneBefore { key, bound } => {
                    BatchReply::Pruned(self.prune_inner(key, bound)?)
                }
                BatchOp::Count { key } => BatchReply::Count(self.count_inner(key)?),
                BatchOp::Add { key, score, member } => {
                    BatchReply::Added(self.add_inner(key, score, member)?)
                }
                BatchOp::Expire { key, ttl } => BatchReply::Expired(self.expire_inner(key, ttl)),
                BatchOp::Delete { key } => BatchReply::Deleted(self.delete_inner(key)),
            };
            replies.push(reply);
        }
        Ok(replies)
    }

    async fn close(&self) {}
}
