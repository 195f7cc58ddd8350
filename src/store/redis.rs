//! Redis store for distributed rate limiting.
//!
//! Uses connection pooling; batches go out as a single pipelined round-trip.
//! Sorted-set scores are written as doubles, which is what the wire protocol
//! carries and what existing window data in deployed stores already holds.

use std::time::Duration;

use deadpool_redis::{
    redis::{self, cmd, from_redis_value, Value},
    Config, Connection, Pool, PoolConfig, Runtime,
};

use crate::error::StorageError;
use crate::store::{BatchOp, BatchReply, Store};

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379/0").
    pub url: String,
    /// Connection pool size.
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 16,
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration from a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from individual connection parameters.
    pub fn from_parts(host: &str, port: u16, password: &str, db: i64) -> Self {
        let url = if password.is_empty() {
            format!("redis://{host}:{port}/{db}")
        } else {
            format!("redis://:{password}@{host}:{port}/{db}")
        };
        Self::new(url)
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Redis implementation of [`Store`].
///
/// # Example
///
/// ```ignore
/// use gatelimit::store::{RedisConfig, RedisStore};
///
/// let config = RedisConfig::from_parts("localhost", 6379, "", 0).with_pool_size(32);
/// let store = RedisStore::new(config).await?;
/// ```
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish()
    }
}

impl RedisStore {
    /// Create a new Redis store and verify the connection with a PING.
    pub async fn new(config: RedisConfig) -> Result<Self, StorageError> {
        let mut cfg = Config::from_url(&config.url);
        cfg.pool = Some(PoolConfig::new(config.pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StorageError::unavailable(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StorageError::unavailable(e.to_string()))?;
        let _: () = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        Ok(Self { pool })
    }

    /// Create a new Redis store from a URL.
    pub async fn from_url(url: impl Into<String>) -> Result<Self, StorageError> {
        Self::new(RedisConfig::new(url)).await
    }

    async fn get_conn(&self) -> Result<Connection, StorageError> {
        self.pool.get().await.map_err(|_| StorageError::PoolExhausted)
    }
}

fn redis_err(e: redis::RedisError) -> StorageError {
    StorageError::unavailable(e.to_string())
}

impl Store for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.get_conn().await?;
        let n: i64 = cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(n > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        let mut conn = self.get_conn().await?;
        // PTTL: -2 when absent, -1 when the key has no expiration.
        let millis: i64 = cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        if millis < 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(millis as u64)))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let mut conn = self.get_conn().await?;
        let _: () = cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn ordered_add(&self, key: &str, score: i64, member: i64) -> Result<(), StorageError> {
        let mut conn = self.get_conn().await?;
        let _: i64 = cmd("ZADD")
            .arg(key)
            .arg(score as f64)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn ordered_prune_before(&self, key: &str, bound: i64) -> Result<u64, StorageError> {
        let mut conn = self.get_conn().await?;
        let removed: i64 = cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(0)
            .arg(bound)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(removed.max(0) as u64)
    }

    async fn ordered_count(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.get_conn().await?;
        let n: i64 = cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(n.max(0) as u64)
    }

    async fn ordered_min(&self, key: &str) -> Result<Option<i64>, StorageError> {
        let mut conn = self.get_conn().await?;
        let entries: Vec<(String, f64)> = cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(entries.first().map(|(_, score)| *score as i64))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let mut conn = self.get_conn().await?;
        let applied: i64 = cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(applied == 1)
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_conn().await?;
        let mut del = cmd("DEL");
        for key in keys {
            del.arg(key);
        }
        let _: i64 = del.query_async(&mut conn).await.map_err(redis_err)?;
        Ok(())
    }

    async fn batch(&self, ops: &[BatchOp<'_>]) -> Result<Vec<BatchReply>, StorageError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get_conn().await?;

        let mut pipe = redis::pipe();
        for op in ops {
            match *op {
                BatchOp::PruneBefore { key, bound } => {
                    pipe.cmd("ZREMRANGEBYSCORE").arg(key).arg(0).arg(bound);
                }
                BatchOp::Count { key } => {
                    pipe.cmd("ZCARD").arg(key);
                }
                BatchOp::Add { key, score, member } => {
                    pipe.cmd("ZADD").arg(key).arg(score as f64).arg(member);
                }
                BatchOp::Expire { key, ttl } => {
                    pipe.cmd("PEXPIRE").arg(key).arg(ttl.as_millis() as u64);
                }
                BatchOp::Delete { key } => {
                    pipe.cmd("DEL").arg(key);
                }
            }
        }

        let values: Vec<Value> = pipe.query_async(&mut conn).await.map_err(redis_err)?;
        if values.len() != ops.len() {
            return Err(StorageError::protocol(format!(
                "pipeline returned {} replies for {} operations",
                values.len(),
                ops.len()
            )));
        }

        ops.iter()
            .zip(values.iter())
            .map(|(op, value)| {
                let n: i64 = from_redis_value(value)
                    .map_err(|e| StorageError::protocol(e.to_string()))?;
                Ok(match op {
                    BatchOp::PruneBefore { .. } => BatchReply::Pruned(n.max(0) as u64),
                    BatchOp::Count { .. } => BatchReply::Count(n.max(0) as u64),
                    BatchOp::Add { .. } => BatchReply::Added(n.max(0) as u64),
                    BatchOp::Expire { .. } => BatchReply::Expired(n == 1),
                    BatchOp::Delete { .. } => BatchReply::Deleted(n.max(0) as u64),
                })
            })
            .collect()
    }

    async fn close(&self) {
        self.pool.close();
    }
}
