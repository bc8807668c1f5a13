//! Redis transport backed by a `deadpool_redis` connection pool.

use async_trait::async_trait;
use deadpool_redis::redis::{self, RedisError};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::debug;

use super::{Command, Connection, Transaction, Transport};
use crate::error::{LimiterError, Result};

/// Transport that checks connections out of a shared Redis pool.
///
/// The pool is an externally owned handle; cloning the transport shares it.
#[derive(Clone)]
pub struct RedisTransport {
    pool: Pool,
}

impl std::fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTransport")
            .field("status", &self.pool.status())
            .finish()
    }
}

impl RedisTransport {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool of at most `max_size` connections to `url`.
    pub fn from_url(url: &str, max_size: usize) -> Result<Self> {
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(max_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| LimiterError::ConnectionFailure(e.to_string()))?;

        debug!(url = %url, max_size = max_size, "Created Redis connection pool");
        Ok(Self::new(pool))
    }

    /// The underlying pool handle.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl Transport for RedisTransport {
    type Conn = RedisConnection;

    async fn acquire(&self) -> Result<RedisConnection> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| LimiterError::ConnectionFailure(e.to_string()))?;
        Ok(RedisConnection { conn })
    }
}

/// A pooled Redis connection. Returned to the pool on drop.
pub struct RedisConnection {
    conn: deadpool_redis::Connection,
}

/// Map a driver error, keeping transport faults apart from command faults.
fn classify(e: RedisError, otherwise: fn(String) -> LimiterError) -> LimiterError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
        LimiterError::ConnectionFailure(e.to_string())
    } else {
        otherwise(e.to_string())
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn ping(&mut self) -> Result<String> {
        redis::cmd("PING")
            .query_async(&mut self.conn)
            .await
            .map_err(|e| classify(e, LimiterError::UnexpectedResponse))
    }

    async fn watch(&mut self, key: &str) -> Result<()> {
        redis::cmd("WATCH")
            .arg(key)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| classify(e, LimiterError::TransactionFailure))
    }

    async fn unwatch(&mut self) -> Result<()> {
        redis::cmd("UNWATCH")
            .query_async(&mut self.conn)
            .await
            .map_err(|e| classify(e, LimiterError::TransactionFailure))
    }

    async fn exec(&mut self, txn: &Transaction) -> Result<Option<Vec<i64>>> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in txn.commands() {
            match command {
                Command::SetNx { key, value } => pipe.cmd("SETNX").arg(key).arg(*value),
                Command::ExpireNx { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key).arg(*seconds).arg("NX")
                }
                Command::Incr { key } => pipe.cmd("INCR").arg(key),
                Command::Ttl { key } => pipe.cmd("TTL").arg(key),
            };
        }

        // EXEC replies nil when a watched key changed.
        pipe.query_async(&mut self.conn)
            .await
            .map_err(|e| classify(e, LimiterError::TransactionFailure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{FixedWindowStore, Rate};

    fn redis_url() -> String {
        std::env::var("RATEWINDOW_TEST_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    async fn test_from_url_rejects_malformed_url() {
        let result = RedisTransport::from_url("not a url", 4);
        assert!(matches!(result, Err(LimiterError::ConnectionFailure(_))));
    }

    #[tokio::test]
    async fn test_store_construction_fails_without_server() {
        // Nothing listens on port 1.
        let transport = RedisTransport::from_url("redis://127.0.0.1:1", 1).unwrap();
        let result = FixedWindowStore::new(transport, "").await;
        assert!(matches!(result, Err(LimiterError::ConnectionFailure(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_live_redis_window() {
        let transport = RedisTransport::from_url(&redis_url(), 4).unwrap();
        let store = FixedWindowStore::new(transport, "ratewindow-test")
            .await
            .unwrap();
        let identifier = format!("live-{}", chrono::Utc::now().timestamp_micros());
        let rate = Rate::per_minute(2).unwrap();

        let first = store.get(&identifier, &rate).await.unwrap();
        assert_eq!(first.remaining, 1);
        assert!(!first.reached);

        let second = store.get(&identifier, &rate).await.unwrap();
        assert_eq!(second.remaining, 0);
        assert!(!second.reached);

        let third = store.get(&identifier, &rate).await.unwrap();
        assert_eq!(third.remaining, 0);
        assert!(third.reached);
    }
}
