//! Redis implementation of the remote tier over a deadpool connection pool.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::remote::{RemoteStore, ScanPage};

/// Build a Redis connection pool from configuration.
///
/// The pool is created lazily; no connection is opened until first use.
pub fn create_redis_pool(config: &RedisConfig) -> CacheResult<Pool> {
    // `from_url` leaves `pool` unset, so the pool settings are built here
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let timeout = config.timeout();
    redis_config.pool = Some(deadpool_redis::PoolConfig {
        max_size: config.pool_size,
        timeouts: deadpool_redis::Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        },
        ..Default::default()
    });

    redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| CacheError::CreatePool(e.to_string()))
}

/// Remote tier backed by Redis.
///
/// Cloning is cheap: the pool is reference counted and may be shared with
/// other subsystems.
#[derive(Clone)]
pub struct RedisRemoteStore {
    pool: Pool,
    timeout: Option<Duration>,
}

impl RedisRemoteStore {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            timeout: None,
        }
    }

    /// Bound every command (including connection checkout) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create a pool from configuration and wrap it.
    pub fn from_config(config: &RedisConfig) -> CacheResult<Self> {
        tracing::info!(url = %config.url, pool_size = config.pool_size, "Creating Redis pool");
        let pool = create_redis_pool(config)?;
        Ok(Self {
            pool,
            timeout: config.timeout(),
        })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn bounded<T>(&self, op: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| CacheError::Timeout(limit))?,
            None => op.await,
        }
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
        })
        .await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if !ttl.is_zero() {
                // PX rejects 0, so sub-millisecond TTLs round up
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                cmd.arg("PX").arg(millis);
            }
            let _: () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            conn.del::<_, ()>(key).await?;
            Ok(())
        })
        .await
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            let mut pipe = redis::pipe();
            for key in keys {
                pipe.del(key).ignore();
            }
            let _: () = pipe.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;
            Ok(ScanPage { keys, cursor })
        })
        .await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.bounded(async {
            let mut conn = self.pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pool_is_lazy() {
        let config = RedisConfig {
            url: "redis://nonexistent:9999".to_string(),
            pool_size: 2,
            timeout_ms: 100,
        };
        let store = RedisRemoteStore::from_config(&config).expect("pool config");
        assert_eq!(store.pool().status().max_size, 2);
        assert_eq!(store.timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_pool_size_applies_without_timeouts() {
        let config = RedisConfig {
            url: "redis://nonexistent:9999".to_string(),
            pool_size: 7,
            timeout_ms: 0,
        };
        let pool = create_redis_pool(&config).expect("pool config");
        assert_eq!(pool.status().max_size, 7);

        let store = RedisRemoteStore::from_config(&config).expect("pool config");
        assert_eq!(store.timeout, None);
    }

    #[tokio::test]
    async fn test_with_timeout_bounds_commands() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 0,
        };
        let pool = create_redis_pool(&config).expect("pool config");

        let store = RedisRemoteStore::new(pool.clone());
        assert_eq!(store.timeout, None);

        let store = RedisRemoteStore::new(pool).with_timeout(Duration::from_millis(200));
        assert_eq!(store.timeout, Some(Duration::from_millis(200)));

        // Refused or timed out, never a hang
        let started = std::time::Instant::now();
        assert!(store.ping().await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unreachable_redis_reports_error() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 500,
        };
        let store = RedisRemoteStore::from_config(&config).expect("pool config");
        assert!(store.ping().await.is_err());
        assert!(store.get("key").await.is_err());
    }
}
