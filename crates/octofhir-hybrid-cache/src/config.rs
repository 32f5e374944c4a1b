//! Cache configuration.
//!
//! Values come from an optional TOML file plus `HYBRID_CACHE__*` environment
//! overrides, e.g. `HYBRID_CACHE__REDIS__URL=redis://cache:6379`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::local::DEFAULT_MAX_COST;

/// Hybrid cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridCacheConfig {
    /// Prefix for derived keys (`<prefix>:<digest>`)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Local (L1) entry lifetime in milliseconds; 0 disables expiration
    #[serde(default = "default_local_ttl_ms")]
    pub local_ttl_ms: u64,

    /// Default remote (L2) entry lifetime in milliseconds; 0 disables expiration
    #[serde(default = "default_remote_ttl_ms")]
    pub remote_ttl_ms: u64,

    /// Local tier cost budget (each entry costs 1)
    #[serde(default = "default_max_cost")]
    pub max_cost: u64,

    /// Redis connection settings for the remote tier
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_prefix() -> String {
    "cache".to_string()
}

fn default_local_ttl_ms() -> u64 {
    5 * 60 * 1000 // 5 minutes
}

fn default_remote_ttl_ms() -> u64 {
    10 * 60 * 1000 // 10 minutes
}

fn default_max_cost() -> u64 {
    DEFAULT_MAX_COST
}

impl Default for HybridCacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            local_ttl_ms: default_local_ttl_ms(),
            remote_ttl_ms: default_remote_ttl_ms(),
            max_cost: default_max_cost(),
            redis: RedisConfig::default(),
        }
    }
}

impl HybridCacheConfig {
    pub fn local_ttl(&self) -> Duration {
        Duration::from_millis(self.local_ttl_ms)
    }

    pub fn remote_ttl(&self) -> Duration {
        Duration::from_millis(self.remote_ttl_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err("prefix must not be empty".into());
        }
        if self.redis.url.is_empty() {
            return Err("redis.url must not be empty".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        Ok(())
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout and per-command deadline in
    /// milliseconds; 0 disables the per-command deadline
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

pub mod loader {
    use super::HybridCacheConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    use crate::error::{CacheError, CacheResult};

    /// Load configuration from `path` (if it exists) and the environment.
    pub fn load_config(path: Option<&str>) -> CacheResult<HybridCacheConfig> {
        let mut builder = Config::builder();
        if let Some(p) = path {
            let pathbuf = PathBuf::from(p);
            if pathbuf.exists() {
                builder = builder.add_source(File::from(pathbuf));
            }
        }
        // Environment variable overrides, e.g., HYBRID_CACHE__MAX_COST=1000
        builder = builder.add_source(
            Environment::with_prefix("HYBRID_CACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let merged: HybridCacheConfig = builder.build()?.try_deserialize()?;
        merged.validate().map_err(CacheError::Config)?;
        Ok(merged)
    }
}
