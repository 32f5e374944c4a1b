//! Error types for the hybrid cache.

use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur while talking to a cache tier.
///
/// A missing key is never an error: lookups return `None` instead.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Could not check out a pooled Redis connection
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// Could not build the Redis connection pool
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    /// Remote operation exceeded its deadline
    #[error("Remote operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    Config(String),

    /// Writes require a non-empty key
    #[error("Cache key must not be empty")]
    EmptyKey,

    /// Key pattern could not be compiled
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(String),

    /// Injected or otherwise unclassified remote failure
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::Config(err.to_string())
    }
}
