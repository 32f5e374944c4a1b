//! Two-tier key/value cache for OctoFHIR services.
//!
//! ## Architecture
//!
//! - **L1 (moka)**: In-process, bounded, per-instance, short TTL
//! - **L2 (Redis)**: Network, shared across instances, longer TTL
//!
//! ```text
//! get(key) → L1 ──miss──→ L2 ──hit──→ promote to L1 → value
//!                           └──miss──→ None (never cached)
//! put(key) → L1 (flushed) → L2 (errors logged)
//! ```
//!
//! The remote store is passed in as a shared handle; the cache only owns
//! its local tier.

pub mod config;
pub mod error;
pub mod hybrid;
pub mod key;
pub mod local;
pub mod memory;
pub mod metrics;
pub mod observability;
pub mod redis_store;
pub mod remote;

pub use config::{HybridCacheConfig, RedisConfig};
pub use error::{CacheError, CacheResult};
pub use hybrid::{CacheStats, HybridCache, HybridCacheOptions, SCAN_PAGE_SIZE};
pub use key::derive_key;
pub use local::{LocalStore, LocalStoreSettings};
pub use memory::MemoryRemoteStore;
pub use redis_store::{RedisRemoteStore, create_redis_pool};
pub use remote::{RemoteStore, ScanPage, scan_keys};

use std::sync::Arc;

/// Build a Redis-backed hybrid cache from configuration.
///
/// Unlike a local-only fallback, an invalid configuration or pool setup is
/// an error: the cache cannot run without its remote tier. Reachability is
/// only logged here, so a cache created during a Redis outage still starts
/// and fails open until Redis comes back.
pub async fn create_hybrid_cache(config: &HybridCacheConfig) -> CacheResult<HybridCache> {
    config.validate().map_err(CacheError::Config)?;

    let store = RedisRemoteStore::from_config(&config.redis)?;
    match store.ping().await {
        Ok(()) => tracing::info!("✓ Connected to Redis successfully"),
        Err(e) => tracing::warn!(
            error = %e,
            "Redis not reachable yet; remote tier will fail open"
        ),
    }

    HybridCache::from_config(config, Arc::new(store))
}
