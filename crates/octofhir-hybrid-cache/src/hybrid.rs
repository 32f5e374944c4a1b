//! Two-tier cache coordinator: local (moka) L1 in front of a shared L2.
//!
//! ## Tiering policy
//!
//! | Operation            | L1 (local)          | L2 (remote)                   |
//! |----------------------|---------------------|-------------------------------|
//! | `put`                | write + flush first | write, errors logged only     |
//! | `get`                | read first          | read on L1 miss, hit promoted |
//! | `delete`             | remove              | remove, errors logged only    |
//! | `delete_many`        | -                   | one pipelined DEL             |
//! | `delete_by_pattern`  | -                   | SCAN all pages, one pipeline  |
//!
//! L1 only ever holds values written through this cache or just read from
//! L2, and it is left to expire on its own after bulk invalidation.

use futures_util::TryStreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HybridCacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::key;
use crate::local::{LocalStore, LocalStoreSettings};
use crate::metrics::{self, TIER_LOCAL, TIER_REMOTE};
use crate::remote::{RemoteStore, scan_keys};

/// Keys requested per SCAN round trip.
pub const SCAN_PAGE_SIZE: usize = 100;

/// Construction parameters for [`HybridCache`].
#[derive(Clone)]
pub struct HybridCacheOptions {
    /// Prefix for derived keys
    pub prefix: String,
    /// Lifetime of every local entry; zero disables expiration
    pub local_ttl: Duration,
    /// Default lifetime of remote entries; zero disables expiration
    pub remote_ttl: Duration,
    /// Local cost budget; `None` or `Some(0)` means [`crate::local::DEFAULT_MAX_COST`]
    pub max_cost: Option<u64>,
    /// Shared remote store. The cache keeps a handle but does not own it.
    pub remote: Arc<dyn RemoteStore>,
}

impl HybridCacheOptions {
    pub fn new(prefix: impl Into<String>, remote: Arc<dyn RemoteStore>) -> Self {
        let defaults = HybridCacheConfig::default();
        Self {
            prefix: prefix.into(),
            local_ttl: defaults.local_ttl(),
            remote_ttl: defaults.remote_ttl(),
            max_cost: None,
            remote,
        }
    }

    pub fn local_ttl(mut self, ttl: Duration) -> Self {
        self.local_ttl = ttl;
        self
    }

    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.remote_ttl = ttl;
        self
    }

    pub fn max_cost(mut self, max_cost: u64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }
}

/// Cache statistics (L1 only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub l1_entries: u64,
    pub l1_max_cost: u64,
}

/// Read/write cache over a local bounded tier and a shared remote tier.
///
/// Safe to share between tasks (wrap in `Arc`); it starts no background work
/// of its own.
pub struct HybridCache {
    prefix: String,
    local: LocalStore,
    remote: Arc<dyn RemoteStore>,
    local_ttl: Duration,
    remote_ttl: Duration,
}

impl fmt::Debug for HybridCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridCache")
            .field("prefix", &self.prefix)
            .field("local_ttl", &self.local_ttl)
            .field("remote_ttl", &self.remote_ttl)
            .field("local", self.local.settings())
            .finish_non_exhaustive()
    }
}

impl HybridCache {
    /// Create a cache with its own local tier in front of `options.remote`.
    pub fn new(options: HybridCacheOptions) -> CacheResult<Self> {
        if options.prefix.is_empty() {
            return Err(CacheError::Config("prefix must not be empty".into()));
        }
        if !options.local_ttl.is_zero()
            && !options.remote_ttl.is_zero()
            && options.local_ttl > options.remote_ttl
        {
            tracing::warn!(
                local_ttl_ms = options.local_ttl.as_millis() as u64,
                remote_ttl_ms = options.remote_ttl.as_millis() as u64,
                "local TTL exceeds remote TTL; L1 may serve values L2 already expired"
            );
        }

        let settings = LocalStoreSettings::new(options.max_cost.unwrap_or(0), options.local_ttl);
        let local = LocalStore::new(settings);

        tracing::info!(prefix = %options.prefix, "hybrid cache initialized");

        Ok(Self {
            prefix: options.prefix,
            local,
            remote: options.remote,
            local_ttl: options.local_ttl,
            remote_ttl: options.remote_ttl,
        })
    }

    /// Create a cache from loaded configuration; `config.redis` is ignored
    /// because the remote store is supplied by the caller.
    pub fn from_config(
        config: &HybridCacheConfig,
        remote: Arc<dyn RemoteStore>,
    ) -> CacheResult<Self> {
        config.validate().map_err(CacheError::Config)?;
        Self::new(HybridCacheOptions {
            prefix: config.prefix.clone(),
            local_ttl: config.local_ttl(),
            remote_ttl: config.remote_ttl(),
            max_cost: Some(config.max_cost),
            remote,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn local_ttl(&self) -> Duration {
        self.local_ttl
    }

    pub fn remote_ttl(&self) -> Duration {
        self.remote_ttl
    }

    /// Store a value in both tiers using the default remote TTL.
    ///
    /// Remote failures are logged and otherwise ignored; use [`Self::try_put`]
    /// to observe them.
    pub async fn put(&self, key: &str, value: Vec<u8>) {
        self.put_with_expiration(key, value, self.remote_ttl).await;
    }

    /// Store a value in both tiers, expiring from L2 after `ttl`.
    ///
    /// The local entry always uses the configured local TTL.
    pub async fn put_with_expiration(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        if let Err(e) = self.try_put_with_expiration(key, value, ttl).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Like [`Self::put`], but returns the remote error.
    pub async fn try_put(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        self.try_put_with_expiration(key, value, self.remote_ttl).await
    }

    /// Like [`Self::put_with_expiration`], but returns the remote error.
    ///
    /// The local write has already happened when the remote write fails.
    pub async fn try_put_with_expiration(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> CacheResult<()> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        let value = Arc::new(value);
        self.local.insert(key, Arc::clone(&value)).await;
        self.put_remote(key, &value, ttl).await?;
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set (L1+L2)");
        Ok(())
    }

    /// Store a value in L1 only, waiting until it is readable.
    pub async fn put_local(&self, key: &str, value: Vec<u8>) {
        self.local.insert(key, Arc::new(value)).await;
    }

    /// Store a value in L2 only.
    pub async fn put_remote(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.remote
            .set(key, value, ttl)
            .await
            .inspect_err(|_| metrics::record_remote_error("set"))
    }

    /// Look up a value: L1, then L2. An L2 hit is copied into L1 before it
    /// is returned.
    ///
    /// `None` means "not cached" or "L2 unreachable"; L2 errors are logged
    /// and treated as a miss. Misses are never cached.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(value) = self.get_from_local(key).await {
            tracing::debug!(key = %key, "cache hit (L1)");
            metrics::record_cache_hit(TIER_LOCAL);
            return Some(value);
        }

        match self.get_from_remote(key).await {
            Ok(Some(data)) => {
                tracing::debug!(key = %key, "cache hit (L2), promoting to L1");
                metrics::record_cache_hit(TIER_REMOTE);
                metrics::record_promotion();

                let value = Arc::new(data);
                self.local.insert(key, Arc::clone(&value)).await;
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_cache_miss();
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "remote cache GET error");
                metrics::record_cache_miss();
                None
            }
        }
    }

    /// Look up a value in L1 only.
    pub async fn get_from_local(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.local.get(key).await
    }

    /// Look up a value in L2 only, without promotion.
    pub async fn get_from_remote(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.remote
            .get(key)
            .await
            .inspect_err(|_| metrics::record_remote_error("get"))
    }

    /// Remove a key from both tiers. Missing keys are fine; L2 errors are
    /// logged only.
    pub async fn delete(&self, key: &str) {
        self.delete_local(key).await;
        if let Err(e) = self.delete_remote(key).await {
            tracing::warn!(key = %key, error = %e, "remote cache DEL error");
        } else {
            tracing::debug!(key = %key, "cache invalidated (L1+L2)");
        }
    }

    /// Remove a key from L1 only.
    pub async fn delete_local(&self, key: &str) {
        self.local.remove(key).await;
    }

    /// Remove a key from L2 only.
    pub async fn delete_remote(&self, key: &str) -> CacheResult<()> {
        self.remote
            .delete(key)
            .await
            .inspect_err(|_| metrics::record_remote_error("del"))
    }

    /// Remove a batch of keys from L2 with one pipelined command.
    ///
    /// An empty batch returns immediately without contacting L2. L1 copies
    /// are left to expire.
    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.remote
            .delete_many(keys)
            .await
            .inspect_err(|_| metrics::record_remote_error("del_many"))?;
        tracing::debug!(count = keys.len(), "cache batch invalidated (L2)");
        Ok(())
    }

    /// Remove every L2 key matching a glob `pattern`.
    ///
    /// All pages are enumerated before anything is deleted, so a failed page
    /// leaves L2 untouched. Matches are then removed with one pipeline; no
    /// matches means no delete command. L1 copies are left to expire.
    pub async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<()> {
        let keys: Vec<String> = scan_keys(self.remote.as_ref(), pattern, SCAN_PAGE_SIZE)
            .try_concat()
            .await
            .inspect_err(|_| metrics::record_remote_error("scan"))?;

        if keys.is_empty() {
            tracing::debug!(pattern = %pattern, "no keys matched pattern");
            return Ok(());
        }

        self.remote
            .delete_many(&keys)
            .await
            .inspect_err(|_| metrics::record_remote_error("del_many"))?;
        tracing::debug!(pattern = %pattern, count = keys.len(), "cache invalidated by pattern (L2)");
        Ok(())
    }

    /// Derive `<prefix>:<sha256 hex>` from arbitrary data.
    #[must_use]
    pub fn derive_key(&self, data: impl AsRef<[u8]>) -> String {
        key::derive_key(&self.prefix, data)
    }

    /// Get cache statistics and refresh the L1 entries gauge.
    pub fn stats(&self) -> CacheStats {
        let l1_entries = self.local.entry_count();
        metrics::set_cache_entries(TIER_LOCAL, l1_entries);
        CacheStats {
            l1_entries,
            l1_max_cost: self.local.settings().max_cost,
        }
    }

    /// Check if L2 answers a PING (for health checks).
    pub async fn is_remote_available(&self) -> bool {
        self.remote.ping().await.is_ok()
    }

    /// Release the local tier. The remote store is shared and left open.
    pub async fn close(self) {
        self.local.close().await;
        tracing::debug!(prefix = %self.prefix, "hybrid cache closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemoteStore;

    fn cache_with(remote: Arc<MemoryRemoteStore>) -> HybridCache {
        HybridCache::new(
            HybridCacheOptions::new("test", remote)
                .local_ttl(Duration::from_secs(60))
                .remote_ttl(Duration::from_secs(120)),
        )
        .expect("create cache")
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let err = HybridCache::new(HybridCacheOptions::new("", remote)).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_default_max_cost() {
        let cache = cache_with(Arc::new(MemoryRemoteStore::new()));
        assert_eq!(cache.stats().l1_max_cost, crate::local::DEFAULT_MAX_COST);
    }

    #[tokio::test]
    async fn test_put_writes_both_tiers() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());

        cache.put("testKey", b"testValue".to_vec()).await;

        assert_eq!(
            cache.get_from_local("testKey").await,
            Some(Arc::new(b"testValue".to_vec()))
        );
        assert_eq!(
            remote.get("testKey").await.unwrap(),
            Some(b"testValue".to_vec())
        );
    }

    #[tokio::test]
    async fn test_put_swallows_remote_failure() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        remote.set_unavailable(true);

        cache.put("k", b"v".to_vec()).await;
        // Local write still happened
        assert!(cache.get_from_local("k").await.is_some());

        let err = cache.try_put("k2", b"v".to_vec()).await.unwrap_err();
        assert!(matches!(err, CacheError::Remote(_)));
        assert!(cache.get_from_local("k2").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_key_is_not_written() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());

        assert!(matches!(
            cache.try_put("", b"v".to_vec()).await,
            Err(CacheError::EmptyKey)
        ));
        cache.put("", b"v".to_vec()).await;
        assert_eq!(remote.command_count(), 0);
    }

    #[tokio::test]
    async fn test_get_treats_remote_error_as_miss() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        remote.set("k", b"v", Duration::ZERO).await.unwrap();
        remote.set_unavailable(true);

        assert!(cache.get("k").await.is_none());
        assert!(cache.get_from_remote("k").await.is_err());
        // Nothing was promoted
        assert!(cache.get_from_local("k").await.is_none());
    }

    #[tokio::test]
    async fn test_get_from_remote_does_not_promote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        remote.set("k", b"v", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get_from_remote("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(cache.get_from_local("k").await.is_none());
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());

        assert!(cache.get("late").await.is_none());
        remote.set("late", b"v", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("late").await, Some(Arc::new(b"v".to_vec())));
    }

    #[tokio::test]
    async fn test_delete_degrades_when_remote_down() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        cache.put("k", b"v".to_vec()).await;

        remote.set_unavailable(true);
        cache.delete("k").await;
        assert!(cache.get_from_local("k").await.is_none());

        remote.set_unavailable(false);
        assert!(cache.get_from_remote("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_pattern_leaves_local_copies() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        cache.put("p:1", b"v".to_vec()).await;

        cache.delete_by_pattern("p:*").await.unwrap();

        assert!(cache.get_from_remote("p:1").await.unwrap().is_none());
        assert!(cache.get_from_local("p:1").await.is_some());
    }

    #[tokio::test]
    async fn test_close_releases_local_only() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        cache.put("k", b"v".to_vec()).await;

        cache.close().await;

        assert!(remote.ping().await.is_ok());
        assert_eq!(remote.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_remote_availability() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = cache_with(remote.clone());
        assert!(cache.is_remote_available().await);
        remote.set_unavailable(true);
        assert!(!cache.is_remote_available().await);
    }
}
