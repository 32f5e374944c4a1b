//! Local (L1) tier: a bounded in-process store owned by one `HybridCache`.
//!
//! Backed by moka's async cache. Every entry costs 1, so `max_cost` is the
//! maximum number of entries. Writes are followed by `run_pending_tasks` so a
//! read issued right after a write observes it.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Default cost budget when none is configured.
pub const DEFAULT_MAX_COST: u64 = 100;

/// Ratio of frequency counters to cost budget for admission sketches.
pub const COUNTERS_PER_COST: u64 = 10;

/// Depth of per-thread admission buffers.
pub const DEFAULT_BUFFER_ITEMS: usize = 64;

/// Construction parameters for [`LocalStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStoreSettings {
    /// Maximum total cost (entries, since each costs 1)
    pub max_cost: u64,
    /// Frequency counter sizing hint
    pub num_counters: u64,
    /// Admission buffer depth
    pub buffer_items: usize,
    /// Time-to-live for every entry; zero disables expiration
    pub ttl: Duration,
}

impl LocalStoreSettings {
    /// Settings for the given cost budget and TTL; a zero budget falls back to
    /// [`DEFAULT_MAX_COST`].
    pub fn new(max_cost: u64, ttl: Duration) -> Self {
        let max_cost = if max_cost == 0 {
            DEFAULT_MAX_COST
        } else {
            max_cost
        };
        Self {
            max_cost,
            num_counters: max_cost.saturating_mul(COUNTERS_PER_COST),
            buffer_items: DEFAULT_BUFFER_ITEMS,
            ttl,
        }
    }
}

/// Bounded local store with typed byte values.
pub struct LocalStore {
    cache: Cache<String, Arc<Vec<u8>>>,
    settings: LocalStoreSettings,
}

impl LocalStore {
    /// Build a store from settings.
    ///
    /// moka sizes its frequency sketch and buffers from `max_capacity`, so
    /// `num_counters` and `buffer_items` are kept for reporting only.
    pub fn new(settings: LocalStoreSettings) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(settings.max_cost)
            .weigher(|_key: &String, _value: &Arc<Vec<u8>>| -> u32 { 1 });
        if !settings.ttl.is_zero() {
            builder = builder.time_to_live(settings.ttl);
        }

        tracing::debug!(
            max_cost = settings.max_cost,
            num_counters = settings.num_counters,
            ttl_ms = settings.ttl.as_millis() as u64,
            "local cache tier created"
        );

        Self {
            cache: builder.build(),
            settings,
        }
    }

    /// Insert a value and wait until it has passed through the admission
    /// buffers.
    pub async fn insert(&self, key: &str, value: Arc<Vec<u8>>) {
        self.cache.insert(key.to_string(), value).await;
        self.cache.run_pending_tasks().await;
    }

    /// Look up a value. Expired entries are never returned.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        self.cache.get(key).await
    }

    /// Remove a value. Missing keys are ignored.
    pub async fn remove(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn settings(&self) -> &LocalStoreSettings {
        &self.settings
    }

    /// Drop every entry and drain pending maintenance work.
    pub async fn close(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
