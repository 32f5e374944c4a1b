//! Cache metrics recorded through the `metrics` facade.
//!
//! Nothing is exported from here; the embedding service installs whichever
//! recorder it uses (e.g. Prometheus) and these calls feed it.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_PROMOTIONS_TOTAL: &str = "cache_promotions_total";
    pub const CACHE_REMOTE_ERRORS_TOTAL: &str = "cache_remote_errors_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
}

/// Tier labels
pub const TIER_LOCAL: &str = "L1";
pub const TIER_REMOTE: &str = "L2";

/// Record a cache hit on `tier`.
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a miss on both tiers.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a remote value copied into the local tier.
pub fn record_promotion() {
    counter!(names::CACHE_PROMOTIONS_TOTAL).increment(1);
}

/// Record a failed remote command.
pub fn record_remote_error(op: &'static str) {
    counter!(names::CACHE_REMOTE_ERRORS_TOTAL, "op" => op).increment(1);
}

/// Set the number of entries held by `tier`.
pub fn set_cache_entries(tier: &'static str, count: u64) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier).set(count as f64);
}
