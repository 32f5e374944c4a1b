//! In-process implementation of the remote tier.
//!
//! Mirrors the Redis commands the cache relies on (TTL'd SET, GET, DEL,
//! pipelined DEL, cursor SCAN with glob MATCH) so the tiering logic can be
//! exercised without a server. It also works as a stand-in for a shared
//! store in single-process deployments.
//!
//! Patterns use glob syntax: `*`, `?`, `[abc]`, `[!abc]` and `\` escapes.

use async_trait::async_trait;
use dashmap::DashMap;
use globset::{GlobBuilder, GlobMatcher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{CacheError, CacheResult};
use crate::remote::{RemoteStore, SCAN_START, ScanPage};

#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// DashMap-backed remote store with per-key expiration.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    entries: DashMap<String, StoredValue>,
    commands: AtomicU64,
    scans: AtomicU64,
    fail_scan_at: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands received so far (pipelines count once).
    pub fn command_count(&self) -> u64 {
        self.commands.load(Ordering::SeqCst)
    }

    /// Make the `n`-th scan call from now (1-based) fail.
    pub fn fail_scan_at(&self, n: u64) {
        let offset = self.scans.load(Ordering::SeqCst);
        self.fail_scan_at.store(offset + n, Ordering::SeqCst);
    }

    /// Simulate an outage: every command fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, op: &str) -> CacheResult<()> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Remote(format!("store unavailable ({op})")));
        }
        Ok(())
    }
}

fn compile_pattern(pattern: &str) -> CacheResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| CacheError::InvalidPattern(e.to_string()))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.begin("get")?;
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, value| value.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.begin("set")?;
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.begin("del")?;
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<()> {
        self.begin("pipeline")?;
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    /// Walks a sorted snapshot of the keyspace `count` slots at a time; the
    /// cursor is the offset of the next slot. Like Redis, a page may hold
    /// no matches while the cursor is still non-zero.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage> {
        self.begin("scan")?;
        let call = self.scans.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_scan_at.load(Ordering::SeqCst) {
            return Err(CacheError::Remote(format!("injected scan failure at call {call}")));
        }

        let matcher = compile_pattern(pattern)?;
        let now = Instant::now();
        let mut keyspace: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keyspace.sort_unstable();

        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(keyspace.len());
        let end = start.saturating_add(count.max(1)).min(keyspace.len());

        let keys = keyspace[start..end]
            .iter()
            .filter(|key| matcher.is_match(key.as_str()))
            .filter(|key| {
                self.entries
                    .get(key.as_str())
                    .is_some_and(|entry| !entry.is_expired(now))
            })
            .cloned()
            .collect();

        let next = if end >= keyspace.len() {
            SCAN_START
        } else {
            end as u64
        };
        Ok(ScanPage { keys, cursor: next })
    }

    async fn ping(&self) -> CacheResult<()> {
        self.begin("ping")
    }
}
