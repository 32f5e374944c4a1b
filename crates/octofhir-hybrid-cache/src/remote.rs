//! Remote (L2) tier abstraction.
//!
//! The remote store is shared with other subsystems and is never owned by a
//! `HybridCache`; implementations must be safe to call concurrently.

use async_trait::async_trait;
use futures_util::Stream;
use futures_util::stream;
use std::time::Duration;

use crate::error::CacheResult;

/// Cursor value that starts an enumeration and signals its end.
pub const SCAN_START: u64 = 0;

/// One page of a cursor-based key enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys matched on this page (may be empty even when more pages follow)
    pub keys: Vec<String>,
    /// Cursor for the next call; [`SCAN_START`] when enumeration is complete
    pub cursor: u64,
}

/// Shared key/value store used as the remote tier.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a value. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value. A zero `ttl` stores it without expiration.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete many keys with a single pipelined command.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<()>;

    /// Fetch one page of keys matching `pattern`, starting at `cursor`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<ScanPage>;

    /// Round-trip health check.
    async fn ping(&self) -> CacheResult<()>;
}

/// Lazily enumerate all keys matching `pattern`, one page per item.
///
/// The stream ends after the store hands back [`SCAN_START`] as the next
/// cursor, or right after the first error. Empty pages are yielded as-is.
pub fn scan_keys<'a>(
    store: &'a dyn RemoteStore,
    pattern: &'a str,
    page_size: usize,
) -> impl Stream<Item = CacheResult<Vec<String>>> + Send + 'a {
    stream::unfold(Some(SCAN_START), move |cursor| async move {
        let Some(cursor) = cursor else {
            return None;
        };
        match store.scan(cursor, pattern, page_size).await {
            Ok(page) => {
                let next = (page.cursor != SCAN_START).then_some(page.cursor);
                Some((Ok(page.keys), next))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use futures_util::StreamExt;
    use std::sync::Mutex;

    /// Serves a fixed list of pages in order.
    struct ScriptedStore {
        pages: Mutex<Vec<CacheResult<ScanPage>>>,
        cursors_seen: Mutex<Vec<u64>>,
    }

    impl ScriptedStore {
        fn new(pages: Vec<CacheResult<ScanPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                cursors_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for ScriptedStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> CacheResult<()> {
            Ok(())
        }

        async fn delete_many(&self, _keys: &[String]) -> CacheResult<()> {
            Ok(())
        }

        async fn scan(&self, cursor: u64, _pattern: &str, _count: usize) -> CacheResult<ScanPage> {
            self.cursors_seen.lock().unwrap().push(cursor);
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(CacheError::Remote("script exhausted".into())))
        }

        async fn ping(&self) -> CacheResult<()> {
            Ok(())
        }
    }

    fn page(keys: &[&str], cursor: u64) -> CacheResult<ScanPage> {
        Ok(ScanPage {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            cursor,
        })
    }

    #[tokio::test]
    async fn test_scan_follows_opaque_cursors_until_zero() {
        let store = ScriptedStore::new(vec![
            page(&["a"], 17),
            page(&[], 3),
            page(&["b", "c"], 0),
        ]);

        let pages: Vec<_> = scan_keys(&store, "*", 100).collect().await;
        let keys: Vec<String> = pages
            .into_iter()
            .flat_map(|p| p.expect("page ok"))
            .collect();

        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(*store.cursors_seen.lock().unwrap(), vec![0, 17, 3]);
    }

    #[tokio::test]
    async fn test_scan_stops_after_error() {
        let store = ScriptedStore::new(vec![
            page(&["a"], 5),
            Err(CacheError::Remote("boom".into())),
            page(&["never"], 0),
        ]);

        let pages: Vec<_> = scan_keys(&store, "*", 100).collect().await;
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        assert!(pages[1].is_err());
        assert_eq!(store.cursors_seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_single_empty_page() {
        let store = ScriptedStore::new(vec![page(&[], 0)]);
        let pages: Vec<_> = scan_keys(&store, "*", 100).collect().await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_ref().expect("page ok").is_empty());
    }
}
