use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

// The tokio clock (rather than `std::time::Instant`) keeps expiry in step
// with `tokio::time` timers, including the paused clock used in tests.
use tokio::time::Instant;

use crate::config::TtlCacheConfig;

use super::CacheContents;

/// A value stored in the cache together with its write time.
#[derive(Debug, Clone)]
struct Slot<T> {
    contents: CacheContents<T>,
    inserted_at: Instant,
}

impl<T> Slot<T> {
    /// Whether this slot is past its time-to-live.
    fn is_expired(&self, now: Instant, ttl: Duration, error_ttl: Duration) -> bool {
        let ttl = match self.contents {
            Ok(_) => ttl,
            Err(_) => error_ttl,
        };
        now.duration_since(self.inserted_at) > ttl
    }
}

#[derive(Debug, Default)]
struct Inner<T> {
    entries: HashMap<String, Slot<T>>,
    /// Keys in insertion order, for capacity eviction. Overwriting an
    /// existing key keeps its original position.
    order: VecDeque<String>,
}

/// A process-wide TTL key-value cache.
///
/// Reads perform a lazy expiry check; a background sweeper (see
/// [`spawn_sweeper`]) additionally removes expired entries on an interval to
/// bound memory. Expired entries are invisible to [`get`](Self::get) but can
/// still be served optimistically through [`get_any`](Self::get_any) while a
/// refresh is in flight.
///
/// Capacity overflow evicts the oldest-inserted entry. This is a simplicity
/// trade-off inherited from the original, not a correctness requirement.
#[derive(Debug)]
pub struct TtlCache<T> {
    inner: Mutex<Inner<T>>,
    ttl: Duration,
    error_ttl: Duration,
    capacity: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(config: &TtlCacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl: config.ttl,
            error_ttl: config.error_ttl,
            // A zero capacity would turn every insert into a no-op.
            capacity: config.capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the fresh contents for `key`, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<CacheContents<T>> {
        self.get_any(key)
            .and_then(|(contents, fresh)| fresh.then_some(contents))
    }

    /// Returns the contents for `key` even when expired.
    ///
    /// The boolean is `true` for fresh entries. Stale entries are the basis
    /// of the stale-while-revalidate read path.
    pub fn get_any(&self, key: &str) -> Option<(CacheContents<T>, bool)> {
        let now = Instant::now();
        let inner = self.lock();
        let slot = inner.entries.get(key)?;
        let fresh = !slot.is_expired(now, self.ttl, self.error_ttl);
        Some((slot.contents.clone(), fresh))
    }

    /// Returns `true` if a fresh entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Writes `contents` under `key`, last write wins.
    pub fn insert(&self, key: &str, contents: CacheContents<T>) {
        let mut inner = self.lock();
        let slot = Slot {
            contents,
            inserted_at: Instant::now(),
        };

        if inner.entries.insert(key.to_owned(), slot).is_none() {
            inner.order.push_back(key.to_owned());
            while inner.entries.len() > self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
                tracing::trace!(key = oldest, "evicted oldest cache entry");
            }
        }
    }

    /// Writes an error under `key` unless the existing entry holds data.
    ///
    /// Failures never clobber previously good values, but they do refresh an
    /// older cached failure so its time-to-live starts over.
    pub fn insert_error_if_no_data(&self, key: &str, contents: CacheContents<T>) {
        {
            let inner = self.lock();
            if inner
                .entries
                .get(key)
                .is_some_and(|slot| slot.contents.is_ok())
            {
                return;
            }
        }
        self.insert(key, contents);
    }

    /// Removes a single entry, or everything when `key` is `None`.
    pub fn invalidate(&self, key: Option<&str>) {
        let mut inner = self.lock();
        match key {
            Some(key) => {
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
            }
            None => {
                inner.entries.clear();
                inner.order.clear();
            }
        }
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, slot| !slot.is_expired(now, self.ttl, self.error_ttl));
        let removed = before - inner.entries.len();
        let entries = &inner.entries;
        inner.order.retain(|k| entries.contains_key(k));
        removed
    }

    /// Number of entries currently stored, including expired ones.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Spawns the periodic expiry sweep for a cache.
///
/// The task holds only a weak reference and exits once the cache is dropped,
/// so isolated test instances do not leak sweepers.
pub fn spawn_sweeper<T: Clone + Send + 'static>(
    cache: &Arc<TtlCache<T>>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = weak.upgrade() else {
                break;
            };
            let removed = cache.sweep();
            if removed > 0 {
                tracing::debug!(removed, "cache sweep removed expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(ttl: Duration, capacity: usize) -> TtlCacheConfig {
        TtlCacheConfig {
            ttl,
            error_ttl: ttl,
            capacity,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_ttl() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert("k", Ok(1u32));

        assert_eq!(cache.get("k"), Some(Ok(1)));

        tokio::time::advance(Duration::from_secs(61)).await;

        // Expired entries are invisible to `get`, but `get_any` still serves
        // them marked as stale.
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.get_any("k"), Some((Ok(1), false)));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert("k", Ok(1u32));
        cache.insert("k", Ok(2u32));
        assert_eq!(cache.get("k"), Some(Ok(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 3));
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            cache.insert(key, Ok(i));
        }
        // Overwriting does not refresh the insertion position.
        cache.insert("a", Ok(10));
        cache.insert("d", Ok(3));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(Ok(1)));
        assert_eq!(cache.get("d"), Some(Ok(3)));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_error_never_clobbers_data() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert("k", Ok(1u32));
        cache.insert_error_if_no_data("k", Err(crate::caching::ResolveError::InternalError));
        assert_eq!(cache.get("k"), Some(Ok(1)));

        cache.insert_error_if_no_data(
            "missing",
            Err(crate::caching::ResolveError::FetchFailed("boom".into())),
        );
        assert!(matches!(cache.get("missing"), Some(Err(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_refreshes_older_error() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert(
            "k",
            Err::<u32, _>(crate::caching::ResolveError::FetchFailed("first".into())),
        );

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("k"), None);

        // A newer failure replaces the expired one and is fresh again.
        cache.insert_error_if_no_data(
            "k",
            Err(crate::caching::ResolveError::FetchFailed("second".into())),
        );
        assert_eq!(
            cache.get("k"),
            Some(Err(crate::caching::ResolveError::FetchFailed(
                "second".into()
            )))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_expired() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert("old", Ok(1u32));
        tokio::time::advance(Duration::from_secs(61)).await;
        cache.insert("new", Ok(2u32));

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_any("old"), None);
        assert_eq!(cache.get("new"), Some(Ok(2)));
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(&config(Duration::from_secs(60), 100));
        cache.insert("a", Ok(1u32));
        cache.insert("b", Ok(2u32));

        cache.invalidate(Some("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(Ok(2)));

        cache.invalidate(None);
        assert!(cache.is_empty());
    }
}
