use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::config::TtlCacheConfig;
use crate::utils::CallOnDrop;

use super::memory::{spawn_sweeper, TtlCache};
use super::{CacheContents, InFlight};

/// The cached read path for API data.
///
/// Composes the TTL cache and the in-flight deduplicator into a
/// stale-while-revalidate orchestrator:
///
/// 1. A fresh cache entry is returned immediately, no network call.
/// 2. A stale value is handed back right away while a deduplicated refresh
///    runs in the background. Only data is served stale; an expired failure
///    counts as a miss.
/// 3. A miss goes through the deduplicator, so concurrent callers for the
///    same key share one fetch. The fetch is delayed briefly to coalesce
///    near-simultaneous callers.
///
/// Failures degrade gracefully: a failed refresh never overwrites good stale
/// data and is only surfaced to callers when no stale value exists.
///
/// Must be created inside a tokio runtime; construction spawns the
/// background expiry sweeper.
#[derive(Debug)]
pub struct CachedFetcher<T> {
    cache: Arc<TtlCache<T>>,
    inflight: InFlight<T>,
    /// Keys with a background refresh currently running.
    refreshes: Arc<Mutex<HashSet<String>>>,
    coalesce_delay: Duration,
    sweeper: tokio::task::JoinHandle<()>,
}

impl<T> Drop for CachedFetcher<T> {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

impl<T> CachedFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: &TtlCacheConfig) -> Self {
        let cache = Arc::new(TtlCache::new(config));
        let sweeper = spawn_sweeper(&cache, config.sweep_interval);

        Self {
            cache,
            inflight: InFlight::new(),
            refreshes: Default::default(),
            coalesce_delay: config.coalesce_delay,
            sweeper,
        }
    }

    /// Returns the value for `key`, fetching it via `fetcher` if necessary.
    ///
    /// The fetcher is an injected async operation; transport details
    /// (headers, auth, base URL) are the caller's responsibility.
    pub async fn fetch_cached<F, Fut>(&self, key: &str, fetcher: F) -> CacheContents<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CacheContents<T>> + Send + 'static,
    {
        match self.cache.get_any(key) {
            Some((contents, true)) => {
                tracing::trace!(key, "cache hit");
                return contents;
            }
            Some((Ok(value), false)) => {
                tracing::trace!(key, "serving stale value while revalidating");
                self.spawn_refresh(key, fetcher);
                return Ok(value);
            }
            // A stale error is not worth serving; treat it like a miss so a
            // recovered backend is observed right away.
            Some((Err(_), false)) | None => {}
        }

        let coalesce_delay = self.coalesce_delay;
        let request = self.inflight.dedupe(key, move || async move {
            if !coalesce_delay.is_zero() {
                tokio::time::sleep(coalesce_delay).await;
            }
            fetcher().await
        });

        let result = request.await;
        match &result {
            Ok(_) => self.cache.insert(key, result.clone()),
            Err(error) => {
                tracing::debug!(key, %error, "fetch failed with no stale value to serve");
                self.cache.insert_error_if_no_data(key, result.clone());
            }
        }
        result
    }

    /// Removes a single cached value, or everything when `key` is `None`.
    pub fn invalidate(&self, key: Option<&str>) {
        self.cache.invalidate(key);
    }

    /// Direct access to the underlying cache.
    pub fn cache(&self) -> &TtlCache<T> {
        &self.cache
    }

    /// Kicks off a deduplicated background refresh for a stale key.
    ///
    /// On failure the stale value is retained and the error is only logged.
    fn spawn_refresh<F, Fut>(&self, key: &str, fetcher: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CacheContents<T>> + Send + 'static,
    {
        let mut refreshes = self.lock_refreshes();
        if refreshes.contains(key) {
            return;
        }
        refreshes.insert(key.to_owned());
        drop(refreshes);

        let done_token = {
            let key = key.to_owned();
            let refreshes = Arc::clone(&self.refreshes);
            CallOnDrop::new(move || {
                refreshes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
            })
        };

        tracing::trace!(key, "spawning deduplicated cache refresh");

        let cache = Arc::clone(&self.cache);
        let key = key.to_owned();
        tokio::spawn(async move {
            let _done_token = done_token;

            match fetcher().await {
                Ok(value) => cache.insert(&key, Ok(value)),
                Err(error) => {
                    tracing::warn!(key, %error, "background refresh failed; keeping stale value");
                }
            }
        });
    }

    fn lock_refreshes(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
