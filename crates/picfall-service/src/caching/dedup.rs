use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::utils::CallOnDrop;

use super::CacheContents;

type SharedRequest<T> = Shared<BoxFuture<'static, CacheContents<T>>>;

/// Coalesces concurrent requests for the same cache key.
///
/// At most one underlying operation is outstanding per key; every caller that
/// arrives while it is pending awaits the same shared future and observes the
/// same settled value. The registration is removed unconditionally when the
/// operation settles, success or failure.
pub struct InFlight<T> {
    pending: Arc<Mutex<HashMap<String, SharedRequest<T>>>>,
}

impl<T> std::fmt::Debug for InFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self
            .pending
            .try_lock()
            .map(|p| p.len())
            .unwrap_or_default();
        f.debug_struct("InFlight").field("pending", &pending).finish()
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Default::default(),
        }
    }

    /// Number of requests currently pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedRequest<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the pending request for `key`, creating it via `factory` if
    /// none exists.
    ///
    /// `factory` is only invoked when there is no pending request. The
    /// returned future is shared: it can be awaited by any number of callers.
    pub fn dedupe<F, Fut>(&self, key: &str, factory: F) -> SharedRequest<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheContents<T>> + Send + 'static,
    {
        let mut pending = self.lock();
        if let Some(shared) = pending.get(key) {
            tracing::trace!(key, "joining in-flight request");
            return shared.clone();
        }

        let request = factory();
        let unregister = {
            let pending = Arc::clone(&self.pending);
            let key = key.to_owned();
            CallOnDrop::new(move || {
                pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
            })
        };

        let shared = async move {
            let result = request.await;
            drop(unregister);
            result
        }
        .boxed()
        .shared();

        pending.insert(key.to_owned(), shared.clone());
        shared
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let inflight = Arc::new(InFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..16)
            .map(|_| {
                let calls = Arc::clone(&calls);
                inflight.dedupe("key", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(42)
                })
            })
            .collect();

        let results = futures::future::join_all(futures).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(42)));
    }

    #[tokio::test]
    async fn test_unregisters_on_failure() {
        let inflight = InFlight::<u32>::new();

        let result = inflight
            .dedupe("key", || async {
                Err(crate::caching::ResolveError::FetchFailed("boom".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(inflight.is_empty());

        // A later request runs fresh instead of observing the old failure.
        let result = inflight.dedupe("key", || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let inflight = InFlight::<u32>::new();
        let a = inflight.dedupe("a", || async { Ok(1) });
        let b = inflight.dedupe("b", || async { Ok(2) });
        assert_eq!(inflight.len(), 2);
        assert_eq!(a.await, Ok(1));
        assert_eq!(b.await, Ok(2));
    }
}
