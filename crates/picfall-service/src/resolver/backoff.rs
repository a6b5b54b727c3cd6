use std::future::Future;
use std::time::Duration;

use crate::caching::CacheContents;
use crate::config::ResolverConfig;

/// A linear backoff schedule between retry rounds.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Base delay; retry round `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Retry rounds after the initial attempt.
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// The delay preceding the given retry round (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

impl From<&ResolverConfig> for BackoffPolicy {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            base_delay: config.retry_delay,
            max_retries: config.max_retries,
        }
    }
}

/// Runs a fallible task with linearly increasing delays between attempts.
///
/// The task is given the current retry round, 0 for the initial attempt.
/// Successes and terminal errors return immediately; other errors are retried
/// until the policy's budget is spent. `on_backoff` is invoked before every
/// delay with the upcoming round and its duration.
pub async fn with_backoff<G, F, T>(
    policy: &BackoffPolicy,
    mut on_backoff: impl FnMut(u32, Duration),
    mut task_gen: G,
) -> CacheContents<T>
where
    G: FnMut(u32) -> F,
    F: Future<Output = CacheContents<T>>,
{
    let mut retry = 0;
    loop {
        let result = task_gen(retry).await;

        let give_up = match &result {
            Ok(_) => true,
            Err(error) => error.is_terminal(),
        };
        if give_up || retry >= policy.max_retries {
            break result;
        }

        retry += 1;
        let delay = policy.delay_for(retry);
        on_backoff(retry, delay);
        tokio::time::sleep(delay).await;
    }
}
