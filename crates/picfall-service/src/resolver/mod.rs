//! # The resilient image resolver
//!
//! Image references in user data are unreliable: Google Drive share links
//! point at files that may be gone or private, direct URLs are routinely
//! blocked by CORS, and hosts simply hang. The resolver turns such a
//! reference into a URL that actually rendered, by driving load attempts
//! through the candidate list produced by [`picfall_sources::build_candidates`]
//! with a per-attempt timeout, and by retrying the full list with linear
//! backoff when every candidate fails.
//!
//! Outcomes are cached per original reference, successes and terminal
//! failures alike, so repeated requests for the same reference are instant
//! and do not re-trigger network activity until the entry expires.
//!
//! [`ImageResolver::resolve`] spawns a driving task and hands back a
//! [`Resolution`]: a watch-channel backed handle exposing the current
//! [`ResolutionState`] reactively. Dropping the handle stops the task; an
//! interrupted attempt's result is discarded.

mod backoff;
mod loader;
mod state;

pub use backoff::{with_backoff, BackoffPolicy};
pub use loader::{HttpImageLoader, ImageLoad};
pub use state::{ResolutionPhase, ResolutionState};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};

use picfall_sources::{build_candidates, classify, ResourceReference};

use crate::caching::{CacheContents, ResolveError};
use crate::config::{Config, OutcomeCacheConfig, ResolverConfig};

/// A resolution outcome stored in the in-memory cache.
#[derive(Debug, Clone)]
struct OutcomeItem {
    /// When to evict this item.
    deadline: Instant,
    /// The URL that rendered, or the terminal failure.
    outcome: CacheContents<String>,
}

type OutcomeCache = moka::future::Cache<String, OutcomeItem>;

/// A struct implementing [`moka::Expiry`] that uses the [`OutcomeItem`]
/// [`Instant`] as the explicit expiration time.
struct OutcomeExpiration;

/// Returns the duration between the `current_time` and `target_time` in the future.
/// In case the `target_time` is already elapsed, this will return `Some(ZERO)`.
fn saturating_duration_since(current_time: Instant, target_time: Instant) -> Option<Duration> {
    Some(
        target_time
            .checked_duration_since(current_time)
            .unwrap_or_default(),
    )
}

impl moka::Expiry<String, OutcomeItem> for OutcomeExpiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &OutcomeItem,
        current_time: Instant,
    ) -> Option<Duration> {
        saturating_duration_since(current_time, value.deadline)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &OutcomeItem,
        current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        saturating_duration_since(current_time, value.deadline)
    }
}

/// Resolves unreliable image references into displayable URLs.
///
/// Cheap to clone; clones share the outcome cache and the loader.
pub struct ImageResolver<L> {
    loader: Arc<L>,
    outcomes: OutcomeCache,
    config: ResolverConfig,
    ttls: OutcomeCacheConfig,
}

impl<L> Clone for ImageResolver<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            outcomes: self.outcomes.clone(),
            config: self.config,
            ttls: self.ttls,
        }
    }
}

impl<L> std::fmt::Debug for ImageResolver<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageResolver")
            .field("cached outcomes", &self.outcomes.entry_count())
            .field("config", &self.config)
            .finish()
    }
}

impl<L: ImageLoad> ImageResolver<L> {
    pub fn new(config: &Config, loader: L) -> Self {
        let ttls = config.caches.resolutions;
        let outcomes = OutcomeCache::builder()
            .max_capacity(ttls.capacity)
            .name("resolution-outcomes")
            .expire_after(OutcomeExpiration)
            .build();

        Self {
            loader: Arc::new(loader),
            outcomes,
            config: config.resolver,
            ttls,
        }
    }

    /// Starts resolving `reference` and returns a handle to observe it.
    ///
    /// Must be called inside a tokio runtime; the resolution is driven by a
    /// spawned task that exits when the handle is dropped.
    pub fn resolve(&self, reference: Option<&str>) -> Resolution {
        let reference = classify(reference);
        let (state_tx, state_rx) = watch::channel(ResolutionState::idle());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            resolver: self.clone(),
            reference,
        };
        tokio::spawn(async move {
            tokio::select! {
                _ = state_tx.closed() => {}
                _ = driver.run(&state_tx, cmd_rx) => {}
            }
        });

        Resolution { state_rx, cmd_tx }
    }

    /// Drops a cached outcome, forcing the next resolution to re-attempt.
    pub async fn invalidate(&self, reference: &str) {
        self.outcomes.invalidate(reference).await;
    }

    async fn record(&self, key: &str, outcome: CacheContents<String>) {
        let ttl = match &outcome {
            Ok(_) => self.ttls.success_ttl,
            Err(_) => self.ttls.error_ttl,
        };
        let item = OutcomeItem {
            deadline: Instant::now() + ttl,
            outcome,
        };
        self.outcomes.insert(key.to_owned(), item).await;
    }
}

/// The task driving a single [`Resolution`].
struct Driver<L> {
    resolver: ImageResolver<L>,
    reference: ResourceReference,
}

impl<L: ImageLoad> Driver<L> {
    async fn run(
        &self,
        state_tx: &watch::Sender<ResolutionState>,
        mut cmd_rx: mpsc::UnboundedReceiver<()>,
    ) {
        loop {
            let settled = tokio::select! {
                _ = self.resolve_once(state_tx) => true,
                // A manual retry during an active resolution drops the
                // pending attempt and restarts from the first candidate.
                cmd = cmd_rx.recv() => match cmd {
                    Some(()) => false,
                    None => return,
                },
            };

            // Terminal; only a manual retry starts another round.
            if settled && cmd_rx.recv().await.is_none() {
                return;
            }

            // Manual retries bypass the cached outcome.
            if let Some(key) = self.reference.original_url() {
                self.resolver.outcomes.invalidate(key).await;
            }
        }
    }

    /// Drives the reference to a terminal state once.
    async fn resolve_once(&self, state_tx: &watch::Sender<ResolutionState>) {
        let Some(key) = self.reference.original_url() else {
            state_tx.send_replace(ResolutionState::failed(ResolveError::InvalidReference));
            return;
        };

        let candidates = build_candidates(&self.reference);
        if candidates.is_empty() {
            tracing::debug!(reference = key, "reference cannot be resolved");
            state_tx.send_replace(ResolutionState::failed(ResolveError::InvalidReference));
            return;
        }

        if let Some(item) = self.resolver.outcomes.get(key).await {
            match item.outcome {
                Ok(url) => {
                    tracing::trace!(reference = key, "resolution cache hit");
                    state_tx.send_replace(ResolutionState::loaded(url));
                }
                Err(error) => {
                    tracing::trace!(reference = key, %error, "cached failed resolution");
                    state_tx.send_replace(ResolutionState::failed(error));
                }
            }
            return;
        }

        let policy = BackoffPolicy::from(&self.resolver.config);
        let outcome = with_backoff(
            &policy,
            |retry, delay| {
                tracing::debug!(reference = key, retry, ?delay, "all candidates failed, backing off");
                state_tx.send_replace(ResolutionState::retrying(retry));
            },
            |retry| self.try_candidates(state_tx, &candidates, retry),
        )
        .await;

        match outcome {
            Ok(url) => {
                self.resolver.record(key, Ok(url.clone())).await;
                state_tx.send_replace(ResolutionState::loaded(url));
            }
            Err(error) => {
                tracing::debug!(reference = key, %error, "resolution exhausted its retries");
                self.resolver
                    .record(key, Err(ResolveError::ExhaustedRetries))
                    .await;
                state_tx.send_replace(ResolutionState::failed(ResolveError::ExhaustedRetries));
            }
        }
    }

    /// One full pass over the candidate list.
    ///
    /// Returns the first candidate that rendered, or the last failure. A hung
    /// load is cut off by the per-attempt timeout and counts as a failure.
    async fn try_candidates(
        &self,
        state_tx: &watch::Sender<ResolutionState>,
        candidates: &[String],
        retry_count: u32,
    ) -> CacheContents<String> {
        let load_timeout = self.resolver.config.load_timeout;
        let mut last_error = ResolveError::LoadFailure("no candidates attempted".into());

        for (attempt_index, url) in candidates.iter().enumerate() {
            state_tx.send_replace(ResolutionState::loading(attempt_index, retry_count));

            let attempt = self.resolver.loader.load(url);
            let result = match tokio::time::timeout(load_timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(ResolveError::Timeout(load_timeout)),
            };

            match result {
                Ok(()) => return Ok(url.clone()),
                Err(error) => {
                    tracing::trace!(url = url.as_str(), attempt_index, %error, "candidate failed");
                    last_error = error;
                }
            }
        }

        Err(last_error)
    }
}

/// Handle to an in-progress resolution.
///
/// Dropping the handle stops the driving task, discarding the result of any
/// in-flight attempt.
#[derive(Debug)]
pub struct Resolution {
    state_rx: watch::Receiver<ResolutionState>,
    cmd_tx: mpsc::UnboundedSender<()>,
}

impl Resolution {
    /// The latest published state.
    pub fn state(&self) -> ResolutionState {
        self.state_rx.borrow().clone()
    }

    pub fn phase(&self) -> ResolutionPhase {
        self.state_rx.borrow().phase
    }

    /// The URL that rendered, once the resolution is `Loaded`.
    pub fn resolved_url(&self) -> Option<String> {
        self.state_rx.borrow().resolved_url.clone()
    }

    /// Waits for the next state change.
    ///
    /// Returns `false` once the driver is gone and no further changes can
    /// happen.
    pub async fn changed(&mut self) -> bool {
        self.state_rx.changed().await.is_ok()
    }

    /// Restarts the resolution from the first candidate with a zeroed retry
    /// budget, regardless of the current phase. A cached outcome for the
    /// reference is dropped first.
    pub fn retry(&self) {
        // The driver only goes away together with this handle.
        let _ = self.cmd_tx.send(());
    }

    /// Waits until the resolution reaches `Loaded` or `Failed` and returns
    /// that state.
    pub async fn settled(&mut self) -> ResolutionState {
        loop {
            let state = self.state();
            if state.phase.is_terminal() {
                return state;
            }
            if !self.changed().await {
                return self.state();
            }
        }
    }
}
