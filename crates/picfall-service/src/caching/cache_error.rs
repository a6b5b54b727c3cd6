use std::time::Duration;

use thiserror::Error;

/// An error that happens while resolving a resource or fetching API data.
///
/// This error enum is intended for persisting in caches, except for the
/// [`InternalError`](Self::InternalError) variant. All variants are cheap to
/// clone so that deduplicated callers can share a settled failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The input failed classification; terminal, no attempt is ever made.
    #[error("invalid resource reference")]
    InvalidReference,
    /// A single candidate URL failed to load (network error, 404, CORS block
    /// surfaced as a generic failure). Recoverable by advancing to the next
    /// candidate or retrying the sequence.
    #[error("load failed: {0}")]
    LoadFailure(String),
    /// An attempt exceeded its deadline. Treated like a [`LoadFailure`](Self::LoadFailure)
    /// for transition purposes.
    #[error("load timed out after {0:?}")]
    Timeout(Duration),
    /// All candidates and all retry rounds were exhausted; terminal.
    #[error("image resolution exhausted all candidates and retries")]
    ExhaustedRetries,
    /// An API fetch failed and no usable stale value was available.
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    /// An unexpected error in the resolution layer itself.
    ///
    /// This variant is not intended to be persisted in caches.
    #[error("internal error")]
    InternalError,
}

impl ResolveError {
    /// Returns `true` for errors that end a resolution for good.
    ///
    /// Everything else is transient and worth another candidate or another
    /// retry round.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidReference | Self::ExhaustedRetries)
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(error: reqwest::Error) -> Self {
        // Surface the innermost cause; reqwest wraps the interesting part
        // (connect errors, DNS failures) several layers deep.
        let mut cause: &dyn std::error::Error = &error;
        while let Some(source) = cause.source() {
            cause = source;
        }
        Self::LoadFailure(cause.to_string())
    }
}

/// The contents of a cache entry: either a value or the reason there is none.
pub type CacheContents<T = ()> = Result<T, ResolveError>;
