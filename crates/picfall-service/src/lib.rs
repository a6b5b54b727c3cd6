//! The stateful half of the resource resolution layer.
//!
//! This crate combines the pure URL handling from [`picfall_sources`] with
//! the runtime pieces a consumer needs:
//!
//! - [`caching`]: the TTL cache, the in-flight request deduplicator, and the
//!   [`CachedFetcher`] stale-while-revalidate read path for API data.
//! - [`resolver`]: the [`ImageResolver`] state machine that turns an
//!   unreliable image reference into a URL that actually rendered, with
//!   per-attempt timeouts and retry-with-backoff.
//! - [`avatar`]: deterministic fallback avatars for references that fail for
//!   good.
//! - [`config`] and [`logging`]: configuration loading and `tracing` setup.

pub mod avatar;
pub mod caching;
pub mod config;
pub mod logging;
pub mod resolver;
#[cfg(test)]
mod test;
mod utils;

pub use crate::caching::{CacheContents, CachedFetcher, ResolveError};
pub use crate::config::Config;
pub use crate::resolver::{
    HttpImageLoader, ImageLoad, ImageResolver, Resolution, ResolutionPhase, ResolutionState,
};

// The pure classification surface, re-exported for callers that pre-rewrite
// URLs outside the full resolver, such as batch preloading.
pub use picfall_sources::{
    build_candidates, classify, needs_proxy, proxy_rewrite, ResourceKind, ResourceReference,
};
