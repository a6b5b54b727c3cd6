//! # Caching infrastructure
//!
//! Caching is front and center in this layer: every API read and every image
//! resolution outcome goes through it, both to make repeated requests instant
//! and to stop concurrent consumers from issuing duplicate network calls.
//!
//! ## Layers
//!
//! - [`TtlCache`] is the process-wide key-value store with per-entry write
//!   timestamps. Reads perform a lazy expiry check; a background sweeper
//!   bounds memory; capacity overflow evicts the oldest-inserted entry.
//!   Expired entries remain readable through [`TtlCache::get_any`] so the
//!   orchestrator can serve them optimistically while a refresh runs.
//! - [`InFlight`] deduplicates concurrent requests per key: all callers that
//!   arrive while a fetch is pending share one future and one settled value.
//! - [`CachedFetcher`] composes the two into the stale-while-revalidate read
//!   path used by data consumers.
//!
//! The image resolver keeps its own outcome cache (a `moka` cache with
//! per-entry deadlines, see [`crate::resolver`]); the types here are shared
//! between both.
//!
//! ## [`ResolveError`]
//!
//! [`ResolveError`] is the central error type persisted into caches: cached
//! failures short-circuit repeated work just like cached successes do. The
//! [`InternalError`](ResolveError::InternalError) variant is the catch-all
//! for unexpected conditions and is never persisted.

mod cache_error;
mod dedup;
mod fetch;
mod memory;

pub use cache_error::{CacheContents, ResolveError};
pub use dedup::InFlight;
pub use fetch::CachedFetcher;
pub use memory::{spawn_sweeper, TtlCache};
