//! Types and implementations for dealing with unreliable image references.
//!
//! This crate is the pure, I/O-free half of the resolution layer: it
//! classifies raw resource URLs into [`ResourceReference`]s, validates Google
//! Drive file identifiers, rewrites cross-origin URLs onto the same-origin
//! image proxy, and produces the ordered candidate lists the resolver
//! attempts.

mod candidates;
mod drive;
mod proxy;
mod reference;

pub use candidates::build_candidates;
pub use drive::{DriveFileId, InvalidDriveId, MAX_ID_LEN, MIN_ID_LEN};
pub use proxy::{is_proxied, needs_proxy, proxy_rewrite, PROXY_ENDPOINT};
pub use reference::{classify, ResourceKind, ResourceReference};
