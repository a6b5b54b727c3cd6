//! Validation and extraction of Google Drive file identifiers.
//!
//! Drive embeds the same opaque file identifier in several URL shapes. This
//! module knows how to pull the identifier out of all of them and how to
//! reject identifiers that can never resolve, so that callers do not waste a
//! full retry cycle on a placeholder.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// The minimum length of a real Drive file identifier.
pub const MIN_ID_LEN: usize = 20;
/// The maximum length of a real Drive file identifier.
pub const MAX_ID_LEN: usize = 50;

/// Deny-listed words that only ever show up in synthetic identifiers.
const PLACEHOLDER_WORDS: &[&str] = &["test", "fake", "example", "dummy", "placeholder"];

/// The reason a candidate Drive file identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidDriveId {
    /// The identifier is shorter than [`MIN_ID_LEN`] or longer than [`MAX_ID_LEN`].
    #[error("drive file id has an implausible length")]
    BadLength,
    /// The identifier contains characters outside of `[A-Za-z0-9_-]`.
    #[error("drive file id contains invalid characters")]
    BadCharacter,
    /// The identifier matches a known placeholder pattern.
    #[error("drive file id is a synthetic placeholder")]
    Placeholder,
}

/// A validated Google Drive file identifier.
///
/// Construction via [`DriveFileId::parse`] guarantees that the identifier has
/// a plausible shape: correct length, correct character set, and no
/// placeholder patterns (`test`, `0000…`, and friends).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DriveFileId(String);

impl DriveFileId {
    /// Validates a raw string as a Drive file identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidDriveId> {
        if raw.len() < MIN_ID_LEN || raw.len() > MAX_ID_LEN {
            return Err(InvalidDriveId::BadLength);
        }

        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(InvalidDriveId::BadCharacter);
        }

        let lowered = raw.to_ascii_lowercase();
        if PLACEHOLDER_WORDS.iter().any(|word| lowered.contains(word)) {
            return Err(InvalidDriveId::Placeholder);
        }

        if has_repeated_run(&lowered) {
            return Err(InvalidDriveId::Placeholder);
        }

        Ok(Self(raw.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriveFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns `true` if the string contains a run of 4 or more identical characters.
///
/// Real Drive identifiers are effectively random; long runs like `0000` or
/// `aaaa` only show up in hand-typed test data.
fn has_repeated_run(s: &str) -> bool {
    let mut run = 1;
    let mut last = None;
    for c in s.chars() {
        if Some(c) == last {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 1;
            last = Some(c);
        }
    }
    false
}

/// Extracts the raw file identifier from a Drive-hosted URL.
///
/// The patterns are tried in order, first match wins:
/// 1. the `id` query parameter,
/// 2. a `/file/d/{id}` path segment,
/// 3. a `/d/{id}` path segment.
///
/// Returns the raw identifier without validating it; callers are expected to
/// run it through [`DriveFileId::parse`].
pub fn extract_raw_id(url: &Url) -> Option<String> {
    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
        if !id.is_empty() {
            return Some(id.into_owned());
        }
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.windows(2).position(|w| w == ["file", "d"]) {
        if let Some(id) = segments.get(pos + 2) {
            return Some(strip_rendering_suffix(id).to_owned());
        }
    }

    if let Some(pos) = segments.iter().position(|s| *s == "d") {
        if let Some(id) = segments.get(pos + 1) {
            return Some(strip_rendering_suffix(id).to_owned());
        }
    }

    None
}

/// Drops a `=w1920-h1080` style rendering suffix from a path segment.
fn strip_rendering_suffix(segment: &str) -> &str {
    segment.split('=').next().unwrap_or(segment)
}
