//! Classification of raw resource URLs into [`ResourceReference`]s.
//!
//! Classification happens exactly once per reference; everything downstream
//! (proxying, candidate sequencing, the resolver) branches on the resulting
//! [`ResourceKind`] instead of re-deriving the URL shape ad hoc.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::drive::{self, DriveFileId};

/// Literal strings that serializers on the other side of the API like to
/// produce instead of an actual URL.
const JUNK_SENTINELS: &[&str] = &["null", "undefined", "true", "false"];

/// File extensions that are never images and frequently malicious.
const SUSPICIOUS_EXTENSIONS: &[&str] = &[
    "exe", "sh", "bat", "cmd", "dll", "msi", "scr", "js", "php",
];

/// The shape of a resource reference, computed once by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A same-origin or relative path, served without proxying.
    LocalPath,
    /// A plain cross-origin `http(s)` URL.
    DirectHttp,
    /// A Google Drive share link (`drive.google.com`, `docs.google.com`).
    GoogleDriveShare,
    /// A direct-rendering Drive URL (`googleusercontent.com`).
    GoogleDriveDirect,
    /// Junk input or a deny-listed URL; resolution fails without any attempt.
    Invalid,
}

/// A classified resource reference.
///
/// This is the tagged-union form of a raw URL: the original string, its
/// [`ResourceKind`], and the validated Drive file identifier when the
/// reference is Drive-hosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
    original_url: Option<String>,
    kind: ResourceKind,
    drive_file_id: Option<DriveFileId>,
}

impl ResourceReference {
    fn new(original_url: &str, kind: ResourceKind, drive_file_id: Option<DriveFileId>) -> Self {
        Self {
            original_url: Some(original_url.to_owned()),
            kind,
            drive_file_id,
        }
    }

    /// An invalid reference, preserving the original input for logging.
    pub fn invalid(original_url: Option<&str>) -> Self {
        Self {
            original_url: original_url.map(str::to_owned),
            kind: ResourceKind::Invalid,
            drive_file_id: None,
        }
    }

    /// The URL exactly as supplied by the caller, if any.
    pub fn original_url(&self) -> Option<&str> {
        self.original_url.as_deref()
    }

    /// The classified kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The validated Drive file identifier, for Drive-kind references.
    pub fn drive_file_id(&self) -> Option<&DriveFileId> {
        self.drive_file_id.as_ref()
    }

    /// Returns `true` if this reference can never resolve.
    pub fn is_invalid(&self) -> bool {
        self.kind == ResourceKind::Invalid
    }

    /// Returns `true` if loads of this reference must go through the
    /// same-origin image proxy to avoid CORS restrictions.
    pub fn needs_proxy(&self) -> bool {
        matches!(
            self.kind,
            ResourceKind::DirectHttp
                | ResourceKind::GoogleDriveShare
                | ResourceKind::GoogleDriveDirect
        )
    }
}

/// Classifies a raw resource URL.
///
/// Known-junk values (`None`, empty strings, `"null"`, `"undefined"`, …)
/// classify as [`ResourceKind::Invalid`] without any parsing work. Drive
/// references with an identifier failing [`DriveFileId::parse`] also
/// classify as `Invalid`, short-circuiting all downstream attempts.
pub fn classify(url: Option<&str>) -> ResourceReference {
    let Some(raw) = url else {
        return ResourceReference::invalid(None);
    };

    let trimmed = raw.trim();
    if trimmed.is_empty()
        || JUNK_SENTINELS
            .iter()
            .any(|junk| trimmed.eq_ignore_ascii_case(junk))
    {
        return ResourceReference::invalid(Some(raw));
    }

    let lowered = trimmed.to_ascii_lowercase();

    if lowered.starts_with("javascript:") {
        return ResourceReference::invalid(Some(raw));
    }

    if lowered.starts_with("data:") {
        // Inline image data is self-contained and displayable as-is; any
        // other data URL is junk.
        if lowered.starts_with("data:image/") {
            return ResourceReference::new(trimmed, ResourceKind::LocalPath, None);
        }
        return ResourceReference::invalid(Some(raw));
    }

    if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
        return classify_relative(raw, trimmed);
    }

    let Ok(parsed) = Url::parse(trimmed) else {
        return ResourceReference::invalid(Some(raw));
    };

    let Some(host) = parsed.host_str() else {
        return ResourceReference::invalid(Some(raw));
    };
    let host = host.to_ascii_lowercase();

    if is_loopback_host(&host) {
        // Local dev servers are fine as long as they point at an actual
        // file; a bare loopback address is a misconfiguration.
        if has_file_extension(parsed.path()) {
            return ResourceReference::new(trimmed, ResourceKind::LocalPath, None);
        }
        return ResourceReference::invalid(Some(raw));
    }

    if host == "drive.google.com" || host == "docs.google.com" {
        return classify_drive(raw, trimmed, &parsed, ResourceKind::GoogleDriveShare);
    }

    if host == "googleusercontent.com" || host.ends_with(".googleusercontent.com") {
        return classify_drive(raw, trimmed, &parsed, ResourceKind::GoogleDriveDirect);
    }

    if !host.contains('.') {
        return ResourceReference::invalid(Some(raw));
    }

    if is_suspicious_path(parsed.path()) {
        tracing::debug!(url = trimmed, "refusing suspicious resource URL");
        return ResourceReference::invalid(Some(raw));
    }

    ResourceReference::new(trimmed, ResourceKind::DirectHttp, None)
}

/// Classifies an input without an `http(s)` scheme.
fn classify_relative(raw: &str, trimmed: &str) -> ResourceReference {
    // Another scheme entirely (`ftp:`, `file:`, …) is not loadable in an
    // image context.
    if trimmed.contains("://") {
        return ResourceReference::invalid(Some(raw));
    }

    let plausible_path = !trimmed.contains(char::is_whitespace)
        && (trimmed.starts_with('/') || trimmed.contains('.'));

    if plausible_path && trimmed != "/" {
        ResourceReference::new(trimmed, ResourceKind::LocalPath, None)
    } else {
        ResourceReference::invalid(Some(raw))
    }
}

/// Classifies a Drive-hosted URL by extracting and validating its file id.
fn classify_drive(
    raw: &str,
    trimmed: &str,
    parsed: &Url,
    kind: ResourceKind,
) -> ResourceReference {
    match drive::extract_raw_id(parsed) {
        Some(candidate) => match DriveFileId::parse(&candidate) {
            Ok(id) => ResourceReference::new(trimmed, kind, Some(id)),
            Err(reason) => {
                tracing::debug!(
                    url = trimmed,
                    %reason,
                    "rejecting drive reference with unusable file id"
                );
                ResourceReference::invalid(Some(raw))
            }
        },
        // Direct-rendering hosts serve opaque URLs without an extractable
        // id; those can still be loaded (proxied) as-is. A share link
        // without an id can not.
        None if kind == ResourceKind::GoogleDriveDirect => {
            ResourceReference::new(trimmed, kind, None)
        }
        None => ResourceReference::invalid(Some(raw)),
    }
}

fn is_loopback_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "0.0.0.0"
}

fn has_file_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|name| name.rsplit_once('.').is_some_and(|(_, ext)| !ext.is_empty()))
}

fn is_suspicious_path(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    SUSPICIOUS_EXTENSIONS
        .iter()
        .any(|ext| lowered.ends_with(&format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_drive_share_link() {
        let reference = classify(Some(
            "https://drive.google.com/file/d/1AbCDefGhIJKLmnoPQRstuVWXyz0123456/view",
        ));
        assert_eq!(reference.kind(), ResourceKind::GoogleDriveShare);
        assert_eq!(
            reference.drive_file_id().map(|id| id.as_str()),
            Some("1AbCDefGhIJKLmnoPQRstuVWXyz0123456")
        );
    }

    #[test]
    fn test_classify_junk_sentinels() {
        for junk in [None, Some(""), Some("null"), Some("undefined"), Some("true"), Some("false")]
        {
            assert_eq!(classify(junk).kind(), ResourceKind::Invalid, "{junk:?}");
        }
        assert_eq!(classify(Some("  NULL  ")).kind(), ResourceKind::Invalid);
    }

    #[test]
    fn test_classify_rejects_placeholder_ids() {
        for url in [
            "https://drive.google.com/file/d/test1234567890123456789/view",
            "https://drive.google.com/uc?id=0000000000000000000000",
            "https://drive.google.com/file/d/short/view",
        ] {
            assert_eq!(classify(Some(url)).kind(), ResourceKind::Invalid, "{url}");
        }
    }

    #[test]
    fn test_classify_share_link_without_id() {
        let reference = classify(Some("https://drive.google.com/drive/my-drive"));
        assert_eq!(reference.kind(), ResourceKind::Invalid);
    }

    #[test]
    fn test_classify_googleusercontent() {
        let reference = classify(Some(
            "https://lh3.googleusercontent.com/d/1AbCDefGhIJKLmnoPQRstu=w800-h600",
        ));
        assert_eq!(reference.kind(), ResourceKind::GoogleDriveDirect);
        assert_eq!(
            reference.drive_file_id().map(|id| id.as_str()),
            Some("1AbCDefGhIJKLmnoPQRstu")
        );

        // Opaque direct URLs keep working without an extractable id.
        let reference = classify(Some("https://lh3.googleusercontent.com/a-/AOh14Gg"));
        assert_eq!(reference.kind(), ResourceKind::GoogleDriveDirect);
        assert_eq!(reference.drive_file_id(), None);
    }

    #[test]
    fn test_classify_local_paths() {
        assert_eq!(
            classify(Some("/assets/logo.png")).kind(),
            ResourceKind::LocalPath
        );
        assert_eq!(
            classify(Some("images/banner.jpg")).kind(),
            ResourceKind::LocalPath
        );
        assert_eq!(
            classify(Some("http://localhost:3000/uploads/photo.png")).kind(),
            ResourceKind::LocalPath
        );
    }

    #[test]
    fn test_classify_bare_loopback() {
        assert_eq!(
            classify(Some("http://127.0.0.1:8080/")).kind(),
            ResourceKind::Invalid
        );
        assert_eq!(classify(Some("http://localhost")).kind(), ResourceKind::Invalid);
    }

    #[test]
    fn test_classify_direct_http() {
        let reference = classify(Some("https://cdn.example.net/images/photo.jpg"));
        assert_eq!(reference.kind(), ResourceKind::DirectHttp);
        assert!(reference.needs_proxy());
    }

    #[test]
    fn test_classify_suspicious() {
        for url in [
            "https://evil.example.net/payload.exe",
            "https://evil.example.net/script.js",
            "javascript:alert(1)",
            "data:text/html,<script></script>",
            "http://intranethost/photo.png",
        ] {
            assert_eq!(classify(Some(url)).kind(), ResourceKind::Invalid, "{url}");
        }
    }

    #[test]
    fn test_classify_data_image() {
        let reference = classify(Some("data:image/png;base64,iVBORw0KGgo="));
        assert_eq!(reference.kind(), ResourceKind::LocalPath);
        assert!(!reference.needs_proxy());
    }
}
