//! Candidate-URL sequencing.
//!
//! Given a classified reference, produces the ordered list of URL variants
//! the resolver will attempt. The ordering is static per reference, derived
//! purely from the URL shape; retry rounds reuse the same immutable list.

use crate::proxy::maybe_proxied;
use crate::reference::{ResourceKind, ResourceReference};

/// Builds the ordered candidate list for a reference.
///
/// Drive references with a valid file id expand into the known alternate
/// renditions, highest quality first, with the original URL as the last
/// resort. Plain cross-origin URLs yield a single proxied entry, local paths
/// a single unchanged entry, and invalid references an empty list, which
/// signals immediate fallback.
pub fn build_candidates(reference: &ResourceReference) -> Vec<String> {
    match reference.kind() {
        ResourceKind::Invalid => Vec::new(),
        ResourceKind::LocalPath => reference
            .original_url()
            .map(str::to_owned)
            .into_iter()
            .collect(),
        ResourceKind::GoogleDriveShare | ResourceKind::GoogleDriveDirect => {
            let Some(id) = reference.drive_file_id() else {
                // Opaque direct-rendering URL: nothing to expand, load it
                // (proxied) as-is.
                return original_only(reference);
            };

            let variants = [
                format!("https://lh3.googleusercontent.com/d/{id}=w1920-h1080"),
                format!("https://drive.google.com/uc?export=download&id={id}"),
                format!("https://drive.google.com/thumbnail?id={id}&sz=w1920"),
                format!("https://drive.google.com/uc?export=view&id={id}"),
            ];

            let mut candidates: Vec<String> = variants
                .iter()
                .map(|variant| maybe_proxied(reference, variant))
                .collect();
            candidates.extend(original_only(reference));
            candidates
        }
        ResourceKind::DirectHttp => original_only(reference),
    }
}

fn original_only(reference: &ResourceReference) -> Vec<String> {
    reference
        .original_url()
        .map(|original| maybe_proxied(reference, original))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::classify;

    #[test]
    fn test_drive_candidate_order() {
        let original = "https://drive.google.com/file/d/1AbCDefGhIJKLmnoPQRstu/view";
        let reference = classify(Some(original));
        let candidates = build_candidates(&reference);

        assert_eq!(candidates.len(), 5);
        // Every candidate goes through the proxy, in priority order.
        assert!(candidates[0].contains("lh3.googleusercontent.com%2Fd%2F1AbCDefGhIJKLmnoPQRstu"));
        assert!(candidates[1].contains("export%3Ddownload"));
        assert!(candidates[2].contains("thumbnail"));
        assert!(candidates[3].contains("export%3Dview"));
        assert!(candidates[4].contains("drive.google.com%2Ffile%2Fd%2F1AbCDefGhIJKLmnoPQRstu"));
        for candidate in &candidates {
            assert!(candidate.starts_with("/api/proxy/image?url="), "{candidate}");
        }
    }

    #[test]
    fn test_direct_http_single_proxied_candidate() {
        let reference = classify(Some("https://cdn.example.net/photo.jpg"));
        let candidates = build_candidates(&reference);
        assert_eq!(
            candidates,
            vec!["/api/proxy/image?url=https%3A%2F%2Fcdn.example.net%2Fphoto.jpg".to_owned()]
        );
    }

    #[test]
    fn test_local_path_unchanged() {
        let reference = classify(Some("/assets/logo.png"));
        assert_eq!(build_candidates(&reference), vec!["/assets/logo.png".to_owned()]);
    }

    #[test]
    fn test_invalid_reference_empty() {
        let reference = classify(Some("null"));
        assert!(build_candidates(&reference).is_empty());
    }
}
