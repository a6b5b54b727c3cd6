//! Rewriting cross-origin URLs onto the same-origin image proxy.
//!
//! The proxy endpoint fetches the target server-side and streams the bytes
//! back with permissive CORS headers; this module only produces the rewritten
//! URL, it never talks to the endpoint itself.

use url::form_urlencoded;

use crate::reference::{classify, ResourceReference};

/// The fixed same-origin endpoint of the image proxy collaborator.
pub const PROXY_ENDPOINT: &str = "/api/proxy/image";

/// Returns `true` if the URL already points at the proxy endpoint.
pub fn is_proxied(url: &str) -> bool {
    url.split('?').next().unwrap_or(url) == PROXY_ENDPOINT
}

/// Wraps a URL as the `url` query parameter of the proxy endpoint.
///
/// Idempotent: an already-proxied URL is returned unchanged, so repeated
/// classification never stacks proxy layers.
pub fn proxy_rewrite(url: &str) -> String {
    if is_proxied(url) {
        return url.to_owned();
    }

    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", url)
        .finish();
    format!("{PROXY_ENDPOINT}?{query}")
}

/// Classifies `url` and reports whether loads of it must be proxied.
///
/// Convenience for callers that pre-rewrite URLs outside the full resolver,
/// e.g. batch preloading.
pub fn needs_proxy(url: &str) -> bool {
    classify(Some(url)).needs_proxy()
}

/// Applies the proxy rewrite to a candidate URL when the reference requires it.
pub(crate) fn maybe_proxied(reference: &ResourceReference, url: &str) -> String {
    if reference.needs_proxy() {
        proxy_rewrite(url)
    } else {
        url.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_rewrite_encodes() {
        let rewritten = proxy_rewrite("https://cdn.example.net/a b.png?x=1&y=2");
        assert_eq!(
            rewritten,
            "/api/proxy/image?url=https%3A%2F%2Fcdn.example.net%2Fa+b.png%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn test_proxy_rewrite_idempotent() {
        let once = proxy_rewrite("https://cdn.example.net/photo.jpg");
        let twice = proxy_rewrite(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_classify_never_rewraps_proxied_urls() {
        // A proxied URL is same-origin, so classification keeps it local and
        // unproxied.
        let once = proxy_rewrite("https://cdn.example.net/photo.jpg");
        assert!(!needs_proxy(&once));
    }

    #[test]
    fn test_needs_proxy() {
        assert!(needs_proxy("https://cdn.example.net/photo.jpg"));
        assert!(needs_proxy(
            "https://drive.google.com/file/d/1AbCDefGhIJKLmnoPQRstu/view"
        ));
        assert!(!needs_proxy("/assets/logo.png"));
        assert!(!needs_proxy("http://localhost:3000/logo.png"));
    }
}
