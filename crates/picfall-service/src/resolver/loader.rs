use futures::future::BoxFuture;
use reqwest::header;
use reqwest::StatusCode;
use url::Url;

use crate::caching::{CacheContents, ResolveError};

/// The image-loading primitive driven by the resolver.
///
/// `Ok(())` means the URL produced a displayable image. Implementations must
/// not retry internally; retrying is the resolver's job.
pub trait ImageLoad: Send + Sync + 'static {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, CacheContents<()>>;
}

impl<L: ImageLoad> ImageLoad for std::sync::Arc<L> {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, CacheContents<()>> {
        (**self).load(url)
    }
}

/// Loads images over HTTP.
///
/// Relative candidates, such as local paths and proxied URLs, are joined onto
/// `base_url`.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl HttpImageLoader {
    pub fn new(base_url: Option<Url>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn absolute_url(&self, url: &str) -> CacheContents<Url> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        match &self.base_url {
            Some(base) => base
                .join(url)
                .map_err(|e| ResolveError::LoadFailure(e.to_string())),
            None => Err(ResolveError::LoadFailure(format!(
                "relative url without a base: {url}"
            ))),
        }
    }
}

impl ImageLoad for HttpImageLoader {
    fn load<'a>(&'a self, url: &'a str) -> BoxFuture<'a, CacheContents<()>> {
        Box::pin(async move {
            let url = self.absolute_url(url)?;
            tracing::debug!(%url, "attempting image load");

            let response = self.client.get(url).send().await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ResolveError::LoadFailure(format!(
                    "permission denied ({status})"
                )));
            }
            if !status.is_success() {
                return Err(ResolveError::LoadFailure(format!(
                    "download failed ({status})"
                )));
            }

            if let Some(content_type) = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
            {
                let is_image = content_type.starts_with("image/")
                    || content_type.starts_with("application/octet-stream");
                if !is_image {
                    return Err(ResolveError::LoadFailure(format!(
                        "not an image: {content_type}"
                    )));
                }
            }

            // Drain the body so a success reflects a complete transfer.
            response.bytes().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_resolution() {
        let loader = HttpImageLoader::new(Some(Url::parse("https://gallery.test").unwrap()));

        let absolute = loader.absolute_url("https://example.com/a.png").unwrap();
        assert_eq!(absolute.as_str(), "https://example.com/a.png");

        let joined = loader.absolute_url("/uploads/a.png").unwrap();
        assert_eq!(joined.as_str(), "https://gallery.test/uploads/a.png");
    }

    #[test]
    fn test_relative_url_without_base_fails() {
        let loader = HttpImageLoader::new(None);
        assert!(loader.absolute_url("/uploads/a.png").is_err());
    }
}
