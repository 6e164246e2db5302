//! Image loader backed by the asset services.

use std::path::PathBuf;

use async_trait::async_trait;
use card_renderer::image::parse_data_uri;
use card_renderer::{ImageLoader, LocalLoader, RenderError, RenderResult};
use tracing::debug;

use crate::storage::StorageClient;

/// Fetches scene images over HTTP.
///
/// `data:` URIs are decoded in place. Relative URLs resolve against the
/// service origin, unless a local asset root is configured, in which case
/// they are read from disk instead.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    storage: StorageClient,
    local: Option<LocalLoader>,
}

impl HttpImageLoader {
    /// Loader that fetches everything from the service.
    #[must_use]
    pub fn new(storage: StorageClient) -> Self {
        Self {
            storage,
            local: None,
        }
    }

    /// Serve relative URLs from `root` instead of the service.
    #[must_use]
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local = Some(LocalLoader::with_root(root));
        self
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
        if url.starts_with("data:") {
            return parse_data_uri(url);
        }
        let is_remote = url.starts_with("http://") || url.starts_with("https://");
        if let (false, Some(local)) = (is_remote, &self.local) {
            return local.fetch(url).await;
        }
        debug!(url, "Fetching image");
        self.storage
            .fetch_bytes(url)
            .await
            .map_err(|e| RenderError::Resource(format!("Failed to fetch {url}: {e}")))
    }
}
