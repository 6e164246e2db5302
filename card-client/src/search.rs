//! Importing online image search results into asset storage.
//!
//! Search providers are opaque: anything that can turn a query into candidate
//! URLs implements [`ImageSearch`]. Candidates are never referenced directly;
//! each one is copied through the upload service first so templates only
//! ever point at same-origin assets.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::ClientResult;
use crate::storage::{StorageClient, UploadedAsset};

/// Default number of candidates requested per search.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A candidate image returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Third-party image URL.
    pub url: String,
    /// Provider description, if any.
    #[serde(default)]
    pub description: Option<String>,
}

impl SearchHit {
    /// Create a hit without a description.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }
}

/// An online image search provider.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Up to `limit` candidates for `query`.
    async fn search(&self, query: &str, limit: usize) -> ClientResult<Vec<SearchHit>>;
}

/// Search and copy every hit into asset storage.
///
/// Copies run concurrently. A copy that fails, or that comes back with a URL
/// on another origin, is logged and skipped; the rest are returned in hit
/// order.
///
/// # Errors
///
/// Returns an error only if the search itself fails.
#[instrument(skip(search, storage))]
pub async fn import_search_results<S>(
    search: &S,
    storage: &StorageClient,
    query: &str,
    limit: usize,
) -> ClientResult<Vec<UploadedAsset>>
where
    S: ImageSearch + ?Sized,
{
    let hits = search.search(query, limit).await?;
    let copies = join_all(
        hits.iter()
            .take(limit)
            .map(|hit| storage.upload_image_from_url(&hit.url)),
    )
    .await;

    let mut imported = Vec::with_capacity(copies.len());
    for (hit, copy) in hits.iter().zip(copies) {
        match copy {
            Ok(mut asset) if storage.is_same_origin(&asset.url) => {
                if asset.name.is_empty() {
                    asset.name = hit
                        .description
                        .clone()
                        .unwrap_or_else(|| "Image".to_string());
                }
                imported.push(asset);
            }
            Ok(asset) => {
                warn!(source = %hit.url, url = %asset.url, "Copied image is not same-origin, skipping");
            }
            Err(e) => {
                warn!(source = %hit.url, "Failed to copy search result: {}", e);
            }
        }
    }

    info!(
        query,
        found = hits.len(),
        imported = imported.len(),
        "Imported search results"
    );
    Ok(imported)
}
