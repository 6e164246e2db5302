//! Image asset cache for scene painting.
//!
//! Every distinct image URL is fetched at most once and kept by URL, so
//! re-rendering a scene (or rendering the same template for many records)
//! never re-fetches. Painting only reads the cache: an image that is not
//! loaded yet, or that failed to load, is treated as absent.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::{RenderError, RenderResult};
use crate::image::{parse_data_uri, LoadedImage};

/// Source of raw image bytes.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Fetch the bytes behind `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be fetched.
    async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>>;
}

/// Loads `data:` URIs and files from the local filesystem.
///
/// Absolute URL paths such as `/uploads/images/a.png` are resolved below
/// `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalLoader {
    root: Option<PathBuf>,
}

impl LocalLoader {
    /// Loader that resolves paths relative to the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that resolves paths below `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[async_trait]
impl ImageLoader for LocalLoader {
    async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
        if url.starts_with("data:") {
            return parse_data_uri(url);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(RenderError::Resource(format!(
                "{url} is remote; use an HTTP loader"
            )));
        }
        let path = match &self.root {
            Some(root) => root.join(url.trim_start_matches('/')),
            None => PathBuf::from(url),
        };
        tokio::fs::read(&path)
            .await
            .map_err(|e| RenderError::Resource(format!("{}: {e}", path.display())))
    }
}

/// Load state of one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    /// Never requested.
    Missing,
    /// Decoded and ready to paint.
    Ready,
    /// Fetch or decode failed; painted as absent.
    Failed,
}

#[derive(Debug)]
enum Slot {
    Ready(LoadedImage),
    Failed(String),
}

/// Entry in the asset cache.
#[derive(Debug)]
struct CacheEntry {
    slot: Slot,
    /// Last time a scene asked for this URL.
    last_used: Instant,
    /// Size in bytes.
    size_bytes: usize,
}

/// Configuration for the asset cache.
#[derive(Debug, Clone)]
pub struct AssetCacheConfig {
    /// Maximum total size of cached images in bytes.
    pub max_size_bytes: usize,
    /// Maximum number of cached URLs.
    pub max_entries: usize,
}

impl Default for AssetCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 128 * 1024 * 1024, // 128 MB
            max_entries: 512,
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// URLs requested that were already cached.
    pub hits: u64,
    /// URLs that had to be fetched.
    pub misses: u64,
    /// Fetches that failed.
    pub failures: u64,
    /// Number of evictions.
    pub evictions: u64,
    /// Total bytes loaded.
    pub bytes_loaded: u64,
}

/// Outcome of one [`AssetCache::preload`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// URLs already in the cache.
    pub cached: usize,
    /// URLs fetched and decoded.
    pub loaded: usize,
    /// URLs whose fetch or decode failed.
    pub failed: usize,
}

/// Decoded images keyed by URL.
#[derive(Debug)]
pub struct AssetCache {
    entries: HashMap<String, CacheEntry>,
    config: AssetCacheConfig,
    current_size: usize,
    stats: CacheStats,
}

impl AssetCache {
    /// Create a new asset cache with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AssetCacheConfig::default())
    }

    /// Create a new asset cache with custom configuration.
    #[must_use]
    pub fn with_config(config: AssetCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            current_size: 0,
            stats: CacheStats::default(),
        }
    }

    /// A loaded image, if it is ready.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&LoadedImage> {
        match &self.entries.get(url)?.slot {
            Slot::Ready(image) => Some(image),
            Slot::Failed(_) => None,
        }
    }

    /// Load state of a URL.
    #[must_use]
    pub fn status(&self, url: &str) -> AssetStatus {
        match self.entries.get(url).map(|e| &e.slot) {
            None => AssetStatus::Missing,
            Some(Slot::Ready(_)) => AssetStatus::Ready,
            Some(Slot::Failed(_)) => AssetStatus::Failed,
        }
    }

    /// Why a URL failed to load.
    #[must_use]
    pub fn failure(&self, url: &str) -> Option<&str> {
        match &self.entries.get(url)?.slot {
            Slot::Failed(reason) => Some(reason),
            Slot::Ready(_) => None,
        }
    }

    /// Insert an already decoded image.
    pub fn insert(&mut self, url: impl Into<String>, image: LoadedImage) {
        let size_bytes = image.bytes.len();
        self.stats.bytes_loaded += size_bytes as u64;
        self.put(url.into(), Slot::Ready(image), size_bytes);
    }

    /// Decode and insert raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded; the cache is left
    /// unchanged.
    pub fn insert_bytes(&mut self, url: impl Into<String>, bytes: &[u8]) -> RenderResult<()> {
        let image = LoadedImage::decode(bytes)?;
        self.insert(url, image);
        Ok(())
    }

    fn put(&mut self, url: String, slot: Slot, size_bytes: usize) {
        if let Some(old) = self.entries.remove(&url) {
            self.current_size -= old.size_bytes;
        }
        self.current_size += size_bytes;
        self.entries.insert(
            url,
            CacheEntry {
                slot,
                last_used: Instant::now(),
                size_bytes,
            },
        );
    }

    /// Fetch every URL not yet cached, concurrently, and cache the results.
    ///
    /// Each URL is requested from `loader` at most once over the cache's
    /// lifetime; failures are remembered and not retried until
    /// [`AssetCache::retry_failed`] is called.
    pub async fn preload<L, I>(&mut self, urls: I, loader: &L) -> PreloadReport
    where
        L: ImageLoader + ?Sized,
        I: IntoIterator<Item = String>,
    {
        let wanted: BTreeSet<String> = urls.into_iter().filter(|u| !u.is_empty()).collect();
        let now = Instant::now();
        let mut report = PreloadReport::default();
        let mut missing = Vec::new();
        for url in &wanted {
            match self.entries.get_mut(url) {
                Some(entry) => {
                    entry.last_used = now;
                    report.cached += 1;
                }
                None => missing.push(url.clone()),
            }
        }
        self.stats.hits += report.cached as u64;
        self.stats.misses += missing.len() as u64;

        let results = join_all(missing.into_iter().map(|url| async move {
            let result = match loader.fetch(&url).await {
                Ok(bytes) => LoadedImage::decode(&bytes),
                Err(e) => Err(e),
            };
            (url, result)
        }))
        .await;

        for (url, result) in results {
            match result {
                Ok(image) => {
                    tracing::debug!(%url, width = image.width, height = image.height, "Loaded image");
                    report.loaded += 1;
                    self.insert(url, image);
                }
                Err(e) => {
                    tracing::warn!(%url, "Image unavailable, painting without it: {e}");
                    report.failed += 1;
                    self.stats.failures += 1;
                    self.put(url, Slot::Failed(e.to_string()), 0);
                }
            }
        }

        self.evict_if_needed(&wanted);
        report
    }

    /// Forget failed URLs so the next preload fetches them again.
    pub fn retry_failed(&mut self) {
        self.entries
            .retain(|_, entry| matches!(entry.slot, Slot::Ready(_)));
    }

    /// Remove a URL from the cache.
    pub fn remove(&mut self, url: &str) -> Option<LoadedImage> {
        let entry = self.entries.remove(url)?;
        self.current_size -= entry.size_bytes;
        match entry.slot {
            Slot::Ready(image) => Some(image),
            Slot::Failed(_) => None,
        }
    }

    /// Check if a URL is cached (ready or failed).
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Clear all cached images.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    /// Get the current number of cached URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Evict least recently used entries outside `keep` until within limits.
    fn evict_if_needed(&mut self, keep: &BTreeSet<String>) {
        while self.entries.len() > self.config.max_entries
            || self.current_size > self.config.max_size_bytes
        {
            let oldest_key = self
                .entries
                .iter()
                .filter(|(key, _)| !keep.contains(*key))
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest_key else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.current_size -= entry.size_bytes;
                self.stats.evictions += 1;
            }
        }
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::image::encode_data_uri;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]))
            .write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode");
        buf.into_inner()
    }

    /// Serves a fixed PNG for `ok-*` URLs and counts every fetch.
    struct CountingLoader {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ImageLoader for CountingLoader {
        async fn fetch(&self, url: &str) -> RenderResult<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if url.starts_with("ok-") {
                Ok(png(2, 2))
            } else {
                Err(RenderError::Resource(format!("404 {url}")))
            }
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_each_url_fetched_once() {
        let loader = CountingLoader {
            fetches: AtomicUsize::new(0),
        };
        let mut cache = AssetCache::new();

        let report = cache
            .preload(urls(&["ok-a", "ok-b", "ok-a", "missing"]), &loader)
            .await;
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 3);

        let report = cache.preload(urls(&["ok-a", "missing"]), &loader).await;
        assert_eq!(report.cached, 2);
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 3);

        assert_eq!(cache.status("ok-a"), AssetStatus::Ready);
        assert_eq!(cache.status("missing"), AssetStatus::Failed);
        assert_eq!(cache.status("never"), AssetStatus::Missing);
        assert!(cache.get("missing").is_none());
        assert!(cache.failure("missing").is_some_and(|r| r.contains("404")));
        assert_eq!(cache.stats().hits, 2);
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_retry_failed_refetches() {
        let loader = CountingLoader {
            fetches: AtomicUsize::new(0),
        };
        let mut cache = AssetCache::new();
        cache.preload(urls(&["gone"]), &loader).await;
        cache.retry_failed();
        assert!(!cache.contains("gone"));
        cache.preload(urls(&["gone"]), &loader).await;
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_eviction_keeps_requested_urls() {
        let loader = CountingLoader {
            fetches: AtomicUsize::new(0),
        };
        let mut cache = AssetCache::with_config(AssetCacheConfig {
            max_size_bytes: usize::MAX,
            max_entries: 2,
        });
        cache.preload(urls(&["ok-1", "ok-2"]), &loader).await;
        cache.preload(urls(&["ok-3", "ok-2"]), &loader).await;
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("ok-2"));
        assert!(cache.contains("ok-3"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_local_loader_reads_data_uris_and_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("uploads")).expect("mkdir");
        std::fs::write(dir.path().join("uploads/logo.png"), png(4, 3)).expect("write");

        let loader = LocalLoader::with_root(dir.path());
        let mut cache = AssetCache::new();
        let inline = encode_data_uri("image/png", &png(1, 1));
        let report = cache
            .preload(
                vec![
                    "/uploads/logo.png".to_string(),
                    inline.clone(),
                    "https://example.com/x.png".to_string(),
                ],
                &loader,
            )
            .await;
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(cache.get("/uploads/logo.png").map(|i| i.width), Some(4));
        assert_eq!(cache.get(&inline).map(|i| i.height), Some(1));
    }

    #[test]
    fn test_insert_bytes_and_remove() {
        let mut cache = AssetCache::new();
        cache.insert_bytes("a", &png(2, 2)).expect("insert");
        assert!(cache.size_bytes() > 0);
        assert!(cache.insert_bytes("b", b"nope").is_err());
        assert!(!cache.contains("b"));
        assert!(cache.remove("a").is_some());
        assert_eq!(cache.size_bytes(), 0);
        assert!(cache.is_empty());
    }
}
