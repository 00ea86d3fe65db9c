//! Offline asset cache
//!
//! Keeps the app's static files servable without a network. Assets live in
//! versioned named caches: each cache is a JSON index from URL to a blob in
//! the shared content-addressed store. Install precaches the fixed file
//! lists, activate drops caches from older versions, and fetch serves
//! cache-first with a network fallback that fills the dynamic cache.

use crate::config::{
    CORE_CACHE_NAME, CORE_FILES, CURRENT_CACHE_NAMES, DYNAMIC_CACHE_NAME, STATIC_CACHE_NAME,
    STATIC_FILES,
};
use crate::error::{AppError, Result};
use crate::storage::BlobStore;
use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

const INDEX_FORMAT_VERSION: u32 = 1;
const NETWORK_TIMEOUT: Duration = Duration::from_secs(15);

/// A response body pulled from the network
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// Network access used on cache misses and during install
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. With `bypass_cache` set, intermediate HTTP caches must
    /// not answer the request.
    fn fetch(&self, url: &Url, bypass_cache: bool)
        -> impl Future<Output = Result<FetchedAsset>> + Send;
}

/// `Fetcher` over HTTP(S)
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NETWORK_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, bypass_cache: bool) -> Result<FetchedAsset> {
        let mut request = self.client.get(url.clone());
        if bypass_cache {
            request = request.header(CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(FetchedAsset { body, content_type })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub hash: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheIndex {
    format_version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// Served from the named cache
    Cache(String),
    Network,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServedAsset {
    pub url: Url,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub source: AssetSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstallReport {
    pub static_files: usize,
    pub core_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivateReport {
    pub removed_caches: Vec<String>,
    pub pruned_blobs: usize,
}

/// Versioned offline cache for static assets
pub struct AssetCache {
    index_dir: PathBuf,
    blobs: BlobStore,
    origin: Url,
}

impl AssetCache {
    /// Cache rooted at `root`; relative asset paths resolve against `origin`
    pub fn new(root: PathBuf, origin: Url) -> Self {
        Self {
            index_dir: root.join("caches"),
            blobs: BlobStore::new(root.join("blobs")),
            origin,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.index_dir).await?;
        self.blobs.initialize().await
    }

    /// Absolute URL for an asset path or URL
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .map_err(|e| AppError::Generic(format!("Invalid asset URL {}: {}", url, e)))
    }

    /// Precache the static and core file lists.
    ///
    /// Every file is downloaded before anything is written, so a failed
    /// download leaves the caches as they were.
    pub async fn install<F: Fetcher>(&self, fetcher: &F) -> Result<InstallReport> {
        tracing::info!("Installing asset cache");

        let mut downloaded: HashMap<Url, FetchedAsset> = HashMap::new();
        for path in STATIC_FILES.iter().chain(CORE_FILES.iter()) {
            let url = self.resolve(path)?;
            if downloaded.contains_key(&url) {
                continue;
            }
            let asset = fetcher.fetch(&url, true).await.map_err(|e| {
                tracing::error!("Failed to precache {}: {}", url, e);
                e
            })?;
            downloaded.insert(url, asset);
        }

        let static_files = self
            .put_all(STATIC_CACHE_NAME, STATIC_FILES, &downloaded)
            .await?;
        let core_files = self.put_all(CORE_CACHE_NAME, CORE_FILES, &downloaded).await?;

        tracing::info!(
            "Asset cache installed: {} static, {} core files",
            static_files,
            core_files
        );
        Ok(InstallReport {
            static_files,
            core_files,
        })
    }

    /// Delete caches that do not belong to the current version and the
    /// blobs only they referenced
    pub async fn activate(&self) -> Result<ActivateReport> {
        let mut removed_caches = Vec::new();
        for name in self.cache_names().await? {
            if !CURRENT_CACHE_NAMES.contains(&name.as_str()) {
                tracing::info!("Deleting old cache: {}", name);
                fs::remove_file(self.index_path(&name)).await?;
                removed_caches.push(name);
            }
        }

        let mut referenced = HashSet::new();
        for name in CURRENT_CACHE_NAMES {
            let index = self.load_index(name).await;
            referenced.extend(index.entries.into_values().map(|e| e.hash));
        }
        let pruned_blobs = self.blobs.prune(&referenced).await?;

        Ok(ActivateReport {
            removed_caches,
            pruned_blobs,
        })
    }

    /// Serve `url` from cache, falling back to the network.
    ///
    /// Network responses are stored in the dynamic cache. Fails with
    /// `AssetUnavailable` when neither source can answer.
    pub async fn fetch<F: Fetcher>(&self, url: &str, fetcher: &F) -> Result<ServedAsset> {
        let url = self.resolve(url)?;

        if let Some(served) = self.match_cached(&url).await {
            return Ok(served);
        }

        let asset = match fetcher.fetch(&url, false).await {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!("Network fetch failed for {}: {}", url, e);
                return Err(AppError::AssetUnavailable(url.to_string()));
            }
        };

        if let Err(e) = self.put(DYNAMIC_CACHE_NAME, &url, &asset).await {
            tracing::warn!("Failed to cache {}: {}", url, e);
        }

        Ok(ServedAsset {
            url,
            body: asset.body,
            content_type: asset.content_type,
            source: AssetSource::Network,
        })
    }

    /// Names of all caches on disk, current or not
    pub async fn cache_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.index_dir.exists() {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.index_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Cached entry for `url` in the named cache
    pub async fn entry(&self, cache_name: &str, url: &Url) -> Option<CacheEntry> {
        self.load_index(cache_name)
            .await
            .entries
            .get(url.as_str())
            .cloned()
    }

    async fn match_cached(&self, url: &Url) -> Option<ServedAsset> {
        for name in CURRENT_CACHE_NAMES {
            let Some(entry) = self.entry(name, url).await else {
                continue;
            };
            match self.blobs.read(&entry.hash).await {
                Ok(body) => {
                    tracing::debug!("Cache hit in {}: {}", name, url);
                    return Some(ServedAsset {
                        url: url.clone(),
                        body,
                        content_type: entry.content_type,
                        source: AssetSource::Cache(name.to_string()),
                    });
                }
                Err(e) => tracing::warn!("Cached body missing for {}: {}", url, e),
            }
        }
        None
    }

    async fn put_all(
        &self,
        cache_name: &str,
        paths: &[&str],
        downloaded: &HashMap<Url, FetchedAsset>,
    ) -> Result<usize> {
        let mut index = self.load_index(cache_name).await;
        for path in paths {
            let url = self.resolve(path)?;
            if let Some(asset) = downloaded.get(&url) {
                index.entries.insert(url.to_string(), self.store_body(asset).await?);
            }
        }
        self.save_index(cache_name, &index).await?;
        Ok(paths.len())
    }

    async fn put(&self, cache_name: &str, url: &Url, asset: &FetchedAsset) -> Result<()> {
        let entry = self.store_body(asset).await?;
        let mut index = self.load_index(cache_name).await;
        index.entries.insert(url.to_string(), entry);
        self.save_index(cache_name, &index).await?;
        tracing::debug!("Cached {} in {}", url, cache_name);
        Ok(())
    }

    async fn store_body(&self, asset: &FetchedAsset) -> Result<CacheEntry> {
        let hash = self.blobs.write(&asset.body).await?;
        Ok(CacheEntry {
            hash,
            content_type: asset.content_type.clone(),
            size: asset.body.len() as u64,
            stored_at: Utc::now(),
        })
    }

    fn index_path(&self, cache_name: &str) -> PathBuf {
        self.index_dir.join(format!("{}.json", cache_name))
    }

    async fn load_index(&self, cache_name: &str) -> CacheIndex {
        let path = self.index_path(cache_name);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => return CacheIndex::default(),
        };

        match serde_json::from_str::<CacheIndex>(&content) {
            Ok(index) if index.format_version == INDEX_FORMAT_VERSION => index,
            Ok(index) => {
                tracing::warn!(
                    "Cache {} has unsupported format {}, treating as empty",
                    cache_name,
                    index.format_version
                );
                CacheIndex::default()
            }
            Err(e) => {
                tracing::warn!("Cache {} index unreadable, treating as empty: {}", cache_name, e);
                CacheIndex::default()
            }
        }
    }

    async fn save_index(&self, cache_name: &str, index: &CacheIndex) -> Result<()> {
        fs::create_dir_all(&self.index_dir).await?;
        let content = serde_json::to_string_pretty(index)?;
        let path = self.index_path(cache_name);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves the URL itself as the body; can be switched offline
    #[derive(Default)]
    struct FakeFetcher {
        offline: AtomicBool,
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, _bypass_cache: bool) -> Result<FetchedAsset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst)
                || self.fail_on.as_deref() == Some(url.as_str())
            {
                return Err(AppError::Generic(format!("offline: {}", url)));
            }
            Ok(FetchedAsset {
                body: url.as_str().as_bytes().to_vec(),
                content_type: Some("text/plain".to_string()),
            })
        }
    }

    async fn create_test_cache() -> (AssetCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = AssetCache::new(
            temp_dir.path().join("assets"),
            Url::parse("http://localhost:8080/").unwrap(),
        );
        cache.initialize().await.unwrap();
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_install_fills_static_and_core() {
        let (cache, _temp) = create_test_cache().await;
        let fetcher = FakeFetcher::default();

        let report = cache.install(&fetcher).await.unwrap();

        assert_eq!(report.static_files, STATIC_FILES.len());
        assert_eq!(report.core_files, CORE_FILES.len());
        // Core files are a subset of the static files and are downloaded once
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), STATIC_FILES.len());

        let index_url = cache.resolve("/index.html").unwrap();
        assert!(cache.entry(CORE_CACHE_NAME, &index_url).await.is_some());
        assert!(cache.entry(STATIC_CACHE_NAME, &index_url).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_install_writes_nothing() {
        let (cache, _temp) = create_test_cache().await;
        let fetcher = FakeFetcher {
            fail_on: Some("http://localhost:8080/manifest.json".to_string()),
            ..FakeFetcher::default()
        };

        assert!(cache.install(&fetcher).await.is_err());
        assert!(cache.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_installed_assets_served_offline() {
        let (cache, _temp) = create_test_cache().await;
        let fetcher = FakeFetcher::default();
        cache.install(&fetcher).await.unwrap();
        fetcher.offline.store(true, Ordering::SeqCst);

        let served = cache.fetch("/app.js", &fetcher).await.unwrap();

        assert_eq!(served.source, AssetSource::Cache(CORE_CACHE_NAME.to_string()));
        assert_eq!(served.body, b"http://localhost:8080/app.js");
    }

    #[tokio::test]
    async fn test_miss_goes_to_network_and_fills_dynamic_cache() {
        let (cache, _temp) = create_test_cache().await;
        let fetcher = FakeFetcher::default();

        let first = cache.fetch("/icons/icon-192.png", &fetcher).await.unwrap();
        assert_eq!(first.source, AssetSource::Network);

        fetcher.offline.store(true, Ordering::SeqCst);
        let second = cache.fetch("/icons/icon-192.png", &fetcher).await.unwrap();

        assert_eq!(
            second.source,
            AssetSource::Cache(DYNAMIC_CACHE_NAME.to_string())
        );
        assert_eq!(second.body, first.body);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_miss_is_unavailable() {
        let (cache, _temp) = create_test_cache().await;
        let fetcher = FakeFetcher::default();
        fetcher.offline.store(true, Ordering::SeqCst);

        let err = cache.fetch("/missing.css", &fetcher).await.unwrap_err();

        assert!(matches!(err, AppError::AssetUnavailable(url) if url.ends_with("/missing.css")));
    }

    #[tokio::test]
    async fn test_activate_removes_old_versions() {
        let (cache, temp) = create_test_cache().await;
        let fetcher = FakeFetcher::default();
        cache.install(&fetcher).await.unwrap();

        // Simulate a cache left behind by an older version
        let old = AssetCache::new(
            temp.path().join("assets"),
            Url::parse("http://localhost:8080/").unwrap(),
        );
        let stale_url = old.resolve("/old-only.js").unwrap();
        old.put(
            "carpet-notes-v1.2",
            &stale_url,
            &FetchedAsset {
                body: b"stale".to_vec(),
                content_type: None,
            },
        )
        .await
        .unwrap();

        let report = cache.activate().await.unwrap();

        assert_eq!(report.removed_caches, vec!["carpet-notes-v1.2".to_string()]);
        assert_eq!(report.pruned_blobs, 1);
        assert!(!cache
            .cache_names()
            .await
            .unwrap()
            .contains(&"carpet-notes-v1.2".to_string()));

        fetcher.offline.store(true, Ordering::SeqCst);
        assert!(cache.fetch("/index.html", &fetcher).await.is_ok());
    }

    #[test]
    fn test_resolve_absolute_and_relative() {
        let cache = AssetCache::new(
            PathBuf::from("/tmp/unused"),
            Url::parse("http://localhost:8080/").unwrap(),
        );

        assert_eq!(
            cache.resolve("/styles.css").unwrap().as_str(),
            "http://localhost:8080/styles.css"
        );
        assert_eq!(
            cache.resolve("https://fonts.googleapis.com/x").unwrap().as_str(),
            "https://fonts.googleapis.com/x"
        );
    }
}
