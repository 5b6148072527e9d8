use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::{EngineConfig, PreloadOptions};
use crate::engine::cache::CacheStore;
use crate::engine::preloader::Preloader;
use crate::engine::session::{LoadError, LoadResult, LoadingState, PreloadSessionState};
use crate::engine::stats::CacheStats;
use crate::source::http_source::HttpSource;
use crate::source::traits::AssetSource;
use crate::store::{DiskStoreHost, StoreHost};

/// Entry point wiring the network source, the persistent store host, the
/// cache store and the preloader together.
pub struct PreloadEngine {
    cache: Arc<CacheStore>,
    preloader: Preloader,
}

impl PreloadEngine {
    /// Build an engine from configuration.
    ///
    /// With `persistent_dir` set, entries are persisted under that directory;
    /// otherwise the engine runs memory-only.
    pub fn new(config: EngineConfig) -> Self {
        let source: Arc<dyn AssetSource> = Arc::new(HttpSource::new(config.headers.clone()));
        let host = config
            .persistent_dir
            .as_ref()
            .map(|dir| Arc::new(DiskStoreHost::new(dir.clone())) as Arc<dyn StoreHost>);
        info!(
            "preload engine created cache={} persistent_dir={:?}",
            config.cache.cache_name, config.persistent_dir
        );
        let cache = Arc::new(CacheStore::new(config.cache, source, host));
        Self::with_parts(cache, config.preload)
    }

    /// Build an engine around an already constructed cache store.
    pub fn with_parts(cache: Arc<CacheStore>, options: PreloadOptions) -> Self {
        let preloader = Preloader::new(Arc::clone(&cache), options);
        Self { cache, preloader }
    }

    pub async fn preload<I, S>(&self, urls: I) -> Vec<LoadResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloader.preload(urls).await
    }

    pub async fn preload_with<I, S>(&self, urls: I, options: &PreloadOptions) -> Vec<LoadResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloader.preload_with(urls, options).await
    }

    /// Progress notifications for a UI layer.
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.preloader.subscribe()
    }

    pub fn state(&self) -> PreloadSessionState {
        self.preloader.state()
    }

    pub fn errors(&self) -> Vec<LoadError> {
        self.preloader.errors()
    }

    pub fn has_errors(&self) -> bool {
        self.preloader.has_errors()
    }

    pub fn is_complete(&self) -> bool {
        self.preloader.is_complete()
    }

    pub fn success_rate(&self) -> u8 {
        self.preloader.success_rate()
    }

    pub fn reset(&self) {
        self.preloader.reset();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.preloader.cache_stats()
    }

    pub async fn clear_cache(&self) {
        self.preloader.clear_cache().await;
    }

    /// Sweep entries past their TTL. Returns how many were removed.
    pub async fn invalidate_expired(&self) -> usize {
        self.cache.initialize().await;
        self.cache.invalidate_expired().await
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}
