// Two-tier asset cache: an in-process URL index backed by a TTL-checked persistent store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::stats::{CacheStats, StatsCollector};
use crate::config::CacheConfig;
use crate::error::PreloadError;
use crate::source::traits::AssetSource;
use crate::store::{PersistentStore, StoreHost, StoredResponse};

/// What the cache knows about an entry it wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryMetadata {
    pub url: String,
    pub cached_at_ms: u64,
    pub expires_at_ms: Option<u64>,
    pub size_bytes: Option<u64>,
}

pub struct CacheStore {
    config: CacheConfig,
    source: Arc<dyn AssetSource>,
    host: Option<Arc<dyn StoreHost>>,
    /// Set once by `initialize`; `None` inside means memory-only mode.
    persistent: OnceCell<Option<Arc<dyn PersistentStore>>>,
    /// URL -> cached reference. A present key is a cache-hit marker.
    memory: RwLock<HashMap<String, String>>,
    metadata: RwLock<HashMap<String, CacheEntryMetadata>>,
    stats: StatsCollector,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    /// Create a cache store. Nothing is opened until `initialize`.
    ///
    /// `host` is the environment's persistent storage; `None` (or a host whose
    /// `open` fails) leaves the store in memory-only mode.
    pub fn new(
        config: CacheConfig,
        source: Arc<dyn AssetSource>,
        host: Option<Arc<dyn StoreHost>>,
    ) -> Self {
        Self::with_clock(config, source, host, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        source: Arc<dyn AssetSource>,
        host: Option<Arc<dyn StoreHost>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            source,
            host,
            persistent: OnceCell::new(),
            memory: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
            stats: StatsCollector::new(),
            clock,
        }
    }

    /// Attach the persistent store. Idempotent: concurrent callers wait on the
    /// first call and later calls return immediately.
    pub async fn initialize(&self) {
        self.persistent
            .get_or_init(|| async {
                let Some(host) = self.host.as_ref() else {
                    info!("persistent store not available, using in-memory cache only");
                    return None;
                };
                match host.open(&self.config.cache_name).await {
                    Ok(store) => {
                        info!("persistent store '{}' initialized", self.config.cache_name);
                        Some(store)
                    }
                    Err(e) => {
                        warn!(
                            "failed to open persistent store, falling back to in-memory only: {}",
                            e
                        );
                        None
                    }
                }
            })
            .await;
    }

    pub fn is_initialized(&self) -> bool {
        self.persistent.initialized()
    }

    fn persistent(&self) -> Option<&Arc<dyn PersistentStore>> {
        self.persistent.get().and_then(Option::as_ref)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn is_expired(&self, cached_at_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(cached_at_ms) >= self.config.ttl_ms
    }

    fn metadata_for(&self, url: &str, cached_at_ms: u64, size_bytes: u64) -> CacheEntryMetadata {
        CacheEntryMetadata {
            url: url.to_string(),
            cached_at_ms,
            expires_at_ms: Some(cached_at_ms.saturating_add(self.config.ttl_ms)),
            size_bytes: Some(size_bytes),
        }
    }

    /// Look `url` up in both tiers without touching the network.
    ///
    /// A live persistent hit is promoted into the in-memory index. Expired
    /// entries in either tier are reported absent; their metadata is kept (or
    /// rebuilt from the stored record) so `invalidate_expired` can still
    /// remove the persistent copy.
    pub async fn resolve_cached(&self, url: &str) -> Option<String> {
        let now = self.clock.now_ms();

        let mem_hit = self.memory.read().get(url).cloned();
        if let Some(reference) = mem_hit {
            let cached_at = self.metadata.read().get(url).map(|m| m.cached_at_ms);
            match cached_at {
                Some(cached_at) if self.is_expired(cached_at, now) => {
                    debug!("memory entry expired for {}", url);
                    self.memory.write().remove(url);
                }
                _ => {
                    self.stats.record_memory_hit();
                    return Some(reference);
                }
            }
        }

        if let Some(store) = self.persistent() {
            match store.get(url).await {
                Ok(Some(stored)) => {
                    // In-session metadata wins; otherwise trust the stored timestamp.
                    let cached_at = self
                        .metadata
                        .read()
                        .get(url)
                        .map(|m| m.cached_at_ms)
                        .unwrap_or(stored.cached_at_ms);
                    if !self.is_expired(cached_at, now) {
                        self.metadata
                            .write()
                            .entry(url.to_string())
                            .or_insert_with(|| {
                                self.metadata_for(url, cached_at, stored.body.len() as u64)
                            });
                        self.memory
                            .write()
                            .insert(url.to_string(), url.to_string());
                        self.stats.record_persistent_hit();
                        debug!("persistent hit promoted for {}", url);
                        return Some(url.to_string());
                    }
                    debug!("persistent entry expired for {}", url);
                    self.metadata
                        .write()
                        .entry(url.to_string())
                        .or_insert_with(|| {
                            self.metadata_for(url, cached_at, stored.body.len() as u64)
                        });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "error reading from persistent store: {}",
                        PreloadError::Store(e.to_string())
                    );
                }
            }
        }

        self.stats.record_miss();
        None
    }

    /// Fetch `url` from the network and cache it in both tiers.
    ///
    /// Fails with `PreloadError::Fetch` on transport errors or non-2xx
    /// responses. A failed persistent write is logged and does not fail the call.
    pub async fn fetch_and_cache(&self, url: &str) -> Result<String, PreloadError> {
        self.stats.record_network_fetch();

        let asset = self
            .source
            .fetch(url)
            .await
            .map_err(|e| PreloadError::fetch(url, e.to_string()))?;

        if !asset.is_success() {
            return Err(PreloadError::fetch(
                url,
                format!("HTTP {}: {}", asset.status, asset.status_text),
            ));
        }

        let now = self.clock.now_ms();
        let size = asset.body.len() as u64;

        if let Some(store) = self.persistent() {
            if let Err(e) = store.put(StoredResponse::from_fetched(url, &asset, now)).await {
                self.stats.record_persistence_failure();
                warn!(
                    "{}",
                    PreloadError::PersistenceWrite {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                );
            }
        }

        self.metadata
            .write()
            .insert(url.to_string(), self.metadata_for(url, now, size));
        self.memory
            .write()
            .insert(url.to_string(), url.to_string());
        self.stats.record_downloaded(size);

        debug!("cached {} ({} bytes)", url, size);
        Ok(url.to_string())
    }

    /// Remove every entry whose metadata is past the TTL from all tiers.
    /// Returns the number of entries removed.
    pub async fn invalidate_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let expired: Vec<String> = self
            .metadata
            .read()
            .values()
            .filter(|m| self.is_expired(m.cached_at_ms, now))
            .map(|m| m.url.clone())
            .collect();

        for url in &expired {
            self.metadata.write().remove(url);
            self.memory.write().remove(url);

            if let Some(store) = self.persistent() {
                if let Err(e) = store.delete(url).await {
                    warn!("failed to delete {} from persistent store: {}", url, e);
                }
            }
        }

        info!("expired cache cleared ({} entries)", expired.len());
        expired.len()
    }

    /// Empty both tiers. Persistent deletions that fail are logged per key.
    pub async fn clear_all(&self) {
        self.memory.write().clear();
        self.metadata.write().clear();

        let Some(store) = self.persistent() else {
            return;
        };
        let keys = match store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("failed to list persistent store keys: {}", e);
                return;
            }
        };
        for key in keys {
            if let Err(e) = store.delete(&key).await {
                warn!("failed to delete {} from persistent store: {}", key, e);
            }
        }
        info!("all cache cleared");
    }

    /// Memory-tier membership only; no expiry check and no I/O.
    pub fn is_cached(&self, url: &str) -> bool {
        self.memory.read().contains_key(url)
    }

    pub fn metadata(&self, url: &str) -> Option<CacheEntryMetadata> {
        self.metadata.read().get(url).cloned()
    }

    /// Point-in-time counters and tier sizes. Does not mutate the store.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entry_count: self.memory.read().len(),
            metadata_entry_count: self.metadata.read().len(),
            persistent_store_available: self.persistent().is_some(),
            counters: self.stats.snapshot(),
        }
    }

    /// Number of network fetches issued so far.
    pub fn network_fetches(&self) -> u64 {
        self.stats.network_fetches()
    }
}
