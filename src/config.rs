use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::PreloadError;

/// Namespace of the persistent store opened by the cache.
pub const DEFAULT_CACHE_NAME: &str = "asset-preload-v1";

/// Lifetime of a cached entry, measured from the time it was written (24 h).
pub const CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// First retry waits this long; each following retry doubles it.
pub const RETRY_BASE_DELAY_MS: u64 = 100;

/// Minimum time a preload session stays visibly "loading".
pub const DEFAULT_MIN_DISPLAY_TIME_MS: u64 = 500;

/// Retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Budget for a single network attempt.
pub const DEFAULT_PER_ITEM_TIMEOUT_MS: u64 = 10_000;

/// Number of workers draining the URL queue.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Per-call knobs for a preload run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PreloadOptions {
    /// Completion is never reported earlier than this after the session started.
    pub min_display_time_ms: u64,
    /// Retries after the first failed attempt of a URL.
    pub max_retries: u32,
    /// Timeout applied to each network attempt.
    pub per_item_timeout_ms: u64,
    /// Upper bound on concurrently resolving URLs.
    pub concurrency: usize,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            min_display_time_ms: DEFAULT_MIN_DISPLAY_TIME_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            per_item_timeout_ms: DEFAULT_PER_ITEM_TIMEOUT_MS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl PreloadOptions {
    pub fn min_display_time(&self) -> Duration {
        Duration::from_millis(self.min_display_time_ms)
    }

    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_millis(self.per_item_timeout_ms)
    }

    /// Worker count for a batch of `unique_urls` items. Never zero for a
    /// non-empty batch.
    pub fn worker_count(&self, unique_urls: usize) -> usize {
        self.concurrency.max(1).min(unique_urls)
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_name: String,
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            ttl_ms: CACHE_TTL_MS,
        }
    }
}

/// Top-level configuration for the preload engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    /// Options used by `preload` when the caller does not pass its own.
    pub preload: PreloadOptions,
    /// Root directory of the persistent store. `None` runs memory-only.
    pub persistent_dir: Option<PathBuf>,
    /// Headers attached to every network fetch.
    pub headers: HashMap<String, String>,
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, PreloadError> {
        serde_json::from_str(raw).map_err(|e| PreloadError::Config(e.to_string()))
    }
}
