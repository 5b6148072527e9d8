use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;

use crate::source::traits::FetchedAsset;

/// A response as held by a persistent store.
///
/// `cached_at_ms` is carried so expiry can be re-derived for entries written by
/// an earlier session; stores themselves never look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub cached_at_ms: u64,
}

impl StoredResponse {
    pub fn from_fetched(url: &str, asset: &FetchedAsset, cached_at_ms: u64) -> Self {
        Self {
            url: url.to_string(),
            status: asset.status,
            content_type: asset.content_type.clone(),
            headers: asset.headers.clone(),
            body: asset.body.clone(),
            cached_at_ms,
        }
    }
}

/// TTL-agnostic byte store keyed by URL.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<StoredResponse>>;
    async fn put(&self, response: StoredResponse) -> Result<()>;
    /// Returns whether an entry was removed.
    async fn delete(&self, url: &str) -> Result<bool>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// The host environment's access point to persistent stores.
///
/// An `open` failure means no persistent store is available and the cache
/// runs memory-only.
#[async_trait]
pub trait StoreHost: Send + Sync {
    async fn open(&self, cache_name: &str) -> Result<Arc<dyn PersistentStore>>;
}

/// Host without any persistent storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStoreHost;

#[async_trait]
impl StoreHost for UnavailableStoreHost {
    async fn open(&self, cache_name: &str) -> Result<Arc<dyn PersistentStore>> {
        Err(anyhow!(
            "persistent store '{}' not available in this host",
            cache_name
        ))
    }
}
