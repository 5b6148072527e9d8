// Process-local persistent store. Survives cache store instances, not the process.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{PersistentStore, StoreHost, StoredResponse};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredResponse>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get(&self, url: &str) -> Result<Option<StoredResponse>> {
        Ok(self.entries.lock().get(url).cloned())
    }

    async fn put(&self, response: StoredResponse) -> Result<()> {
        self.entries.lock().insert(response.url.clone(), response);
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(url).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// Hands out the same named `MemoryStore` on every `open`, so a fresh cache
/// store over the same host sees earlier writes.
#[derive(Default)]
pub struct MemoryStoreHost {
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStoreHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle to a named store, creating it if needed.
    pub fn store(&self, cache_name: &str) -> Arc<MemoryStore> {
        let mut stores = self.stores.lock();
        Arc::clone(
            stores
                .entry(cache_name.to_string())
                .or_insert_with(|| Arc::new(MemoryStore::new())),
        )
    }
}

#[async_trait]
impl StoreHost for MemoryStoreHost {
    async fn open(&self, cache_name: &str) -> Result<Arc<dyn PersistentStore>> {
        Ok(self.store(cache_name) as Arc<dyn PersistentStore>)
    }
}
