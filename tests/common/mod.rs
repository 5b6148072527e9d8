// Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use asset_preload_engine::source::traits::{AssetSource, FetchedAsset};
use asset_preload_engine::store::{PersistentStore, StoreHost, StoredResponse};

/// How the scripted source answers a given URL.
#[derive(Debug, Clone)]
pub enum Behavior {
    Ok,
    /// Transport error for the first `n` calls, then success.
    FailTimes(u32),
    /// Always answer with this HTTP status.
    Status(u16),
    /// Succeed after sleeping this long.
    Delay(Duration),
}

/// In-process network source with per-URL behavior and call accounting.
pub struct ScriptedSource {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, u32>>,
    call_times: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            call_times: Mutex::new(Vec::new()),
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn script(&self, url: &str, behavior: Behavior) {
        self.behaviors.lock().insert(url.to_string(), behavior);
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().values().sum()
    }

    pub fn call_times(&self, url: &str) -> Vec<Instant> {
        self.call_times
            .lock()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn ok(url: &str) -> FetchedAsset {
        FetchedAsset {
            status: 200,
            status_text: "OK".to_string(),
            content_type: Some("image/jpeg".to_string()),
            headers: HashMap::new(),
            body: Bytes::from(format!("body of {}", url)),
        }
    }
}

#[async_trait]
impl AssetSource for ScriptedSource {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let call_no = {
            let mut calls = self.calls.lock();
            let n = calls.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        self.call_times.lock().push((url.to_string(), Instant::now()));

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let behavior = self
            .behaviors
            .lock()
            .get(url)
            .cloned()
            .unwrap_or(Behavior::Ok);
        let result = match behavior {
            Behavior::Ok => Ok(Self::ok(url)),
            Behavior::FailTimes(n) if call_no <= n => Err(anyhow!("connection reset")),
            Behavior::FailTimes(_) => Ok(Self::ok(url)),
            Behavior::Status(status) => Ok(FetchedAsset {
                status,
                status_text: if status == 404 {
                    "Not Found".to_string()
                } else {
                    "Internal Server Error".to_string()
                },
                content_type: None,
                headers: HashMap::new(),
                body: Bytes::new(),
            }),
            Behavior::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(Self::ok(url))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Store whose writes and deletes always fail; reads see nothing.
pub struct FailingStore;

#[async_trait]
impl PersistentStore for FailingStore {
    async fn get(&self, _url: &str) -> Result<Option<StoredResponse>> {
        Ok(None)
    }

    async fn put(&self, _response: StoredResponse) -> Result<()> {
        Err(anyhow!("quota exceeded"))
    }

    async fn delete(&self, _url: &str) -> Result<bool> {
        Err(anyhow!("store locked"))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(vec!["a.jpg".to_string(), "b.jpg".to_string()])
    }
}

/// Store whose reads always fail; writes are accepted and dropped.
pub struct UnreadableStore;

#[async_trait]
impl PersistentStore for UnreadableStore {
    async fn get(&self, _url: &str) -> Result<Option<StoredResponse>> {
        Err(anyhow!("disk I/O error"))
    }

    async fn put(&self, _response: StoredResponse) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _url: &str) -> Result<bool> {
        Ok(false)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Host that counts `open` calls and hands out a fixed store.
pub struct CountingHost {
    pub opens: AtomicUsize,
    store: Arc<dyn PersistentStore>,
}

impl CountingHost {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            opens: AtomicUsize::new(0),
            store,
        }
    }
}

#[async_trait]
impl StoreHost for CountingHost {
    async fn open(&self, _cache_name: &str) -> Result<Arc<dyn PersistentStore>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Arc::clone(&self.store))
    }
}
