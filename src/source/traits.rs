use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A network response as seen by the cache store.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl FetchedAsset {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-fetch primitive.
///
/// Only transport failures are returned as errors. Non-2xx responses come back
/// as a `FetchedAsset` and the caller decides what they mean.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset>;
}
