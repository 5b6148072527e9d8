use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use super::traits::{AssetSource, FetchedAsset};

pub struct HttpSource {
    client: Client,
    headers: Arc<RwLock<HashMap<String, String>>>,
}

impl HttpSource {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self::with_client(Client::new(), headers)
    }

    pub fn with_client(client: Client, headers: HashMap<String, String>) -> Self {
        Self {
            client,
            headers: Arc::new(RwLock::new(headers)),
        }
    }

    /// Replace the headers sent with every request (e.g. after token refresh).
    /// An empty map is ignored.
    pub fn update_headers(&self, new_headers: HashMap<String, String>) {
        if !new_headers.is_empty() {
            *self.headers.write() = new_headers;
        }
    }

    /// Build a GET request for `url` with the current custom headers.
    fn build_request(&self, url: &str) -> RequestBuilder {
        let headers = self.headers.read().clone();

        let mut req = self.client.get(url);
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

#[async_trait]
impl AssetSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let resp = self.build_request(url).send().await?;

        let status = resp.status();
        debug!("http fetch status={} url={}", status.as_u16(), url);
        if !status.is_success() {
            warn!("http fetch failed status={} url={}", status.as_u16(), url);
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect::<HashMap<_, _>>();

        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let body = resp.bytes().await?;

        Ok(FetchedAsset {
            status: status.as_u16(),
            status_text,
            content_type,
            headers,
            body,
        })
    }
}
