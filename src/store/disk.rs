// Directory-backed persistent store: one body file plus a JSON sidecar per URL.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::traits::{PersistentStore, StoreHost, StoredResponse};

#[derive(Debug, Serialize, Deserialize)]
struct StoredMetadata {
    url: String,
    status: u16,
    content_type: Option<String>,
    headers: HashMap<String, String>,
    cached_at_ms: u64,
    len: usize,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique sibling of `path` for one write; never matches `*.bin` or `*.bin.meta`.
fn tmp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}-{}.tmp", std::process::id(), seq));
    PathBuf::from(name)
}

pub struct DiskStore {
    dir: PathBuf,
    /// Serializes reads and writes within the process so a reader never
    /// pairs one write's body with another write's sidecar.
    lock: Mutex<()>,
}

impl DiskStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cache_key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn data_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", Self::cache_key(url)))
    }

    fn meta_path_for_data(data_path: &Path) -> PathBuf {
        let mut meta_path = data_path.to_path_buf();
        meta_path.set_extension("bin.meta");
        meta_path
    }

    async fn remove_file_if_present(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entry(
        data_tmp: &Path,
        meta_tmp: &Path,
        data_path: &Path,
        meta_path: &Path,
        body: &Bytes,
        meta_bytes: Vec<u8>,
    ) -> Result<()> {
        fs::write(data_tmp, body).await?;
        fs::write(meta_tmp, meta_bytes).await?;
        fs::rename(data_tmp, data_path).await?;
        fs::rename(meta_tmp, meta_path).await?;
        Ok(())
    }

    /// Drop a half-written or corrupt entry. Failures are only logged.
    async fn discard(&self, data_path: &Path, meta_path: &Path) {
        for path in [data_path, meta_path] {
            if let Err(e) = Self::remove_file_if_present(path).await {
                warn!("failed to discard {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl PersistentStore for DiskStore {
    async fn get(&self, url: &str) -> Result<Option<StoredResponse>> {
        let _guard = self.lock.lock().await;
        let data_path = self.data_path(url);
        let meta_path = Self::meta_path_for_data(&data_path);

        let meta_bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: StoredMetadata = match serde_json::from_slice(&meta_bytes) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("corrupt metadata for {}: {}", url, e);
                self.discard(&data_path, &meta_path).await;
                return Ok(None);
            }
        };

        // sha256 collisions aside, a mismatch means the sidecar belongs elsewhere.
        if meta.url != url {
            return Ok(None);
        }

        let body = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.discard(&data_path, &meta_path).await;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if body.len() != meta.len {
            debug!(
                "truncated body for {}: {} != {}",
                url,
                body.len(),
                meta.len
            );
            self.discard(&data_path, &meta_path).await;
            return Ok(None);
        }

        Ok(Some(StoredResponse {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            headers: meta.headers,
            body: Bytes::from(body),
            cached_at_ms: meta.cached_at_ms,
        }))
    }

    async fn put(&self, response: StoredResponse) -> Result<()> {
        let data_path = self.data_path(&response.url);
        let meta_path = Self::meta_path_for_data(&data_path);

        let meta = StoredMetadata {
            url: response.url.clone(),
            status: response.status,
            content_type: response.content_type.clone(),
            headers: response.headers.clone(),
            cached_at_ms: response.cached_at_ms,
            len: response.body.len(),
        };
        let meta_bytes = serde_json::to_vec(&meta)?;

        let data_tmp = tmp_path(&data_path);
        let meta_tmp = tmp_path(&meta_path);

        // Both files are staged under unique names, then renamed body first.
        let _guard = self.lock.lock().await;
        let written = Self::write_entry(
            &data_tmp,
            &meta_tmp,
            &data_path,
            &meta_path,
            &response.body,
            meta_bytes,
        )
        .await;
        if written.is_err() {
            for path in [&data_tmp, &meta_tmp] {
                if let Err(e) = Self::remove_file_if_present(path).await {
                    debug!("failed to remove {}: {}", path.display(), e);
                }
            }
        }
        written
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let data_path = self.data_path(url);
        let meta_path = Self::meta_path_for_data(&data_path);

        let had_meta = Self::remove_file_if_present(&meta_path).await?;
        let had_data = Self::remove_file_if_present(&data_path).await?;
        Ok(had_meta || had_data)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".bin.meta"));
            if !is_meta {
                continue;
            }
            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<StoredMetadata>(&bytes) {
                    Ok(meta) => keys.push(meta.url),
                    Err(e) => debug!("skipping unreadable sidecar {}: {}", path.display(), e),
                },
                Err(e) => debug!("skipping sidecar {}: {}", path.display(), e),
            }
        }
        Ok(keys)
    }
}

/// Opens one `DiskStore` per cache name under a common root directory.
pub struct DiskStoreHost {
    root: PathBuf,
}

impl DiskStoreHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl StoreHost for DiskStoreHost {
    async fn open(&self, cache_name: &str) -> Result<Arc<dyn PersistentStore>> {
        if cache_name.is_empty() || cache_name.contains(['/', '\\']) || cache_name == ".." {
            return Err(anyhow!("invalid cache name '{}'", cache_name));
        }
        let store = DiskStore::open(self.root.join(cache_name)).await?;
        Ok(Arc::new(store))
    }
}
