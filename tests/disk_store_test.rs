mod common;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use asset_preload_engine::config::CacheConfig;
use asset_preload_engine::engine::cache::CacheStore;
use asset_preload_engine::store::{
    DiskStore, DiskStoreHost, PersistentStore, StoreHost, StoredResponse,
};

use common::ScriptedSource;

fn response(url: &str, body: &'static [u8]) -> StoredResponse {
    let mut headers = HashMap::new();
    headers.insert("etag".to_string(), "\"v1\"".to_string());
    StoredResponse {
        url: url.to_string(),
        status: 200,
        content_type: Some("image/webp".to_string()),
        headers,
        body: Bytes::from_static(body),
        cached_at_ms: 42,
    }
}

#[tokio::test]
async fn test_disk_store_put_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).await.unwrap();

    assert!(store.get("https://cdn/a.webp").await.unwrap().is_none());

    store.put(response("https://cdn/a.webp", b"webp-bytes")).await.unwrap();
    let read_back = store.get("https://cdn/a.webp").await.unwrap().unwrap();
    assert_eq!(read_back, response("https://cdn/a.webp", b"webp-bytes"));
}

#[tokio::test]
async fn test_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DiskStore::open(dir.path()).await.unwrap();
        store.put(response("a", b"one")).await.unwrap();
        store.put(response("b", b"two")).await.unwrap();
    }

    let store = DiskStore::open(dir.path()).await.unwrap();
    let mut keys = store.keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(&store.get("b").await.unwrap().unwrap().body[..], b"two");
}

#[tokio::test]
async fn test_disk_store_overwrite_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).await.unwrap();

    store.put(response("a", b"old")).await.unwrap();
    store.put(response("a", b"newer")).await.unwrap();
    assert_eq!(&store.get("a").await.unwrap().unwrap().body[..], b"newer");

    assert!(store.delete("a").await.unwrap());
    assert!(!store.delete("a").await.unwrap());
    assert!(store.get("a").await.unwrap().is_none());
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_sidecar_is_treated_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).await.unwrap();
    store.put(response("a", b"data")).await.unwrap();

    let meta_path = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.to_string_lossy().ends_with(".bin.meta"))
        .unwrap();
    std::fs::write(&meta_path, b"{ not json").unwrap();

    assert!(store.get("a").await.unwrap().is_none());
    // Both files were discarded.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_truncated_body_is_treated_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).await.unwrap();
    store.put(response("a", b"full body")).await.unwrap();

    let data_path = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|ext| ext == "bin"))
        .unwrap();
    std::fs::write(&data_path, b"full").unwrap();

    assert!(store.get("a").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_to_one_url_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(DiskStore::open(dir.path()).await.unwrap());
    let bodies: [&'static [u8]; 2] = [b"late fetch body", b"retry"];

    let mut tasks = Vec::new();
    for round in 0..50 {
        let writer = Arc::clone(&store);
        let body = bodies[round % 2];
        tasks.push(tokio::spawn(async move {
            writer.put(response("a", body)).await.unwrap();
        }));
        let reader = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            if let Some(found) = reader.get("a").await.unwrap() {
                assert!(bodies.iter().any(|b| *b == &found.body[..]));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let found = store.get("a").await.unwrap().unwrap();
    assert!(bodies.iter().any(|b| *b == &found.body[..]));

    // Only the committed pair is left; no staged files linger.
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| !n.ends_with(".tmp")));
}

#[tokio::test]
async fn test_host_namespaces_by_cache_name() {
    let dir = tempfile::tempdir().unwrap();
    let host = DiskStoreHost::new(dir.path());

    let first = host.open("images-v1").await.unwrap();
    first.put(response("a", b"one")).await.unwrap();

    let other = host.open("images-v2").await.unwrap();
    assert!(other.get("a").await.unwrap().is_none());
    assert!(dir.path().join("images-v1").is_dir());

    assert!(host.open("../escape").await.is_err());
    assert!(host.open("").await.is_err());
}

#[tokio::test]
async fn test_cache_store_over_disk_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::new());

    let first = CacheStore::new(
        CacheConfig::default(),
        source.clone(),
        Some(Arc::new(DiskStoreHost::new(dir.path())) as Arc<dyn StoreHost>),
    );
    first.initialize().await;
    first.fetch_and_cache("https://cdn/car.jpg").await.unwrap();
    drop(first);

    let second = CacheStore::new(
        CacheConfig::default(),
        source.clone(),
        Some(Arc::new(DiskStoreHost::new(dir.path())) as Arc<dyn StoreHost>),
    );
    second.initialize().await;
    assert_eq!(
        second.resolve_cached("https://cdn/car.jpg").await.as_deref(),
        Some("https://cdn/car.jpg")
    );
    assert_eq!(source.total_calls(), 1);

    second.clear_all().await;
    let store = DiskStore::open(dir.path().join(&CacheConfig::default().cache_name))
        .await
        .unwrap();
    assert!(store.keys().await.unwrap().is_empty());
}
