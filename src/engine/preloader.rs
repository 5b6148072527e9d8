// Preload orchestrator: drains a deduplicated URL queue with a fixed worker pool,
// resolving each URL against the cache with timeout and exponential backoff.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::CacheStore;
use super::session::{LoadError, LoadResult, LoadingState, PreloadSession, PreloadSessionState};
use super::stats::CacheStats;
use crate::config::{PreloadOptions, RETRY_BASE_DELAY_MS};
use crate::error::PreloadError;

/// Delay before retry number `attempt + 1`: 100ms, 200ms, 400ms, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(factor))
}

/// Drop empty entries and duplicates, keeping first-seen order.
pub fn unique_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(Into::into)
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

pub struct Preloader {
    cache: Arc<CacheStore>,
    options: PreloadOptions,
    session: Arc<PreloadSession>,
}

impl Preloader {
    pub fn new(cache: Arc<CacheStore>, options: PreloadOptions) -> Self {
        Self {
            cache,
            options,
            session: Arc::new(PreloadSession::new()),
        }
    }

    pub fn options(&self) -> &PreloadOptions {
        &self.options
    }

    /// Preload `urls` with the options this preloader was built with.
    pub async fn preload<I, S>(&self, urls: I) -> Vec<LoadResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = self.options.clone();
        self.preload_with(urls, &options).await
    }

    /// Preload `urls` and return one result per unique URL, in completion order.
    ///
    /// No single URL failure aborts the batch. Completion is not reported
    /// before `min_display_time_ms` has elapsed since the session started.
    pub async fn preload_with<I, S>(&self, urls: I, options: &PreloadOptions) -> Vec<LoadResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique = unique_urls(urls);
        if unique.is_empty() {
            warn!("no valid asset URLs to preload");
            return Vec::new();
        }

        let started = Instant::now();
        self.session.begin(unique.len(), self.cache.now_ms());
        info!("starting preload of {} assets", unique.len());

        self.cache.initialize().await;

        let results = self.load_with_concurrency(unique, options).await;

        ensure_minimum_display_time(started, options.min_display_time()).await;
        self.session.finish();

        let success_count = results.iter().filter(|r| r.success).count();
        let fail_count = results.len() - success_count;
        info!(
            "preload complete: {} loaded, {} failed, elapsed_ms={}",
            success_count,
            fail_count,
            started.elapsed().as_millis()
        );
        for err in self.session.errors() {
            warn!(
                "failed asset url={} reason={} retries={}",
                err.url, err.reason, err.retry_count
            );
        }

        results
    }

    async fn load_with_concurrency(
        &self,
        urls: Vec<String>,
        options: &PreloadOptions,
    ) -> Vec<LoadResult> {
        let worker_count = options.worker_count(urls.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(urls)));
        let results = Arc::new(Mutex::new(Vec::with_capacity(queue.lock().len())));

        debug!("spawning {} preload workers", worker_count);

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            let cache = Arc::clone(&self.cache);
            let session = Arc::clone(&self.session);
            let options = options.clone();

            workers.spawn(async move {
                loop {
                    let next = queue.lock().pop_front();
                    let Some(url) = next else {
                        break;
                    };

                    let result = load_single(&cache, &session, &url, &options).await;
                    results.lock().push(result);
                    session.complete_item();
                }
                debug!("preload worker {} drained", worker_id);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("preload worker panicked: {}", e);
            }
        }

        let mut collected = results.lock();
        std::mem::take(&mut *collected)
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.session.subscribe()
    }

    pub fn reset(&self) {
        self.session.reset();
    }

    pub fn state(&self) -> PreloadSessionState {
        self.session.snapshot()
    }

    pub fn is_loading(&self) -> bool {
        self.session.loading_state().is_loading
    }

    pub fn progress(&self) -> u8 {
        self.session.loading_state().progress
    }

    pub fn loaded_count(&self) -> usize {
        self.session.loading_state().loaded_count
    }

    pub fn total_count(&self) -> usize {
        self.session.loading_state().total_count
    }

    pub fn errors(&self) -> Vec<LoadError> {
        self.session.errors()
    }

    pub fn has_errors(&self) -> bool {
        self.session.has_errors()
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    pub fn success_rate(&self) -> u8 {
        self.session.success_rate()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn clear_cache(&self) {
        self.cache.clear_all().await;
    }
}

/// Resolve one URL: cache first, then timed network attempts with backoff.
/// Attempts are strictly sequential; the total is `1 + max_retries`.
async fn load_single(
    cache: &Arc<CacheStore>,
    session: &PreloadSession,
    url: &str,
    options: &PreloadOptions,
) -> LoadResult {
    let mut attempt: u32 = 0;
    loop {
        match attempt_once(cache, url, options.per_item_timeout()).await {
            Ok(reference) => return LoadResult::loaded(url, reference),
            Err(err) => {
                let reason = err.to_string();
                if attempt < options.max_retries {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "retrying {} (attempt {}/{}) after {}ms: {}",
                        url,
                        attempt + 1,
                        options.max_retries,
                        delay.as_millis(),
                        reason
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                session.record_error(LoadError {
                    url: url.to_string(),
                    reason: reason.clone(),
                    retry_count: attempt,
                    timestamp_ms: cache.now_ms(),
                });
                return LoadResult::failed(url, reason);
            }
        }
    }
}

async fn attempt_once(
    cache: &Arc<CacheStore>,
    url: &str,
    timeout: Duration,
) -> Result<String, PreloadError> {
    if let Some(reference) = cache.resolve_cached(url).await {
        debug!("cache hit for {}", url);
        return Ok(reference);
    }

    // The fetch runs as its own task so a timeout only abandons the handle.
    // The fetch keeps going and may still populate the cache afterwards.
    let fetch_cache = Arc::clone(cache);
    let owned_url = url.to_string();
    let handle = tokio::spawn(async move { fetch_cache.fetch_and_cache(&owned_url).await });

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(PreloadError::fetch(url, join_err.to_string())),
        Err(_) => Err(PreloadError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn ensure_minimum_display_time(started: Instant, min_display: Duration) {
    let elapsed = started.elapsed();
    if elapsed < min_display {
        let remaining = min_display - elapsed;
        debug!("holding completion for {}ms", remaining.as_millis());
        tokio::time::sleep(remaining).await;
    }
}
