// Preload session state: counters, progress and error list for one preload run,
// published to subscribers on every change.

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Outcome for one unique URL of a preload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub url: String,
    pub success: bool,
    pub cached_url: Option<String>,
    pub error: Option<String>,
}

impl LoadResult {
    pub fn loaded(url: &str, cached_url: String) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            cached_url: Some(cached_url),
            error: None,
        }
    }

    pub fn failed(url: &str, reason: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            cached_url: None,
            error: Some(reason),
        }
    }
}

/// Permanent failure of a URL after all retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub url: String,
    pub reason: String,
    pub retry_count: u32,
    pub timestamp_ms: u64,
}

/// Snapshot pushed to progress subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingState {
    pub is_loading: bool,
    pub progress: u8,
    pub loaded_count: usize,
    pub total_count: usize,
}

impl LoadingState {
    pub fn is_complete(&self) -> bool {
        !self.is_loading && self.progress == 100
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadSessionState {
    pub is_loading: bool,
    pub progress: u8,
    pub loaded_count: usize,
    pub total_count: usize,
    pub errors: Vec<LoadError>,
    pub start_time_ms: u64,
}

/// `round(part / whole * 100)` with halves rounded up. `whole` must be non-zero.
fn rounded_percent(part: usize, whole: usize) -> u8 {
    let pct = (part as u64 * 200 + whole as u64) / (2 * whole as u64);
    pct.min(100) as u8
}

impl PreloadSessionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn begin(&mut self, total_count: usize, now_ms: u64) {
        self.reset();
        self.is_loading = true;
        self.total_count = total_count;
        self.start_time_ms = now_ms;
    }

    /// Count one finished URL and recompute progress.
    ///
    /// Progress only reports 100 once every item is done, so large batches
    /// whose ratio rounds up early hold at 99.
    pub fn record_completion(&mut self) {
        self.loaded_count += 1;
        if self.total_count == 0 {
            return;
        }
        let pct = rounded_percent(self.loaded_count, self.total_count);
        self.progress = if self.loaded_count < self.total_count {
            pct.min(99)
        } else {
            100
        };
    }

    pub fn finish(&mut self) {
        self.is_loading = false;
        self.progress = 100;
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.is_loading && self.progress == 100
    }

    /// Percentage of items that did not permanently fail; 100 for an empty session.
    pub fn success_rate(&self) -> u8 {
        if self.total_count == 0 {
            return 100;
        }
        let ok = self.total_count.saturating_sub(self.errors.len());
        rounded_percent(ok, self.total_count)
    }

    pub fn loading_state(&self) -> LoadingState {
        LoadingState {
            is_loading: self.is_loading,
            progress: self.progress,
            loaded_count: self.loaded_count,
            total_count: self.total_count,
        }
    }
}

/// Shared, serialized access to a `PreloadSessionState`.
///
/// Every mutation goes through `update`, which publishes the resulting
/// `LoadingState` to watch subscribers.
pub struct PreloadSession {
    state: Mutex<PreloadSessionState>,
    tx: watch::Sender<LoadingState>,
}

impl PreloadSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LoadingState::default());
        Self {
            state: Mutex::new(PreloadSessionState::default()),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.tx.subscribe()
    }

    /// Mutate the state and publish under the same lock, so subscribers see
    /// snapshots in mutation order.
    fn update<R>(&self, f: impl FnOnce(&mut PreloadSessionState) -> R) -> R {
        let mut state = self.state.lock();
        let out = f(&mut state);
        let loading = state.loading_state();
        self.tx.send_if_modified(|current| {
            if *current == loading {
                false
            } else {
                *current = loading;
                true
            }
        });
        out
    }

    pub fn begin(&self, total_count: usize, now_ms: u64) {
        self.update(|s| s.begin(total_count, now_ms));
    }

    pub fn complete_item(&self) {
        let (loaded, total, progress) = self.update(|s| {
            s.record_completion();
            (s.loaded_count, s.total_count, s.progress)
        });
        debug!("progress {}/{} ({}%)", loaded, total, progress);
    }

    pub fn record_error(&self, error: LoadError) {
        self.update(|s| s.errors.push(error));
    }

    pub fn finish(&self) {
        self.update(PreloadSessionState::finish);
    }

    pub fn reset(&self) {
        self.update(PreloadSessionState::reset);
    }

    pub fn snapshot(&self) -> PreloadSessionState {
        self.state.lock().clone()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.state.lock().loading_state()
    }

    pub fn errors(&self) -> Vec<LoadError> {
        self.state.lock().errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        self.state.lock().has_errors()
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().is_complete()
    }

    pub fn success_rate(&self) -> u8 {
        self.state.lock().success_rate()
    }
}

impl Default for PreloadSession {
    fn default() -> Self {
        Self::new()
    }
}
