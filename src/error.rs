// Failure taxonomy for a single URL resolution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreloadError {
    /// A network attempt did not finish within the per-item budget.
    #[error("Timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Non-2xx response or transport failure.
    #[error("Failed to load asset: {reason}")]
    Fetch { url: String, reason: String },

    /// Writing a fetched response into the persistent store failed.
    /// Logged only; never fails the fetch that produced it.
    #[error("Failed to persist {url}: {reason}")]
    PersistenceWrite { url: String, reason: String },

    /// Persistent backend failure on read or delete.
    #[error("persistent store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PreloadError {
    pub fn fetch(url: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
