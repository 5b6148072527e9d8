//! Media asset preloading with bounded concurrency over a two-tier TTL cache.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod store;

pub use api::preloader_api::PreloadEngine;
pub use config::{CacheConfig, EngineConfig, PreloadOptions};
pub use engine::cache::{CacheEntryMetadata, CacheStore};
pub use engine::preloader::Preloader;
pub use engine::session::{LoadError, LoadResult, LoadingState, PreloadSessionState};
pub use engine::stats::CacheStats;
pub use error::PreloadError;
