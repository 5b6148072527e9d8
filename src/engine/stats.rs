// Cache statistics: tier occupancy plus hit/miss and download counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters accumulated over the lifetime of a cache store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheCounters {
    pub memory_hits: u64,
    pub persistent_hits: u64,
    pub misses: u64,
    pub network_fetches: u64,
    pub bytes_downloaded: u64,
    pub persistence_failures: u64,
}

impl CacheCounters {
    /// Fraction of lookups answered by either tier.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.persistent_hits;
        let lookups = hits + self.misses;
        if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        }
    }
}

/// Read-only view returned by `CacheStore::stats`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub memory_entry_count: usize,
    pub metadata_entry_count: usize,
    pub persistent_store_available: bool,
    pub counters: CacheCounters,
}

pub struct StatsCollector {
    memory_hits: AtomicU64,
    persistent_hits: AtomicU64,
    misses: AtomicU64,
    network_fetches: AtomicU64,
    bytes_downloaded: AtomicU64,
    persistence_failures: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            memory_hits: AtomicU64::new(0),
            persistent_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            network_fetches: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
        }
    }

    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistent_hit(&self) {
        self.persistent_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_downloaded(&self, bytes: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn network_fetches(&self) -> u64 {
        self.network_fetches.load(Ordering::Relaxed)
    }

    /// Read the counters. Pure: repeated calls with no activity in between
    /// return equal values.
    pub fn snapshot(&self) -> CacheCounters {
        CacheCounters {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            persistent_hits: self.persistent_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
