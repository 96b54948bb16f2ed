/*!
 * Multi-tier translation cache.
 *
 * Completed translations are stored content-addressed by request
 * fingerprint across three tiers, checked fastest first:
 *
 * - `memory`: in-process map, FIFO capacity eviction plus TTL
 * - `remote`: shared key-value service reached over HTTP
 * - `disk`: durable SQLite store
 *
 * A hit at a slower tier is promoted into the faster tiers so subsequent
 * lookups are cheap. Entries are immutable once written; a `put` that finds
 * a differing payload under the same fingerprint is a corruption signal and
 * is logged while the old entry is kept. The `inflight` submodule provides
 * the atomic claim/join map that guarantees at most one concurrent upstream
 * dispatch per fingerprint.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app_config::CacheConfig;
use crate::errors::CacheError;

pub mod disk;
pub mod inflight;
pub mod memory;
pub mod remote;

pub use disk::DiskCache;
pub use inflight::{InFlightClaim, InFlightGuard, InFlightMap, InFlightResult};
pub use memory::MemoryCache;
pub use remote::RemoteCache;

/// Which tier an entry was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheTier {
    /// In-process map
    Memory,
    /// Shared remote store
    Remote,
    /// Durable on-disk store
    Disk,
}

/// The cached value for one fingerprint: the per-entry translations of the
/// batch that produced it, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPayload {
    /// Translated text per batch entry
    pub translations: Vec<String>,
}

/// A resolved cache lookup
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Content-addressed key
    pub fingerprint: String,

    /// The cached translations
    pub payload: TranslationPayload,

    /// Tier the entry was found in
    pub tier: CacheTier,

    /// Insertion time as unix seconds
    pub inserted_at: u64,

    /// Time-to-live granted at insertion
    pub ttl: Duration,
}

/// Per-tier hit/miss counters
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub remote_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
}

/// Content-addressed store spanning the three tiers plus the in-flight map.
pub struct CacheManager {
    memory: MemoryCache,
    remote: Option<RemoteCache>,
    disk: Option<DiskCache>,
    inflight: InFlightMap,
    enabled: bool,
    memory_hits: AtomicU64,
    remote_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    memory_ttl: Duration,
    disk_ttl: Duration,
}

impl CacheManager {
    /// Build a cache manager from configuration.
    ///
    /// An empty remote endpoint disables the remote tier; disk tier failures
    /// at open time disable that tier with a warning rather than failing the
    /// job.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let remote = if config.remote_endpoint.trim().is_empty() {
            None
        } else {
            Some(RemoteCache::new(&config.remote_endpoint))
        };

        let disk = if config.enabled {
            let open_result = match &config.disk_path {
                Some(path) => DiskCache::new(path),
                None => DiskCache::new_default(),
            };
            match open_result {
                Ok(disk) => Some(disk),
                Err(e) => {
                    warn!("Disk cache unavailable, continuing without it: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            memory: MemoryCache::new(config.memory_capacity),
            remote,
            disk,
            inflight: InFlightMap::new(),
            enabled: config.enabled,
            memory_hits: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            memory_ttl: Duration::from_secs(config.memory_ttl_secs),
            disk_ttl: Duration::from_secs(config.disk_ttl_secs),
        })
    }

    /// An in-memory-only manager, used by tests and cache-less runs.
    pub fn memory_only(capacity: usize, ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(capacity),
            remote: None,
            disk: None,
            inflight: InFlightMap::new(),
            enabled: true,
            memory_hits: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            memory_ttl: ttl,
            disk_ttl: ttl,
        }
    }

    /// A disabled manager: every get is a miss, every put a no-op.
    pub fn disabled() -> Self {
        let mut manager = Self::memory_only(0, Duration::from_secs(0));
        manager.enabled = false;
        manager
    }

    /// Look up a fingerprint across the tiers, fastest first.
    ///
    /// A hit at a slower tier is written through to the faster tiers before
    /// returning.
    pub async fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }

        if let Some(payload) = self.memory.get(fingerprint) {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Memory cache hit for {}", fingerprint);
            return Some(self.entry(fingerprint, payload, CacheTier::Memory));
        }

        if let Some(remote) = &self.remote {
            if let Some(payload) = remote.get(fingerprint).await {
                self.remote_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Remote cache hit for {}", fingerprint);
                self.memory.put(fingerprint, &payload, self.memory_ttl);
                return Some(self.entry(fingerprint, payload, CacheTier::Remote));
            }
        }

        if let Some(disk) = &self.disk {
            if let Some(payload) = disk.get(fingerprint).await {
                self.disk_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Disk cache hit for {}", fingerprint);
                // Promote upward so the next lookup stops at a faster tier
                self.memory.put(fingerprint, &payload, self.memory_ttl);
                if let Some(remote) = &self.remote {
                    remote.put(fingerprint, &payload, self.disk_ttl).await;
                }
                return Some(self.entry(fingerprint, payload, CacheTier::Disk));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write a resolved translation through every tier.
    ///
    /// Idempotent per fingerprint: a second write with the identical payload
    /// is a no-op, a differing payload is logged as corruption and ignored
    /// by each tier.
    pub async fn put(&self, fingerprint: &str, payload: &TranslationPayload) {
        if !self.enabled {
            return;
        }

        self.memory.put(fingerprint, payload, self.memory_ttl);

        if let Some(remote) = &self.remote {
            remote.put(fingerprint, payload, self.disk_ttl).await;
        }

        if let Some(disk) = &self.disk {
            disk.put(fingerprint, payload, self.disk_ttl).await;
        }
    }

    /// Atomically claim a fingerprint for dispatch, or join the dispatch
    /// that already owns it.
    pub fn claim(&self, fingerprint: &str) -> InFlightClaim {
        self.inflight.claim(fingerprint)
    }

    /// Hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn entry(&self, fingerprint: &str, payload: TranslationPayload, tier: CacheTier) -> CacheEntry {
        CacheEntry {
            fingerprint: fingerprint.to_string(),
            payload,
            tier,
            inserted_at: now_unix_secs(),
            ttl: match tier {
                CacheTier::Memory => self.memory_ttl,
                _ => self.disk_ttl,
            },
        }
    }
}

/// Current time as unix seconds
pub(crate) fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
